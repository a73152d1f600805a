/// Separator between the two participant ids in a room key.
pub const ROOM_KEY_SEPARATOR: char = '_';

/// Key of the chat room shared by `a` and `b`.
///
/// Ids are ordered by plain string comparison so both sides derive the same
/// key no matter who opens the conversation.
pub fn room_key(a: &str, b: &str) -> String {
    if a < b {
        format!("{a}{ROOM_KEY_SEPARATOR}{b}")
    } else {
        format!("{b}{ROOM_KEY_SEPARATOR}{a}")
    }
}

/// Splits a room key back into its (lower, higher) participant ids.
/// Returns `None` for keys that were not produced by [`room_key`].
pub fn participants(key: &str) -> Option<(&str, &str)> {
    let (lo, hi) = key.split_once(ROOM_KEY_SEPARATOR)?;
    if lo.is_empty() || hi.is_empty() || hi.contains(ROOM_KEY_SEPARATOR) || lo > hi {
        return None;
    }
    Some((lo, hi))
}

pub fn is_participant(key: &str, user_id: &str) -> bool {
    participants(key).is_some_and(|(lo, hi)| lo == user_id || hi == user_id)
}

/// Timestamp (microseconds) for the next message in a room.
/// Strictly greater than the room's last timestamp even if the clock stalls
/// or steps backwards.
pub fn next_timestamp(last: Option<i64>, now: i64) -> i64 {
    match last {
        Some(last) if now <= last => last + 1,
        _ => now,
    }
}
