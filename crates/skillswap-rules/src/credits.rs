use skillswap_types::api::{Access, DraftContent, LectureDraft};

/// Credits earned per lecture in a published skill.
pub const CREDITS_PER_LECTURE: i64 = 5;

/// Bonus for a skill that ships at least one freshly recorded lecture.
pub const RECORDING_BONUS: i64 = 10;

/// Outcome of comparing a balance against a skill's price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditCheck {
    Granted,
    Denied { shortfall: i64 },
}

impl CreditCheck {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Access is granted iff `balance >= required`. Nothing is spent.
pub fn check_access(balance: i64, required: i64) -> CreditCheck {
    if balance >= required {
        CreditCheck::Granted
    } else {
        CreditCheck::Denied {
            shortfall: required - balance,
        }
    }
}

/// Same as [`check_access`], in the wire shape returned to clients.
pub fn access(balance: i64, required: i64) -> Access {
    let check = check_access(balance, required);
    let shortfall = match check {
        CreditCheck::Granted => 0,
        CreditCheck::Denied { shortfall } => shortfall,
    };
    Access {
        granted: check.is_granted(),
        balance,
        required,
        shortfall,
    }
}

/// `5 * lectures + 10` when any lecture is a fresh recording, else `5 * lectures`.
pub fn publish_award(lecture_count: usize, has_fresh_recording: bool) -> i64 {
    let base = lecture_count as i64 * CREDITS_PER_LECTURE;
    if has_fresh_recording {
        base + RECORDING_BONUS
    } else {
        base
    }
}

/// Award for a set of drafts as submitted, before recordings are promoted.
pub fn award_for_drafts(drafts: &[LectureDraft]) -> i64 {
    let fresh = drafts
        .iter()
        .any(|d| matches!(d.content, DraftContent::Recording { .. }));
    publish_award(drafts.len(), fresh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(content: DraftContent) -> LectureDraft {
        LectureDraft {
            title: String::new(),
            content,
        }
    }

    #[test]
    fn grants_when_balance_covers_price() {
        assert_eq!(check_access(8, 8), CreditCheck::Granted);
        assert_eq!(check_access(20, 8), CreditCheck::Granted);
        assert_eq!(check_access(0, 0), CreditCheck::Granted);
    }

    #[test]
    fn denies_with_exact_shortfall() {
        assert_eq!(check_access(5, 8), CreditCheck::Denied { shortfall: 3 });
        assert_eq!(check_access(0, 25), CreditCheck::Denied { shortfall: 25 });
    }

    #[test]
    fn gate_matches_comparison_over_a_range() {
        for balance in -5..40 {
            for price in 0..40 {
                let check = check_access(balance, price);
                assert_eq!(check.is_granted(), balance >= price);
                if let CreditCheck::Denied { shortfall } = check {
                    assert_eq!(shortfall, price - balance);
                }
            }
        }
    }

    #[test]
    fn access_wire_shape() {
        let a = access(5, 8);
        assert!(!a.granted);
        assert_eq!((a.balance, a.required, a.shortfall), (5, 8, 3));

        let a = access(10, 8);
        assert!(a.granted);
        assert_eq!(a.shortfall, 0);
    }

    #[test]
    fn award_without_recording_is_five_per_lecture() {
        assert_eq!(publish_award(0, false), 0);
        assert_eq!(publish_award(1, false), 5);
        assert_eq!(publish_award(4, false), 20);
    }

    #[test]
    fn award_with_recording_adds_bonus() {
        assert_eq!(publish_award(3, true), 25);
        assert_eq!(publish_award(1, true), 15);
    }

    #[test]
    fn award_from_drafts() {
        let drafts = vec![
            draft(DraftContent::Video {
                url: "https://www.youtube.com/embed/x".into(),
            }),
            draft(DraftContent::Text {
                body: "notes".into(),
            }),
            draft(DraftContent::Recording {
                upload_id: Default::default(),
            }),
        ];
        assert_eq!(award_for_drafts(&drafts), 25);
        assert_eq!(award_for_drafts(&drafts[..2]), 10);
    }
}
