use chrono::Timelike;
use tokio::sync::watch;
use uuid::Uuid;

use skillswap_types::models::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// Dark from 19:00 until 06:00, light otherwise.
    pub fn for_hour(hour: u32) -> Self {
        if (6..19).contains(&hour) {
            Self::Light
        } else {
            Self::Dark
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// The signed-in account.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

/// Everything a UI needs to render the current user.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub has_profile: bool,
    pub avatar: Option<String>,
    /// `None` until the user picks one; see [`Session::theme`].
    pub theme: Option<Theme>,
}

/// Shared session state with change notification. Every mutation wakes
/// receivers returned by [`Session::subscribe`].
#[derive(Debug)]
pub struct Session {
    tx: watch::Sender<SessionState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.tx.borrow().identity.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.tx.borrow().identity.as_ref().map(|i| i.token.clone())
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.tx.borrow().identity.as_ref().map(|i| i.user_id)
    }

    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().identity.is_some()
    }

    pub fn has_profile(&self) -> bool {
        self.tx.borrow().has_profile
    }

    pub fn profile(&self) -> Option<Profile> {
        self.tx.borrow().profile.clone()
    }

    pub fn avatar(&self) -> Option<String> {
        self.tx.borrow().avatar.clone()
    }

    pub fn set_identity(&self, identity: Identity) {
        self.tx.send_modify(|s| {
            let switched = s.identity.as_ref().map(|i| i.user_id) != Some(identity.user_id);
            if switched {
                s.profile = None;
                s.has_profile = false;
                s.avatar = None;
            }
            s.identity = Some(identity);
        });
    }

    /// Caches a freshly loaded profile along with its derived flags.
    pub fn set_profile(&self, profile: Profile) {
        self.tx.send_modify(|s| {
            s.has_profile = profile.has_profile;
            s.avatar = profile.avatar.clone();
            s.profile = Some(profile);
        });
    }

    /// Applies a live balance change to the cached profile.
    pub fn set_credits(&self, balance: i64) {
        self.tx.send_modify(|s| {
            if let Some(profile) = s.profile.as_mut() {
                profile.credits = balance;
            }
        });
    }

    /// The chosen theme, or the time-of-day default.
    pub fn theme(&self) -> Theme {
        self.tx
            .borrow()
            .theme
            .unwrap_or_else(|| Theme::for_hour(chrono::Local::now().hour()))
    }

    pub fn set_theme(&self, theme: Theme) {
        self.tx.send_modify(|s| s.theme = Some(theme));
    }

    pub fn toggle_theme(&self) -> Theme {
        let theme = self.theme().toggled();
        self.set_theme(theme);
        theme
    }

    /// Forgets the account; the theme survives.
    pub fn sign_out(&self) {
        self.tx.send_modify(|s| {
            s.identity = None;
            s.profile = None;
            s.has_profile = false;
            s.avatar = None;
        });
    }
}
