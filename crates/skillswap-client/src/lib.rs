//! Client library for the SkillSwap server: a typed HTTP client, the shared
//! session state a UI renders from, and a live gateway subscription.

pub mod api;
pub mod error;
pub mod live;
pub mod session;

pub use api::ApiClient;
pub use error::{ClientError, Result};
pub use live::Subscription;
pub use session::{Identity, Session, SessionState, Theme};
