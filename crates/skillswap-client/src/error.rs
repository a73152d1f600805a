use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("requires {required} time credits, you have {balance}")]
    InsufficientCredits {
        required: i64,
        balance: i64,
        shortfall: i64,
    },

    #[error("upload resumes at offset {expected}")]
    UploadOffset { expected: u64 },

    #[error("not signed in")]
    NotSignedIn,

    #[error("gateway: {0}")]
    Gateway(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Gateway(e.to_string())
    }
}

/// JSON error body the server attaches to every failure.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    required: Option<i64>,
    balance: Option<i64>,
    shortfall: Option<i64>,
    offset: Option<u64>,
}

impl ClientError {
    /// Map a non-success status and its body to the most specific variant.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

        match parsed {
            ErrorBody {
                required: Some(required),
                balance: Some(balance),
                shortfall: Some(shortfall),
                ..
            } if status == 402 => Self::InsufficientCredits {
                required,
                balance,
                shortfall,
            },
            ErrorBody {
                offset: Some(expected),
                ..
            } if status == 409 => Self::UploadOffset { expected },
            ErrorBody { error, .. } => Self::Api {
                status,
                message: if error.is_empty() { body.to_string() } else { error },
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::InsufficientCredits { .. } => Some(402),
            Self::UploadOffset { .. } => Some(409),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
