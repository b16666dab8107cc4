//! Portal Core - Shared data model, field normalization and SSE framing

pub mod item;
pub mod lenient;
pub mod session;
pub mod sse;
pub mod video;

pub use item::{extract_items, SearchResultItem, StreamBatch};
pub use session::{AdminAction, Group, User, UserStatus};
pub use sse::{FrameEvent, LineBuffer};
pub use video::{DownloadResponse, DownloadStatus, VideoDetail, VideoMetadata};

/// Result type for portal operations
pub type Result<T> = std::result::Result<T, PortalError>;

/// Error types for portal operations
#[derive(thiserror::Error, Debug)]
pub enum PortalError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PortalError {
    /// HTTP status code carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PortalError::Status { status, .. } => Some(*status),
            PortalError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// 401/403 responses mean "not signed in" or "no role yet", not a failure
    pub fn is_unauthorized(&self) -> bool {
        match self {
            PortalError::Unauthorized => true,
            PortalError::Status { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}
