//! Media Portal Client
//!
//! Streaming search client for the media portal backend: SSE ingestion with a
//! buffered JSON fallback, progressive result accumulation and the session,
//! video and download operations the command line front end exposes.

pub mod api;
pub mod auth;
pub mod config;
pub mod display;
pub mod state;
pub mod stream;

// Re-export main types for easy access
pub use crate::api::{MediaBackend, PortalClient};
pub use crate::auth::{Access, Session};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::state::{
    DownloadState, DownloadTracker, QueryTicket, ResultAccumulator, ResultView,
    SharedAccumulator, VideoView,
};
pub use portal_core::{PortalError, Result, SearchResultItem, StreamBatch};
