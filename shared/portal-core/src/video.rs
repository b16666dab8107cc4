use serde::{Deserialize, Serialize};

use crate::lenient::{opt_string, opt_u64};

/// Descriptive metadata attached to a playable video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default, deserialize_with = "opt_string")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "opt_string")]
    pub release_year: Option<String>,

    #[serde(default, deserialize_with = "opt_string")]
    pub duration: Option<String>,

    #[serde(default, deserialize_with = "opt_string")]
    pub genre: Option<String>,

    /// IMDb score; older backends call it `imdb_score`
    #[serde(default, alias = "imdb_score", deserialize_with = "opt_string")]
    pub score: Option<String>,

    /// Full description or the backend's preview of it
    #[serde(default, alias = "description_preview", deserialize_with = "opt_string")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "opt_string")]
    pub release_country: Option<String>,

    #[serde(default, deserialize_with = "opt_string")]
    pub quality_tag: Option<String>,

    #[serde(default, deserialize_with = "opt_string")]
    pub user_rating: Option<String>,

    #[serde(default, deserialize_with = "opt_string")]
    pub filename: Option<String>,
}

/// Playable media URL paired with its metadata.
///
/// Fetched once per video page and not modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoDetail {
    pub video_url: String,

    #[serde(default)]
    pub video_data: VideoMetadata,
}

impl VideoDetail {
    pub fn title(&self) -> &str {
        self.video_data
            .title
            .as_deref()
            .or(self.video_data.filename.as_deref())
            .unwrap_or(crate::item::UNKNOWN_TITLE)
    }
}

/// Reply to a download trigger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadResponse {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub video_data: Option<VideoMetadata>,

    #[serde(default, deserialize_with = "opt_string")]
    pub video_url: Option<String>,

    #[serde(default, deserialize_with = "opt_u64")]
    pub id: Option<u64>,
}

/// Download queue entry as reported by the status endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadStatus {
    #[serde(default, deserialize_with = "opt_string")]
    pub message: Option<String>,

    #[serde(default, deserialize_with = "opt_string")]
    pub filename: Option<String>,

    #[serde(default, deserialize_with = "opt_string")]
    pub status: Option<String>,
}
