use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::lenient::{first_string, lookup, read_u64};

/// Title shown when neither a normalized title nor a filename is available
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// One discoverable media item from a search or popular listing.
///
/// Every field except `page_url` is optional because the backend populates
/// them inconsistently across versions. Nothing here is required to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    /// Numeric identifier, absent on some backend versions
    #[serde(default)]
    pub id: Option<u64>,

    /// Normalized title
    #[serde(default)]
    pub title: Option<String>,

    /// Raw filename, used when no normalized title exists
    #[serde(default)]
    pub filename: Option<String>,

    /// Page URL, also the download key
    #[serde(default)]
    pub page_url: String,

    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub quality_tag: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub release_year: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub score: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tmdb_id: Option<String>,
    #[serde(default)]
    pub release_country: Option<String>,
    #[serde(default)]
    pub user_rating: Option<String>,
}

impl SearchResultItem {
    /// Normalize one backend item into the canonical shape.
    ///
    /// Accepts both the flat layout and the older nested `data` object, and
    /// every historical spelling of a field (`score`/`imdb_score`,
    /// `description`/`description_preview`, `catagory`/`category`, ...).
    /// Returns `None` for anything that is not a JSON object.
    pub fn from_value(v: &Value) -> Option<Self> {
        if !v.is_object() {
            return None;
        }

        Some(Self {
            id: v.get("id").and_then(read_u64),
            title: first_string(v, &["title", "data.title"]),
            filename: first_string(v, &["filename", "filename_old"]),
            page_url: first_string(v, &["page_url", "data.page_url"]).unwrap_or_default(),
            poster_url: first_string(v, &["poster_url", "poster"]),
            quality_tag: first_string(v, &["quality_tag", "data.quality_tag"]),
            description: first_string(
                v,
                &["description", "description_preview", "data.description_preview"],
            ),
            genre: first_string(v, &["genre", "data.genre"]),
            release_year: first_string(v, &["release_year", "year", "data.release_year"]),
            duration: first_string(v, &["duration", "data.duration"]),
            score: first_string(v, &["score", "imdb_score", "data.imdb_score"]),
            category: first_string(v, &["catagory", "category"]),
            tmdb_id: first_string(v, &["tmdb_id"]),
            release_country: first_string(v, &["release_country", "data.release_country"]),
            user_rating: first_string(v, &["user_rating", "data.user_rating"]),
        })
    }

    /// Title to display: normalized title, then raw filename, then a placeholder
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.filename.as_deref())
            .unwrap_or(UNKNOWN_TITLE)
    }

    /// Poster URL, or `placeholder` when the backend sent none
    pub fn poster_or<'a>(&'a self, placeholder: &'a str) -> &'a str {
        self.poster_url.as_deref().unwrap_or(placeholder)
    }

    /// Stable key for list rendering.
    ///
    /// Uses the id when present, then the page URL, then the position.
    pub fn key(&self, index: usize) -> String {
        match (self.id, self.page_url.is_empty()) {
            (Some(id), _) => id.to_string(),
            (None, false) => self.page_url.clone(),
            (None, true) => format!("#{}", index),
        }
    }
}

/// Extract the item collection from a buffered response body.
///
/// Looks for `data`, then `results`, then a bare array. Elements that are not
/// objects are logged and skipped.
pub fn extract_items(body: &Value) -> Vec<SearchResultItem> {
    let list = lookup(body, "data")
        .and_then(Value::as_array)
        .or_else(|| lookup(body, "results").and_then(Value::as_array))
        .or_else(|| body.as_array());

    let Some(list) = list else {
        warn!("Response body carries no item collection");
        return Vec::new();
    };

    normalize_all(list)
}

pub(crate) fn normalize_all(list: &[Value]) -> Vec<SearchResultItem> {
    list.iter()
        .filter_map(|v| {
            let item = SearchResultItem::from_value(v);
            if item.is_none() {
                warn!("Skipping non-object result entry: {}", v);
            }
            item
        })
        .collect()
}

/// One increment of results plus the completion flag.
///
/// Handed to the batch callback by reference and never retained afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamBatch {
    pub items: Vec<SearchResultItem>,
    pub complete: bool,
}

impl StreamBatch {
    pub fn partial(items: Vec<SearchResultItem>) -> Self {
        Self { items, complete: false }
    }

    /// Completion signal carrying no items
    pub fn terminal() -> Self {
        Self { items: Vec::new(), complete: true }
    }
}
