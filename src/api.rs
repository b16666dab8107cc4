use std::time::Duration;

use async_trait::async_trait;
use portal_core::{
    extract_items, AdminAction, DownloadResponse, DownloadStatus, PortalError, Result,
    SearchResultItem, UserStatus, VideoDetail,
};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::stream;

const SEARCH_PATH: &str = "api/v2/search";
const POPULAR_PATH: &str = "api/v2/popular";
const VIDEO_PATH: &str = "api/v2/getvideo";
const DOWNLOAD_PATH: &str = "api/v2/download";
const USER_STATUS_PATH: &str = "api/v2/user-status";
const DOWNLOAD_STATUS_PATH: &str = "test";
const LOGIN_PATH: &str = "login";
const LOGOUT_PATH: &str = "logout";
const ADMIN_PATH: &str = "admin";

/// Single-shot operations the presentation state machines depend on
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn get_video(&self, page_url: &str) -> Result<VideoDetail>;
    async fn download(&self, page_url: &str, id: Option<u64>) -> Result<DownloadResponse>;
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

/// Outcome of the first attempt at an ingestion endpoint
enum Opened {
    Stream(Response),
    Buffered(Vec<SearchResultItem>),
}

/// HTTP client for the portal backend.
///
/// Search and popular listings are ingested through a batch callback whether
/// the backend streams them or not. Nothing is cached and identical requests
/// in flight are not coalesced.
#[derive(Debug, Clone)]
pub struct PortalClient {
    base_url: Url,
    client: reqwest::Client,
    session_cookie: Option<String>,
}

impl PortalClient {
    /// Create a client for `base_url` with no session
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("portal-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: normalize_base(base_url)?,
            client,
            session_cookie: None,
        })
    }

    /// Create a client from configuration.
    ///
    /// Only the connect phase gets a timeout; streams may legitimately stay
    /// open for as long as the backend keeps producing results.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.server.user_agent.clone());
        if config.server.connect_timeout_seconds > 0 {
            builder =
                builder.connect_timeout(Duration::from_secs(config.server.connect_timeout_seconds));
        }

        Ok(Self {
            base_url: normalize_base(&config.server.base_url)?,
            client: builder.build()?,
            session_cookie: config.session.cookie.clone(),
        })
    }

    /// Attach a raw `Cookie` header value, e.g. `session=...`
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PortalError::InvalidUrl(format!("{}: {}", path, e)))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.client.request(method, url);
        match &self.session_cookie {
            Some(cookie) => req.header(COOKIE, cookie),
            None => req,
        }
    }

    /// Search by free-text query, delivering results through `on_batch`
    pub async fn search<F>(&self, query: &str, on_batch: F) -> Result<usize>
    where
        F: FnMut(&[SearchResultItem], bool),
    {
        let url = self.endpoint(&format!("{}?q={}", SEARCH_PATH, urlencoding::encode(query)))?;
        info!("🔍 Searching for: {}", query);
        self.ingest(url, on_batch).await
    }

    /// Fetch the popular listing, delivering results through `on_batch`
    pub async fn popular<F>(&self, on_batch: F) -> Result<usize>
    where
        F: FnMut(&[SearchResultItem], bool),
    {
        let url = self.endpoint(POPULAR_PATH)?;
        info!("🔥 Fetching popular content");
        self.ingest(url, on_batch).await
    }

    /// Shared ingestion path for search and popular.
    ///
    /// Streams when the backend answers with an event stream, otherwise
    /// delivers the buffered body as one complete batch. A failed first
    /// attempt falls back once to a plain JSON request; an `error` frame in
    /// a stream is final and not retried.
    async fn ingest<F>(&self, url: Url, mut on_batch: F) -> Result<usize>
    where
        F: FnMut(&[SearchResultItem], bool),
    {
        match self.open(url.clone()).await {
            Ok(Opened::Stream(resp)) => {
                info!("🌊 Received streaming response from {}", url.path());
                let source = Box::pin(resp.bytes_stream());
                return stream::decode_event_stream(source, &mut on_batch).await;
            }
            Ok(Opened::Buffered(items)) => {
                info!("📄 Received regular JSON response with {} results", items.len());
                on_batch(&items, true);
                return Ok(items.len());
            }
            Err(e) => {
                warn!("Request failed, falling back to regular API: {}", e);
            }
        }

        let items = self.fetch_buffered(url).await?;
        info!("📄 Fallback returned {} results", items.len());
        on_batch(&items, true);
        Ok(items.len())
    }

    async fn open(&self, url: Url) -> Result<Opened> {
        let resp = self
            .request(Method::GET, url)
            .header(ACCEPT, "text/event-stream, application/json")
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        if is_event_stream(resp.headers()) {
            return Ok(Opened::Stream(resp));
        }

        let body: Value = resp.json().await?;
        Ok(Opened::Buffered(extract_items(&body)))
    }

    async fn fetch_buffered(&self, url: Url) -> Result<Vec<SearchResultItem>> {
        let resp = self
            .request(Method::GET, url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let resp = error_for_status(resp).await?;
        let body: Value = resp.json().await?;
        Ok(extract_items(&body))
    }

    /// Fetch the playable URL and metadata for a video page
    pub async fn get_video(&self, page_url: &str) -> Result<VideoDetail> {
        <Self as MediaBackend>::get_video(self, page_url).await
    }

    /// Ask the backend to queue a download for a video page
    pub async fn download(&self, page_url: &str, id: Option<u64>) -> Result<DownloadResponse> {
        <Self as MediaBackend>::download(self, page_url, id).await
    }

    /// Download queue status, for one file or overall
    pub async fn download_status(&self, filename: Option<&str>) -> Result<DownloadStatus> {
        // filenames carry library sub-directories, so they travel as a query value
        let path = match filename {
            Some(name) => format!("{}?filename={}", DOWNLOAD_STATUS_PATH, urlencoding::encode(name)),
            None => DOWNLOAD_STATUS_PATH.to_string(),
        };
        let resp = self.request(Method::GET, self.endpoint(&path)?).send().await?;
        let resp = error_for_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Current session, or `None` when the backend refuses with 401/403
    pub async fn user_status(&self) -> Result<Option<UserStatus>> {
        let resp = self
            .request(Method::GET, self.endpoint(USER_STATUS_PATH)?)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        match error_for_status(resp).await {
            Ok(resp) => Ok(Some(resp.json().await?)),
            Err(e) if e.is_unauthorized() => {
                debug!("Session status refused, treating as signed out");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Navigation target that starts the external sign-in flow
    pub fn login_url(&self) -> Result<Url> {
        self.endpoint(LOGIN_PATH)
    }

    /// End the server-side session
    pub async fn logout(&self) -> Result<()> {
        let resp = self.request(Method::GET, self.endpoint(LOGOUT_PATH)?).send().await?;
        error_for_status(resp).await?;
        info!("👋 Logged out");
        Ok(())
    }

    /// Apply a moderation action to a user account
    pub async fn admin_action(&self, user_id: &str, action: &AdminAction) -> Result<String> {
        info!("🛡️ Admin action {} on user {}", action, user_id);
        let resp = self
            .request(Method::POST, self.endpoint(ADMIN_PATH)?)
            .form(&action.form_fields(user_id))
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        // the backend may answer with a redirect to the admin page instead of JSON
        let text = resp.text().await?;
        let message = serde_json::from_str::<MessageBody>(&text)
            .ok()
            .and_then(|m| m.message)
            .unwrap_or_else(|| "OK".to_string());
        Ok(message)
    }
}

#[async_trait]
impl MediaBackend for PortalClient {
    async fn get_video(&self, page_url: &str) -> Result<VideoDetail> {
        let url = self.endpoint(&format!(
            "{}?page_url={}",
            VIDEO_PATH,
            urlencoding::encode(page_url)
        ))?;
        debug!("🎬 Fetching video detail for {}", page_url);

        let resp = self.request(Method::GET, url).send().await?;
        let resp = error_for_status(resp).await?;
        Ok(resp.json().await?)
    }

    async fn download(&self, page_url: &str, id: Option<u64>) -> Result<DownloadResponse> {
        let mut path = format!("{}?page_url={}", DOWNLOAD_PATH, urlencoding::encode(page_url));
        if let Some(id) = id {
            path.push_str(&format!("&id={}", id));
        }
        info!("⬇️ Requesting download for {}", page_url);

        let resp = self.request(Method::POST, self.endpoint(&path)?).send().await?;
        let resp = error_for_status(resp).await?;
        Ok(resp.json().await?)
    }
}

/// Make sure relative endpoint paths join under the configured base path
fn normalize_base(base_url: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).map_err(|e| PortalError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(PortalError::InvalidUrl(base_url.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains(portal_core::sse::EVENT_STREAM))
}

/// Turn a non-2xx response into an error carrying the backend's message
async fn error_for_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(PortalError::Unauthorized);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageBody>(&body)
        .ok()
        .and_then(|m| m.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    Err(PortalError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = normalize_base("http://localhost:5000/portal").unwrap();
        assert_eq!(url.join(SEARCH_PATH).unwrap().as_str(), "http://localhost:5000/portal/api/v2/search");

        let root = normalize_base("http://localhost:5000").unwrap();
        assert_eq!(root.join(POPULAR_PATH).unwrap().as_str(), "http://localhost:5000/api/v2/popular");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(normalize_base("not a url"), Err(PortalError::InvalidUrl(_))));
        assert!(matches!(normalize_base("mailto:a@b"), Err(PortalError::InvalidUrl(_))));
    }

    #[test]
    fn test_query_is_percent_encoded() {
        let client = PortalClient::new("http://localhost:5000").unwrap();
        let url = client
            .endpoint(&format!("{}?q={}", SEARCH_PATH, urlencoding::encode("flushed away & co")))
            .unwrap();
        assert_eq!(url.query(), Some("q=flushed%20away%20%26%20co"));
    }

    #[test]
    fn test_event_stream_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_event_stream(&headers));
        headers.insert(CONTENT_TYPE, "text/event-stream; charset=utf-8".parse().unwrap());
        assert!(is_event_stream(&headers));
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(!is_event_stream(&headers));
    }
}
