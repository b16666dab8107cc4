use std::sync::{Arc, Mutex, MutexGuard};

use portal_core::{DownloadResponse, Result, SearchResultItem, VideoDetail};
use tracing::{debug, error, info};

use crate::api::MediaBackend;

/// Identity of one search or listing request.
///
/// Batches carrying a ticket other than the accumulator's current one belong
/// to a superseded query and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryTicket(u64);

/// What a results panel should show right now
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultView<'a> {
    /// No query has been started
    Idle,
    /// Waiting for the first results
    Loading,
    /// Request finished with nothing to show
    Empty,
    /// Results so far; more may follow while loading
    Results(&'a [SearchResultItem]),
    Failed(&'a str),
}

/// Progressive result list for the active query
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    generation: u64,
    started: bool,
    query: String,
    items: Vec<SearchResultItem>,
    loading: bool,
    complete: bool,
    error: Option<String>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new query, discarding everything from the previous one
    pub fn begin(&mut self, query: impl Into<String>) -> QueryTicket {
        self.generation += 1;
        self.started = true;
        self.query = query.into();
        self.items.clear();
        self.loading = true;
        self.complete = false;
        self.error = None;
        debug!("Query #{} started: {}", self.generation, self.query);
        QueryTicket(self.generation)
    }

    pub fn is_current(&self, ticket: QueryTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Append a batch in arrival order. Returns false for stale tickets.
    pub fn apply(&mut self, ticket: QueryTicket, items: &[SearchResultItem], complete: bool) -> bool {
        if !self.is_current(ticket) {
            debug!(
                "Dropping {} results from superseded query #{}",
                items.len(),
                ticket.0
            );
            return false;
        }
        if self.complete || self.error.is_some() {
            return false;
        }

        self.items.extend_from_slice(items);
        if complete {
            self.complete = true;
            self.loading = false;
            info!("📊 Query '{}' finished with {} results", self.query, self.items.len());
        }
        true
    }

    /// Record a user-visible failure for the current query
    pub fn fail(&mut self, ticket: QueryTicket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let message = message.into();
        error!("❌ Query '{}' failed: {}", self.query, message);
        self.error = Some(message);
        self.loading = false;
        true
    }

    pub fn view(&self) -> ResultView<'_> {
        if let Some(message) = &self.error {
            return ResultView::Failed(message);
        }
        if !self.items.is_empty() {
            return ResultView::Results(&self.items);
        }
        match (self.started, self.loading) {
            (false, _) => ResultView::Idle,
            (true, true) => ResultView::Loading,
            (true, false) => ResultView::Empty,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn items(&self) -> &[SearchResultItem] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Accumulator shared with the tasks that feed it
pub type SharedAccumulator = Arc<Mutex<ResultAccumulator>>;

pub fn shared_accumulator() -> SharedAccumulator {
    Arc::new(Mutex::new(ResultAccumulator::new()))
}

/// Lock the accumulator; a panic in another holder leaves plain data behind
pub fn lock(shared: &SharedAccumulator) -> MutexGuard<'_, ResultAccumulator> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Batch callback that feeds `shared` under `ticket`
pub fn feeder(
    shared: &SharedAccumulator,
    ticket: QueryTicket,
) -> impl FnMut(&[SearchResultItem], bool) + Send + 'static {
    let shared = Arc::clone(shared);
    move |items, complete| {
        lock(&shared).apply(ticket, items, complete);
    }
}

/// Download button state for one result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DownloadState {
    #[default]
    Idle,
    Downloading,
    Succeeded(String),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct DownloadTracker {
    state: DownloadState,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DownloadState {
        &self.state
    }

    /// Downloads start from idle or, as a manual retry, after a failure
    pub fn can_start(&self) -> bool {
        matches!(self.state, DownloadState::Idle | DownloadState::Failed(_))
    }

    /// Move to `Downloading` if allowed; returns false otherwise
    pub fn begin(&mut self) -> bool {
        if !self.can_start() {
            return false;
        }
        self.state = DownloadState::Downloading;
        true
    }

    /// Record the backend's answer for `item`
    pub fn finish(&mut self, item: &SearchResultItem, result: Result<DownloadResponse>) -> &DownloadState {
        self.state = match result {
            Ok(_) => {
                let message = format!("{} has been added to the download queue", item.display_title());
                info!("✅ {}", message);
                DownloadState::Succeeded(message)
            }
            Err(e) => {
                error!("❌ Download failed for {}: {}", item.page_url, e);
                DownloadState::Failed(e.to_string())
            }
        };
        &self.state
    }

    /// Request a download for `item`. A no-op while one is running or done.
    pub async fn start(
        &mut self,
        backend: &dyn MediaBackend,
        item: &SearchResultItem,
    ) -> &DownloadState {
        if !self.begin() {
            debug!("Download for {} already {:?}", item.page_url, self.state);
            return &self.state;
        }
        let result = backend.download(&item.page_url, item.id).await;
        self.finish(item, result)
    }
}

/// Video page state, owned by whoever navigated to it
#[derive(Debug)]
pub enum VideoView {
    Loading,
    Ready(VideoDetail),
    Failed(String),
}

impl VideoView {
    /// Fetch the video behind `page_url`
    pub async fn load(backend: &dyn MediaBackend, page_url: &str) -> Self {
        let view = Self::from_result(backend.get_video(page_url).await);
        if let VideoView::Failed(message) = &view {
            error!("Video fetch error for {}: {}", page_url, message);
        }
        view
    }

    pub fn from_result(result: Result<VideoDetail>) -> Self {
        match result {
            Ok(detail) => VideoView::Ready(detail),
            Err(e) => VideoView::Failed(format!("Failed to load video data: {}", e)),
        }
    }

    pub fn detail(&self) -> Option<&VideoDetail> {
        match self {
            VideoView::Ready(detail) => Some(detail),
            _ => None,
        }
    }
}
