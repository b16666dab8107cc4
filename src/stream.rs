//! Incremental decoding of event-stream responses into result batches.
//!
//! `batch_stream` is the async-stream form: callers that stop polling simply
//! drop it and no further chunks are read. `drive` adapts it to the
//! `on_batch(items, is_complete)` callback contract.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};
use portal_core::sse::{self, FrameEvent, LineBuffer};
use portal_core::{PortalError, Result, SearchResultItem, StreamBatch};
use tracing::{debug, info, warn};

struct DecodeState<S> {
    source: S,
    lines: LineBuffer,
    ready: VecDeque<Result<StreamBatch>>,
    finished: bool,
}

impl<S> DecodeState<S> {
    /// Handle one complete line. Returns true once the request is over.
    fn absorb(&mut self, line: &str) -> bool {
        let events = match sse::parse_line(line) {
            None => return false,
            Some(Err(e)) => {
                warn!("Failed to parse SSE data: {} ({})", line, e);
                return false;
            }
            Some(Ok(events)) => events,
        };

        for event in events {
            match event {
                FrameEvent::Batch(items) => {
                    debug!("📦 Received batch with {} results", items.len());
                    self.ready.push_back(Ok(StreamBatch::partial(items)));
                }
                FrameEvent::Failed(message) => {
                    warn!("❌ Stream reported error: {}", message);
                    self.ready.push_back(Err(PortalError::Stream(message)));
                    self.finished = true;
                    return true;
                }
                FrameEvent::Complete => {
                    info!("✅ Streaming complete");
                    self.ready.push_back(Ok(StreamBatch::terminal()));
                    self.finished = true;
                    return true;
                }
            }
        }
        false
    }

    fn end_of_input(&mut self) {
        if let Some(line) = self.lines.finish() {
            if self.absorb(&line) {
                return;
            }
        }
        debug!("Stream closed without completion marker, treating as done");
        self.ready.push_back(Ok(StreamBatch::terminal()));
        self.finished = true;
    }
}

/// Decode a byte stream into batches.
///
/// The sequence always ends with exactly one item that is either a terminal
/// batch (`complete == true`) or an error. Transport errors while reading end
/// the sequence with that error.
pub fn batch_stream<S, B, E>(source: S) -> impl Stream<Item = Result<StreamBatch>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<PortalError>,
{
    let state = DecodeState {
        source,
        lines: LineBuffer::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(next) = state.ready.pop_front() {
                return Some((next, state));
            }
            if state.finished {
                return None;
            }

            match state.source.next().await {
                Some(Ok(chunk)) => {
                    for line in state.lines.push(chunk.as_ref()) {
                        if state.absorb(&line) {
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    let err: PortalError = e.into();
                    warn!("Stream read failed: {}", err);
                    state.ready.push_back(Err(err));
                    state.finished = true;
                }
                None => state.end_of_input(),
            }
        }
    })
}

/// Feed batches to `on_batch` until the terminal one.
///
/// Exactly one call has `is_complete == true` and it is the last call. Errors
/// are returned instead of a terminal callback. Returns the number of items
/// delivered.
pub async fn drive<St, F>(batches: St, mut on_batch: F) -> Result<usize>
where
    St: Stream<Item = Result<StreamBatch>>,
    F: FnMut(&[SearchResultItem], bool),
{
    let mut batches = std::pin::pin!(batches);
    let mut delivered = 0;

    while let Some(batch) = batches.next().await {
        let batch = batch?;
        delivered += batch.items.len();
        on_batch(&batch.items, batch.complete);
        if batch.complete {
            return Ok(delivered);
        }
    }

    // source ended without a terminal batch
    on_batch(&[], true);
    Ok(delivered)
}

/// Decode an event stream straight into the callback
pub async fn decode_event_stream<S, B, E, F>(source: S, on_batch: F) -> Result<usize>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<PortalError>,
    F: FnMut(&[SearchResultItem], bool),
{
    drive(batch_stream(source), on_batch).await
}
