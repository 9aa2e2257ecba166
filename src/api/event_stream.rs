use super::client::{ByteStream, StreamTransport};
use super::error::StreamError;
use super::stream::FrameDecoder;
use crate::types::{RawEvent, Workflow, WorkflowRequest};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Cloneable cancellation handle for one stream. Clones also observe when the
/// stream has stopped reading for any reason.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: u64,
    token: CancellationToken,
    finished: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn new() -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// True once the stream ended, failed, was closed or was dropped.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn is_live(&self) -> bool {
        !self.is_cancelled() && !self.is_finished()
    }

    fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

impl Default for StreamHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for StreamHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StreamHandle {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Open,
    /// Natural end of the body, or closed after the reducer reached a terminal event.
    Closed,
    Aborted,
    Failed,
}

enum ChunkRead {
    Data(Bytes),
    End,
    Cancelled,
    Failed(StreamError),
}

/// One response body turned into an ordered, single-pass sequence of events.
pub struct EventStream {
    handle: StreamHandle,
    workflow: Workflow,
    body: ByteStream,
    decoder: FrameDecoder,
    queue: VecDeque<RawEvent>,
    status: StreamStatus,
    failure: Option<StreamError>,
    idle_timeout: Option<Duration>,
}

impl EventStream {
    pub fn new(body: ByteStream, handle: StreamHandle, workflow: Workflow) -> Self {
        Self {
            handle,
            workflow,
            body,
            decoder: FrameDecoder::new(),
            queue: VecDeque::new(),
            status: StreamStatus::Open,
            failure: None,
            idle_timeout: None,
        }
    }

    /// Issues the request and wraps the response. Cancelling `handle` while the
    /// request is still connecting aborts it.
    pub async fn open(
        transport: &dyn StreamTransport,
        request: &WorkflowRequest,
        handle: StreamHandle,
    ) -> Result<Self, StreamError> {
        let body = tokio::select! {
            biased;
            _ = handle.cancelled() => return Err(StreamError::Cancelled),
            body = transport.open(request) => body?,
        };
        Ok(Self::new(body, handle, request.workflow()))
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }

    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn dropped_frames(&self) -> usize {
        self.decoder.dropped_frames()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Next event in arrival order. `Ok(None)` once the body ended; after
    /// cancellation or a transport failure every call returns that error.
    pub async fn next_event(&mut self) -> Result<Option<RawEvent>, StreamError> {
        loop {
            match self.status {
                StreamStatus::Open => {}
                StreamStatus::Closed => return Ok(None),
                StreamStatus::Aborted => return Err(StreamError::Cancelled),
                StreamStatus::Failed => {
                    return Err(self
                        .failure
                        .clone()
                        .unwrap_or(StreamError::Cancelled))
                }
            }

            if self.handle.is_cancelled() {
                self.abort();
                return Err(StreamError::Cancelled);
            }

            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }

            match self.read_chunk().await {
                ChunkRead::Data(bytes) => {
                    let events = self.decoder.process(&bytes);
                    self.queue.extend(events);
                }
                ChunkRead::End => {
                    self.decoder.finish();
                    self.status = StreamStatus::Closed;
                    self.handle.mark_finished();
                    tracing::debug!(stream = self.handle.id, "stream ended");
                    return Ok(None);
                }
                ChunkRead::Cancelled => {
                    self.abort();
                    return Err(StreamError::Cancelled);
                }
                ChunkRead::Failed(error) => {
                    tracing::debug!(stream = self.handle.id, %error, "stream failed");
                    self.status = StreamStatus::Failed;
                    self.failure = Some(error.clone());
                    self.handle.mark_finished();
                    self.release_body();
                    return Err(error);
                }
            }
        }
    }

    async fn read_chunk(&mut self) -> ChunkRead {
        let handle = self.handle.clone();
        let idle_timeout = self.idle_timeout;
        let body = &mut self.body;
        let read = async move {
            match idle_timeout {
                Some(limit) => tokio::time::timeout(limit, body.next())
                    .await
                    .map_err(|_| StreamError::Idle(limit)),
                None => Ok(body.next().await),
            }
        };

        tokio::select! {
            biased;
            _ = handle.cancelled() => ChunkRead::Cancelled,
            result = read => match result {
                Ok(Some(Ok(bytes))) => ChunkRead::Data(bytes),
                Ok(Some(Err(error))) | Err(error) => ChunkRead::Failed(error),
                Ok(None) => ChunkRead::End,
            },
        }
    }

    /// Stops reading after the consumer reached a terminal event. Events still
    /// queued are discarded.
    pub fn close(&mut self) {
        if self.status == StreamStatus::Open {
            self.status = StreamStatus::Closed;
            self.queue.clear();
            self.release_body();
        }
    }

    fn abort(&mut self) {
        if self.status == StreamStatus::Open {
            tracing::info!(stream = self.handle.id, workflow = self.workflow.name(), "stream cancelled");
            self.status = StreamStatus::Aborted;
            self.queue.clear();
            self.release_body();
        }
    }

    // Dropping the body aborts the underlying HTTP read.
    fn release_body(&mut self) {
        self.handle.mark_finished();
        self.body = Box::pin(futures::stream::empty());
    }

    /// Lazy view of the remaining events. Ends after the first error.
    pub fn into_events(self) -> impl Stream<Item = Result<RawEvent, StreamError>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut stream = state?;
            match stream.next_event().await {
                Ok(Some(event)) => Some((Ok(event), Some(stream))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.handle.mark_finished();
    }
}
