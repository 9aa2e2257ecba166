use super::client::{ByteStream, StreamTransport};
use super::error::StreamError;
use crate::types::WorkflowRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One scripted read from a mock response body.
#[derive(Debug, Clone)]
pub enum MockChunk {
    Bytes(Bytes),
    Error(StreamError),
}

impl MockChunk {
    pub fn text(text: impl Into<String>) -> Self {
        MockChunk::Bytes(Bytes::from(text.into()))
    }
}

#[derive(Debug, Clone)]
struct MockResponse {
    chunks: Vec<MockChunk>,
    hang: bool,
}

/// Transport that replays scripted response bodies, one per `open` call, and
/// records the requests it was given.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<WorkflowRequest>>>,
}

impl MockTransport {
    /// Each inner vector is one response; each string one frame, delivered as its
    /// own chunk and terminated with `\n\n` if it is not already.
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        let transport = Self::default();
        for frames in responses {
            let chunks = frames
                .into_iter()
                .map(|frame| {
                    if frame.ends_with("\n\n") {
                        MockChunk::text(frame)
                    } else {
                        MockChunk::text(format!("{frame}\n\n"))
                    }
                })
                .collect();
            transport.push_response(chunks, false);
        }
        transport
    }

    /// Queues a response delivered exactly as the given chunks.
    pub fn push_chunks(&self, chunks: Vec<MockChunk>) {
        self.push_response(chunks, false);
    }

    /// Queues a response that delivers the chunks and then never ends, like a
    /// backend that stalls mid-task.
    pub fn push_hanging(&self, chunks: Vec<MockChunk>) {
        self.push_response(chunks, true);
    }

    fn push_response(&self, chunks: Vec<MockChunk>, hang: bool) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(MockResponse { chunks, hang });
    }

    pub fn requests(&self) -> Vec<WorkflowRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl StreamTransport for MockTransport {
    async fn open(&self, request: &WorkflowRequest) -> Result<ByteStream, StreamError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let response = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .ok_or_else(|| StreamError::Connect {
                url: format!("mock://{}", request.workflow().endpoint_path()),
                message: "no more responses configured".to_string(),
            })?;

        let items: Vec<Result<Bytes, StreamError>> = response
            .chunks
            .into_iter()
            .map(|chunk| match chunk {
                MockChunk::Bytes(bytes) => Ok(bytes),
                MockChunk::Error(error) => Err(error),
            })
            .collect();

        let tail: ByteStream = if response.hang {
            Box::pin(stream::pending())
        } else {
            Box::pin(stream::empty())
        };
        Ok(Box::pin(stream::iter(items).chain(tail)))
    }
}
