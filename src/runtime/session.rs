use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{EventStream, StreamError, StreamHandle, StreamTransport};
use crate::types::WorkflowRequest;

/// Logical session a stream belongs to, e.g. one chat conversation or the
/// report panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Keeps at most one open stream per session.
pub struct SessionController {
    transport: Arc<dyn StreamTransport>,
    active: Mutex<HashMap<SessionId, StreamHandle>>,
    idle_timeout: Option<Duration>,
}

impl SessionController {
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            transport,
            active: Mutex::new(HashMap::new()),
            idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn active(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, StreamHandle>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Opens a stream for `session`. A stream still open on the same session is
    /// cancelled before the new request is issued.
    pub async fn start(
        &self,
        session: &SessionId,
        request: &WorkflowRequest,
    ) -> Result<EventStream, StreamError> {
        let handle = StreamHandle::new();
        let previous = self.active().insert(session.clone(), handle.clone());
        if let Some(previous) = previous {
            tracing::info!(%session, stream = previous.id(), "cancelling superseded stream");
            previous.cancel();
        }

        tracing::debug!(%session, stream = handle.id(), workflow = request.workflow().name(), "starting stream");
        match EventStream::open(self.transport.as_ref(), request, handle.clone()).await {
            Ok(stream) => Ok(stream.with_idle_timeout(self.idle_timeout)),
            Err(error) => {
                self.release(session, &handle);
                Err(error)
            }
        }
    }

    /// Idempotent; cancelling a finished or already cancelled stream does nothing.
    pub fn cancel(&self, handle: &StreamHandle) {
        handle.cancel();
        self.active().retain(|_, active| active != handle);
    }

    pub fn cancel_session(&self, session: &SessionId) -> bool {
        match self.active().remove(session) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Forgets a stream that ended on its own. Does nothing if the session has
    /// moved on to a newer stream.
    pub fn release(&self, session: &SessionId, handle: &StreamHandle) {
        let mut active = self.active();
        if active.get(session) == Some(handle) {
            active.remove(session);
        }
    }

    /// A stream that already stopped reading counts as inactive even when its
    /// caller never called [`SessionController::release`].
    pub fn is_active(&self, session: &SessionId) -> bool {
        self.active().get(session).is_some_and(StreamHandle::is_live)
    }

    pub fn active_handle(&self, session: &SessionId) -> Option<StreamHandle> {
        self.active()
            .get(session)
            .filter(|handle| handle.is_live())
            .cloned()
    }
}
