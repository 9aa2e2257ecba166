use crate::api::EventStream;
use crate::state::Terminal;
use crate::types::WorkflowRequest;

use super::reducer::Reducer;
use super::session::{SessionController, SessionId};
use super::sink::PatchSink;

/// Feeds every event of `stream` through `reducer`, forwarding patches to
/// `sink` as they are produced. Returns the single terminal outcome, which has
/// also been delivered to the reducer and the sink.
pub async fn drive<R, S>(mut stream: EventStream, reducer: &mut R, sink: &mut S) -> Terminal
where
    R: Reducer,
    S: PatchSink<R::Patch>,
{
    let mut patches = Vec::new();
    let terminal = loop {
        match stream.next_event().await {
            Ok(Some(event)) => {
                let terminal = reducer.apply(&event, &mut patches);
                for patch in patches.drain(..) {
                    sink.on_patch(patch);
                }
                if let Some(terminal) = terminal {
                    stream.close();
                    break terminal;
                }
            }
            Ok(None) => break reducer.end_of_stream(),
            Err(error) => break Terminal::from(&error),
        }
    };

    if stream.dropped_frames() > 0 {
        tracing::warn!(
            workflow = stream.workflow().name(),
            dropped = stream.dropped_frames(),
            "stream contained malformed frames"
        );
    }
    tracing::debug!(workflow = stream.workflow().name(), outcome = terminal.label(), "stream finished");
    finish(reducer, sink, terminal)
}

/// Opens `request` on `session` through the controller and drives it. Failing
/// to open still produces exactly one terminal outcome.
pub async fn run_session<R, S>(
    controller: &SessionController,
    session: &SessionId,
    request: &WorkflowRequest,
    reducer: &mut R,
    sink: &mut S,
) -> Terminal
where
    R: Reducer,
    S: PatchSink<R::Patch>,
{
    let stream = match controller.start(session, request).await {
        Ok(stream) => stream,
        Err(error) => {
            tracing::warn!(%session, %error, "failed to open stream");
            return finish(reducer, sink, Terminal::from(&error));
        }
    };

    let handle = stream.handle().clone();
    let terminal = drive(stream, reducer, sink).await;
    controller.release(session, &handle);
    terminal
}

fn finish<R, S>(reducer: &mut R, sink: &mut S, terminal: Terminal) -> Terminal
where
    R: Reducer,
    S: PatchSink<R::Patch>,
{
    reducer.finish(&terminal);
    sink.on_terminal(&terminal);
    terminal
}
