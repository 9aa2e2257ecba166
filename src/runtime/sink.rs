use tokio::sync::mpsc;

use crate::state::Terminal;

/// Receiver of a reducer's output. Renderers only observe; they never write
/// back into the model.
pub trait PatchSink<P> {
    fn on_patch(&mut self, patch: P);
    fn on_terminal(&mut self, terminal: &Terminal);
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate<P> {
    Patch(P),
    Terminal(Terminal),
}

/// Forwards updates to a channel, e.g. for a UI task.
pub struct ChannelSink<P> {
    tx: mpsc::UnboundedSender<StreamUpdate<P>>,
}

impl<P> ChannelSink<P> {
    pub fn new(tx: mpsc::UnboundedSender<StreamUpdate<P>>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamUpdate<P>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

fn emit_stream_update<P>(tx: &mpsc::UnboundedSender<StreamUpdate<P>>, update: StreamUpdate<P>) {
    // A closed receiver means nobody is rendering any more.
    let _ = tx.send(update);
}

impl<P> PatchSink<P> for ChannelSink<P> {
    fn on_patch(&mut self, patch: P) {
        emit_stream_update(&self.tx, StreamUpdate::Patch(patch));
    }

    fn on_terminal(&mut self, terminal: &Terminal) {
        emit_stream_update(&self.tx, StreamUpdate::Terminal(terminal.clone()));
    }
}

/// Keeps everything in memory; used by tests and batch callers.
#[derive(Debug)]
pub struct CollectingSink<P> {
    pub patches: Vec<P>,
    pub terminals: Vec<Terminal>,
}

impl<P> Default for CollectingSink<P> {
    fn default() -> Self {
        Self {
            patches: Vec::new(),
            terminals: Vec::new(),
        }
    }
}

impl<P> CollectingSink<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminal(&self) -> Option<&Terminal> {
        self.terminals.last()
    }
}

impl<P> PatchSink<P> for CollectingSink<P> {
    fn on_patch(&mut self, patch: P) {
        self.patches.push(patch);
    }

    fn on_terminal(&mut self, terminal: &Terminal) {
        self.terminals.push(terminal.clone());
    }
}
