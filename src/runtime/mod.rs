mod driver;
mod reducer;
mod session;
mod sink;

pub use driver::{drive, run_session};
pub use reducer::Reducer;
pub use session::{SessionController, SessionId};
pub use sink::{ChannelSink, CollectingSink, PatchSink, StreamUpdate};
