pub mod client;
pub mod error;
pub mod event_stream;
pub mod mock_client;
pub mod stream;

pub use client::{ByteStream, HttpTransport, StreamTransport};
pub use error::{map_transport_error, StreamError};
pub use event_stream::{EventStream, StreamHandle, StreamStatus};
pub use mock_client::{MockChunk, MockTransport};
pub use stream::{FrameDecoder, Utf8ChunkDecoder};
