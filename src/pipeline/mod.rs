//! Encode → send → receive pipeline glue that sits between camera capture
//! and the gRPC transport.

pub mod encoder;
pub mod receiver;
pub mod sender;
pub mod shared;

pub use encoder::EncoderWorker;
pub use receiver::ReceiveWorker;
pub use sender::SendWorker;
pub use shared::{Callbacks, SharedConfig};
