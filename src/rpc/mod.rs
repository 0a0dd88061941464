//! gRPC channel holder shared across sessions.
//!
//! Grounded on the `tonic`/`prost` stack and `Endpoint` configuration shape
//! used by the daq client in the wider corpus, adapted to this crate's
//! single bidirectional-streaming RPC.

pub mod proto {
    #![allow(missing_docs)]
    tonic::include_proto!("vision");
}

use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

pub use proto::vision_client::VisionClient;
pub use proto::{Box as WireBox, Detection as WireDetection, Frame as WireFrame, ImageFormat};
pub use proto::Result as WireResult;

use crate::error::AivError;

const MAX_MESSAGE_BYTES: usize = 32 * 1024 * 1024;

/// Process-wide gRPC channel, cheap to clone. The underlying HTTP/2
/// connection is reference counted and multiplexes every session's
/// streaming call.
#[derive(Clone)]
pub struct RpcChannel {
    channel: Channel,
}

impl RpcChannel {
    /// Builds a channel without dialing. `connect_lazy` defers the actual
    /// TCP/TLS handshake to first use, so this can be called from plain
    /// synchronous code (`Session::init`) without needing a tokio runtime
    /// on the calling thread; the dial happens on whichever worker thread
    /// first drives the stream.
    pub fn connect(target: &str) -> Result<Self, AivError> {
        let uri = format!("http://{}", target);
        let endpoint = Endpoint::from_shared(uri)
            .map_err(|e| AivError::Grpc(e.to_string()))?
            .http2_keep_alive_interval(Duration::from_secs(15))
            .keep_alive_timeout(Duration::from_secs(5))
            .keep_alive_while_idle(true);

        let channel = endpoint.connect_lazy();
        Ok(Self { channel })
    }

    pub fn client(&self) -> VisionClient<Channel> {
        VisionClient::new(self.channel.clone())
            .max_decoding_message_size(MAX_MESSAGE_BYTES)
            .max_encoding_message_size(MAX_MESSAGE_BYTES)
    }
}
