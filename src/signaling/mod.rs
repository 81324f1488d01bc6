//! Signaling transports
//!
//! Two interchangeable wire strategies carry the offer/answer/candidates:
//! a single HTTP round trip with a fully-gathered offer
//! ([`http::HttpSignaling`]), and a persistent WebSocket that trickles
//! candidates as they are discovered ([`ws::WebSocketSignaling`]). Both are
//! first-class; [`crate::config::SignalingMode`] selects one per call.

pub mod http;
pub mod protocol;
pub mod ws;

use crate::Result;
use async_trait::async_trait;
use protocol::{CandidatePayload, OfferRequest, SdpPayload};
use tokio::sync::mpsc;

pub use http::HttpSignaling;
pub use ws::WebSocketSignaling;

/// Asynchronous events produced by a trickle-capable transport
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    /// Remote answer arrived
    Answer(SdpPayload),

    /// Remote ICE candidate arrived
    RemoteCandidate(CandidatePayload),

    /// Server reported a signaling error
    Error(String),

    /// The transport closed. Whether this is a failure depends on whether
    /// the session was still active (the controller decides).
    Closed,
}

/// One interface over both wire strategies.
///
/// The HTTP strategy answers the offer inline and produces no events; the
/// WebSocket strategy answers asynchronously through [`Self::take_events`].
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Whether candidates trickle as discovered. When `false`, the caller
    /// must wait for ICE gathering to complete before sending the offer.
    fn trickles(&self) -> bool;

    /// Send the offer. Returns the answer inline for request/response
    /// strategies, `None` when the answer arrives via events.
    async fn send_offer(&self, offer: OfferRequest) -> Result<Option<SdpPayload>>;

    /// Forward a local ICE candidate (`None` = end-of-candidates sentinel).
    /// No-op on non-trickling strategies.
    async fn send_candidate(&self, candidate: Option<CandidatePayload>) -> Result<()>;

    /// Take the inbound event stream. Yields `Some` exactly once on
    /// trickling strategies, `None` on request/response strategies.
    fn take_events(&self) -> Option<mpsc::Receiver<SignalEvent>>;

    /// Close the transport. Idempotent.
    async fn close(&self) -> Result<()>;
}
