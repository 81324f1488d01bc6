//! Peer connection ownership and per-call session state

pub mod controller;
pub mod session;

pub use controller::PeerController;
pub use session::{CallContext, ConnectionStatus, PeerSession};
