//! Real-time call client for VoxFlow voice-agent workflows
//!
//! This crate establishes and manages the live audio session between a
//! client and the VoxFlow media backend: it validates the account and
//! workflow configuration, captures microphone audio, negotiates a WebRTC
//! peer connection, and drives the per-call lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Embedding app (UI, demo CLI)                        │
//! │  ↓ start/stop + status watch                         │
//! │  CallController                                      │
//! │  ├─ ControlApi (provider / workflow validation)      │
//! │  ├─ DeviceInputManager (input device snapshots)      │
//! │  ├─ MediaSource (cpal capture → Opus track)          │
//! │  └─ PeerController (one RTCPeerConnection per call)  │
//! │     └─ SignalingTransport                            │
//! │        ├─ HttpSignaling (full offer, one POST)       │
//! │        └─ WebSocketSignaling (trickle ICE)           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Two signaling strategies carry the offer/answer exchange: a single HTTP
//! round trip with a fully-gathered offer, and a persistent WebSocket that
//! sends the offer immediately and trickles candidates. `disconnected` on
//! the ICE layer is treated as the server hanging up — a graceful
//! completion, not a failure.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use voxflow_rtc::auth::{AuthPrincipal, AuthSession, LocalUser};
//! use voxflow_rtc::{CallContext, CallController, RtcClientConfig};
//!
//! # async fn example() -> voxflow_rtc::Result<()> {
//! let config = RtcClientConfig::default().with_api_base_url("https://api.voxflow.dev");
//! let auth = Arc::new(AuthSession::new(AuthPrincipal::Local(LocalUser {
//!     username: "dev".to_string(),
//!     access_token: Some("token".to_string()),
//! })));
//!
//! let calls = CallController::new(config, auth)?;
//! calls.start("wf-1", "run-1", CallContext::new()).await?;
//! calls.stop().await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod auth;
pub mod call;
pub mod config;
pub mod device;
pub mod error;
pub mod history;
pub mod media;
pub mod peer;
pub mod signaling;
pub mod validation;

// Re-exports for public API
pub use call::{CallController, DefaultSignalingFactory, SignalingFactory};
pub use config::{AudioCaptureConfig, AudioCodec, IceServerConfig, RtcClientConfig, SignalingMode};
pub use device::{AudioInputDevice, DeviceInputManager, DeviceSnapshot};
pub use error::{Error, Result};
pub use history::History;
pub use peer::{CallContext, ConnectionStatus, PeerController, PeerSession};
pub use validation::{ControlApi, ValidationErrors, ValidationIssue};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
