//! Signaling wire types
//!
//! The WebSocket strategy exchanges JSON frames of shape
//! `{"type": "offer"|"answer"|"ice-candidate"|"error", "payload": …}`;
//! the HTTP strategy posts a single [`OfferRequest`] and receives an
//! [`AnswerResponse`]. Both strategies share the payload structs here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

/// One signaling frame on the WebSocket strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum SignalFrame {
    /// Local SDP offer
    Offer(SdpPayload),

    /// Remote SDP answer
    Answer(SdpPayload),

    /// Trickled ICE candidate; `None` is the end-of-candidates sentinel
    IceCandidate(Option<CandidatePayload>),

    /// Server-reported signaling error
    Error(ErrorPayload),
}

/// A session description on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SdpPayload {
    /// Raw SDP text
    pub sdp: String,

    /// Description kind
    #[serde(rename = "type")]
    pub kind: SdpKind,
}

/// SDP description kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// Local offer
    Offer,
    /// Remote answer
    Answer,
}

/// An ICE candidate on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidatePayload {
    /// Candidate attribute string
    pub candidate: String,

    /// Media stream identification tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Media line index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,

    /// ICE username fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl From<RTCIceCandidateInit> for CandidatePayload {
    fn from(init: RTCIceCandidateInit) -> Self {
        Self {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_m_line_index: init.sdp_mline_index,
            username_fragment: init.username_fragment,
        }
    }
}

impl From<CandidatePayload> for RTCIceCandidateInit {
    fn from(payload: CandidatePayload) -> Self {
        Self {
            candidate: payload.candidate,
            sdp_mid: payload.sdp_mid,
            sdp_mline_index: payload.sdp_m_line_index,
            username_fragment: payload.username_fragment,
        }
    }
}

/// Error frame payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorPayload {
    /// Human-readable error message
    pub message: String,
}

/// Offer body for the HTTP strategy
/// (`POST /api/v1/pipecat/rtc/offer`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferRequest {
    /// Raw SDP text of the (fully gathered) offer
    pub sdp: String,

    /// Always `"offer"`
    #[serde(rename = "type")]
    pub kind: SdpKind,

    /// Locally generated peer-connection id
    pub pc_id: String,

    /// Ask the backend to recreate its peer connection for this id
    pub restart_pc: bool,

    /// Target workflow
    pub workflow_id: String,

    /// Target workflow run
    pub workflow_run_id: String,

    /// Template variables for the call, frozen at negotiation start
    pub call_context_vars: HashMap<String, String>,
}

/// Answer body returned by the HTTP strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResponse {
    /// Raw SDP text of the answer
    pub sdp: String,
}

impl SignalFrame {
    /// Serialize to a JSON wire string
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::Error::SerializationError(format!("Failed to serialize signaling frame: {}", e))
        })
    }

    /// Parse a frame from a JSON wire string
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            crate::Error::SerializationError(format!(
                "Failed to deserialize signaling frame: {}",
                e
            ))
        })
    }
}
