//! Error types for the call client

use crate::validation::ValidationErrors;

/// Result type alias using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while establishing or running a call
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Microphone or device access denied / unavailable
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Audio device enumeration or capture error
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Backend rejected the provider or workflow configuration
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Backend API returned an unexpected response
    #[error("API error: {0}")]
    ApiError(String),

    /// Signaling connection error
    #[error("Signaling error: {0}")]
    SignalingError(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// SDP negotiation error
    #[error("SDP negotiation error: {0}")]
    SdpError(String),

    /// ICE candidate error
    #[error("ICE candidate error: {0}")]
    IceCandidateError(String),

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnectionError(String),

    /// Media track error
    #[error("Media track error: {0}")]
    MediaTrackError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is a device/permission error (retryable by the user)
    pub fn is_permission(&self) -> bool {
        matches!(self, Error::PermissionDenied(_) | Error::DeviceError(_))
    }

    /// Check if this error carries structured validation issues
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Check if this error came from the signaling path
    pub fn is_signaling(&self) -> bool {
        matches!(
            self,
            Error::SignalingError(_) | Error::WebSocketError(_) | Error::ApiError(_)
        )
    }

    /// A message suitable for surfacing directly to the user.
    ///
    /// Permission and validation errors are shown as-is; everything else is
    /// wrapped in a generic prefix so internal detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::PermissionDenied(msg) => msg.clone(),
            Error::Validation(errors) => errors.to_string(),
            other => format!("Call failed: {}", other),
        }
    }
}
