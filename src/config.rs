//! Configuration types for the call client

use serde::{Deserialize, Serialize};

/// Main configuration for [`CallController`](crate::call::CallController)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtcClientConfig {
    /// Backend base URL (http:// or https://)
    pub api_base_url: String,

    /// Signaling strategy used to exchange the offer/answer
    pub signaling: SignalingMode,

    /// ICE server list (STUN only in the default deployment)
    pub ice_servers: Vec<IceServerConfig>,

    /// Audio capture parameters for the microphone track
    pub audio: AudioCaptureConfig,

    /// Restrict the outgoing offer's audio section to this codec before
    /// sending it over the HTTP strategy (`None` sends the offer untouched)
    pub offer_codec_filter: Option<AudioCodec>,

    /// Ask the backend to tear down and recreate its peer connection for
    /// this `pc_id` instead of reusing one
    pub restart_pc: bool,

    /// Delay between closing the transport and closing the peer connection
    /// on stop, in milliseconds (lets in-flight close frames flush)
    pub teardown_delay_ms: u64,
}

/// Which wire strategy carries the offer/answer/candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalingMode {
    /// Single HTTP round trip with a fully-gathered (non-trickled) offer
    Http,
    /// Persistent WebSocket with trickle ICE
    WebSocket,
}

/// ICE server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    /// Server URLs (stun: or turn:)
    pub urls: Vec<String>,

    /// Username (for TURN)
    pub username: Option<String>,

    /// Credential (for TURN)
    pub credential: Option<String>,
}

impl Default for IceServerConfig {
    fn default() -> Self {
        Self {
            urls: vec!["stun:stun.l.google.com:19302".to_string()],
            username: None,
            credential: None,
        }
    }
}

/// Audio capture parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioCaptureConfig {
    /// Capture sample rate in Hz (must be an Opus rate)
    pub sample_rate: u32,

    /// Channel count (1 = mono)
    pub channels: u16,

    /// Opus frame duration in milliseconds (10, 20, 40 or 60)
    pub frame_ms: u32,
}

impl Default for AudioCaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            frame_ms: 20,
        }
    }
}

impl AudioCaptureConfig {
    /// Samples per encoded frame (per channel)
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate / 1000 * self.frame_ms) as usize
    }
}

/// Supported audio codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// Opus codec (default, required for WebRTC audio)
    Opus,
}

impl AudioCodec {
    /// Codec name as it appears in SDP rtpmap lines
    pub fn sdp_name(&self) -> &'static str {
        match self {
            AudioCodec::Opus => "opus",
        }
    }
}

impl Default for RtcClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            signaling: SignalingMode::WebSocket,
            ice_servers: vec![IceServerConfig::default()],
            audio: AudioCaptureConfig::default(),
            offer_codec_filter: Some(AudioCodec::Opus),
            restart_pc: false,
            teardown_delay_ms: 500,
        }
    }
}

impl RtcClientConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `api_base_url` is not an http(s) URL
    /// - an ICE server entry has no URLs
    /// - `teardown_delay_ms` exceeds 5000
    /// - audio parameters are outside Opus bounds
    ///
    /// An empty `ice_servers` list is valid: host candidates only, for
    /// single-network deployments.
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "api_base_url must start with http:// or https://, got {}",
                self.api_base_url
            )));
        }

        if self.ice_servers.iter().any(|server| server.urls.is_empty()) {
            return Err(Error::InvalidConfig(
                "ICE server entries must have at least one URL".to_string(),
            ));
        }

        if self.teardown_delay_ms > 5000 {
            return Err(Error::InvalidConfig(format!(
                "teardown_delay_ms must be at most 5000, got {}",
                self.teardown_delay_ms
            )));
        }

        if !matches!(self.audio.sample_rate, 8000 | 12_000 | 16_000 | 24_000 | 48_000) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate must be an Opus rate (8/12/16/24/48 kHz), got {}",
                self.audio.sample_rate
            )));
        }

        if !matches!(self.audio.channels, 1 | 2) {
            return Err(Error::InvalidConfig(format!(
                "channels must be 1 or 2, got {}",
                self.audio.channels
            )));
        }

        if !matches!(self.audio.frame_ms, 10 | 20 | 40 | 60) {
            return Err(Error::InvalidConfig(format!(
                "frame_ms must be one of 10/20/40/60, got {}",
                self.audio.frame_ms
            )));
        }

        Ok(())
    }

    /// Set the backend base URL
    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = url.to_string();
        self
    }

    /// Select the signaling strategy
    pub fn with_signaling(mut self, mode: SignalingMode) -> Self {
        self.signaling = mode;
        self
    }

    /// Replace the ICE server list
    pub fn with_ice_servers(mut self, servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = servers;
        self
    }

    /// Set the post-stop teardown delay
    pub fn with_teardown_delay_ms(mut self, ms: u64) -> Self {
        self.teardown_delay_ms = ms;
        self
    }
}
