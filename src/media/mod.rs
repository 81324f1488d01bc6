//! Local media acquisition
//!
//! [`MediaSource`] is the seam between the call lifecycle and the platform
//! audio stack: the production implementation ([`capture::MicrophoneSource`])
//! captures from a cpal input device and Opus-encodes into the outgoing
//! track; tests substitute a source that never produces samples.

#[cfg(feature = "device-cpal")]
pub mod capture;

use crate::config::AudioCaptureConfig;
use crate::Result;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::oneshot;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Produces the local audio track for a call
pub trait MediaSource: Send + Sync {
    /// Create a track capturing from `device_id`, or from the system default
    /// input when `None`.
    fn create_track(
        &self,
        config: &AudioCaptureConfig,
        device_id: Option<&str>,
    ) -> Result<MediaTrackHandle>;
}

/// A live local track plus the handle that stops its producer
pub struct MediaTrackHandle {
    track: Arc<TrackLocalStaticSample>,
    stop_tx: StdMutex<Option<oneshot::Sender<()>>>,
}

impl MediaTrackHandle {
    /// Wrap a track with an optional producer shutdown channel
    pub fn new(track: Arc<TrackLocalStaticSample>, stop_tx: Option<oneshot::Sender<()>>) -> Self {
        Self {
            track,
            stop_tx: StdMutex::new(stop_tx),
        }
    }

    /// The underlying local track
    pub fn track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }

    /// Stop the producer. Idempotent; no further samples are written after
    /// this returns.
    pub fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().expect("media lock poisoned").take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MediaTrackHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fallback source for builds without an audio backend; every acquisition
/// fails with a device error.
#[derive(Debug, Default)]
pub struct UnavailableSource;

impl MediaSource for UnavailableSource {
    fn create_track(
        &self,
        _config: &AudioCaptureConfig,
        _device_id: Option<&str>,
    ) -> Result<MediaTrackHandle> {
        Err(crate::Error::DeviceError(
            "Built without the device-cpal feature; no audio input backend available".to_string(),
        ))
    }
}
