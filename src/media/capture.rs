//! Microphone capture via cpal
//!
//! The cpal input stream is not `Send`, so it lives on a dedicated OS
//! thread: the stream callback accumulates f32 samples into fixed-size
//! frames, Opus-encodes them, and pushes the packets over a bounded channel
//! to an async writer task that feeds the WebRTC track.

use super::{MediaSource, MediaTrackHandle};
use crate::config::AudioCaptureConfig;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Captures microphone audio into an Opus track
#[derive(Debug, Default)]
pub struct MicrophoneSource;

impl MicrophoneSource {
    /// Create a microphone source using the default host
    pub fn new() -> Self {
        Self
    }

    fn open_device(device_id: Option<&str>) -> Result<cpal::Device> {
        let host = cpal::default_host();

        if let Some(wanted) = device_id {
            let mut devices = host.input_devices().map_err(|e| {
                Error::PermissionDenied(format!("Failed to enumerate input devices: {}", e))
            })?;
            if let Some(device) = devices.find(|d| d.name().map(|n| n == wanted).unwrap_or(false)) {
                return Ok(device);
            }
            // Selected device vanished; fall back to the system default.
            warn!(device = wanted, "Selected input device not found, using default");
        }

        host.default_input_device().ok_or_else(|| {
            Error::PermissionDenied("No audio input device available".to_string())
        })
    }

    fn stream_config(
        device: &cpal::Device,
        config: &AudioCaptureConfig,
    ) -> Result<cpal::StreamConfig> {
        let supported = device.supported_input_configs().map_err(|e| {
            Error::PermissionDenied(format!("Failed to query input formats: {}", e))
        })?;

        for range in supported {
            if range.channels() == config.channels
                && range.sample_format() == cpal::SampleFormat::F32
                && range.min_sample_rate().0 <= config.sample_rate
                && range.max_sample_rate().0 >= config.sample_rate
            {
                return Ok(range
                    .with_sample_rate(cpal::SampleRate(config.sample_rate))
                    .config());
            }
        }

        Err(Error::DeviceError(format!(
            "Input device does not support {} Hz / {} channel f32 capture",
            config.sample_rate, config.channels
        )))
    }
}

impl MediaSource for MicrophoneSource {
    fn create_track(
        &self,
        config: &AudioCaptureConfig,
        device_id: Option<&str>,
    ) -> Result<MediaTrackHandle> {
        let device = Self::open_device(device_id)?;
        let stream_config = Self::stream_config(&device, config)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        // Opus RTP always advertises a 48 kHz / 2-channel clock regardless of
        // the encoder's actual input rate.
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: "audio/opus".to_string(),
                clock_rate: 48_000,
                channels: 2,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
                rtcp_feedback: vec![],
            },
            "audio".to_string(),
            "voxflow-call".to_string(),
        ));

        let channels = match config.channels {
            1 => opus::Channels::Mono,
            _ => opus::Channels::Stereo,
        };
        let mut encoder =
            opus::Encoder::new(config.sample_rate, channels, opus::Application::Voip)
                .map_err(|e| Error::MediaTrackError(format!("Opus encoder init failed: {}", e)))?;

        let frame_len = config.frame_samples() * config.channels as usize;
        let frame_duration = Duration::from_millis(config.frame_ms as u64);
        let (packet_tx, mut packet_rx) = mpsc::channel::<Vec<u8>>(32);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        // Capture thread: cpal stream + Opus encode.
        std::thread::spawn(move || {
            let mut pending: Vec<i16> = Vec::with_capacity(frame_len * 2);
            let tx = packet_tx.clone();

            let stream = device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    pending.extend(
                        data.iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                    );
                    while pending.len() >= frame_len {
                        let frame: Vec<i16> = pending.drain(..frame_len).collect();
                        match encoder.encode_vec(&frame, 4000) {
                            Ok(packet) => {
                                if tx.try_send(packet).is_err() {
                                    // Writer is behind or gone; drop the frame.
                                }
                            }
                            Err(e) => warn!("Opus encode failed: {}", e),
                        }
                    }
                },
                |err| error!("Audio capture error: {}", err),
                None,
            );

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to open input stream: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                error!("Failed to start input stream: {}", e);
                return;
            }

            info!(device = %device_name, "Microphone capture started");

            // The stream stops when it drops, which happens when the stop
            // signal (or a dropped handle) resolves this wait.
            let _ = stop_rx.blocking_recv();
            drop(stream);
            debug!("Microphone capture stopped");
        });

        // Writer task: encoded packets -> WebRTC track.
        let writer_track = Arc::clone(&track);
        tokio::spawn(async move {
            while let Some(packet) = packet_rx.recv().await {
                let sample = Sample {
                    data: packet.into(),
                    duration: frame_duration,
                    ..Default::default()
                };
                if let Err(e) = writer_track.write_sample(&sample).await {
                    debug!("Track write ended: {}", e);
                    break;
                }
            }
        });

        Ok(MediaTrackHandle::new(track, Some(stop_tx)))
    }
}
