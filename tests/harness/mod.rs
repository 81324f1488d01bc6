//! Shared test harness
//!
//! Stand-ins for the collaborators a call needs: a media source that never
//! captures, a scriptable control API, and mock backends for both signaling
//! strategies (each with a real answering webrtc-rs peer).

// Each integration test crate uses a subset of the harness.
#![allow(dead_code)]

pub mod backend;
pub mod signaling_server;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use voxflow_rtc::config::AudioCaptureConfig;
use voxflow_rtc::media::{MediaSource, MediaTrackHandle};
use voxflow_rtc::peer::PeerSession;
use voxflow_rtc::signaling::SignalingTransport;
use voxflow_rtc::validation::ControlApi;
use voxflow_rtc::{Error, Result, SignalingFactory, ValidationErrors, ValidationIssue};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Media source that registers a valid Opus track but never writes samples
pub struct SilenceSource;

impl MediaSource for SilenceSource {
    fn create_track(
        &self,
        _config: &AudioCaptureConfig,
        _device_id: Option<&str>,
    ) -> Result<MediaTrackHandle> {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: "audio/opus".to_string(),
                clock_rate: 48_000,
                channels: 2,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            "audio".to_string(),
            "test-call".to_string(),
        ));
        Ok(MediaTrackHandle::new(track, None))
    }
}

/// Media source that always fails acquisition (denied microphone)
pub struct DeniedSource;

impl MediaSource for DeniedSource {
    fn create_track(
        &self,
        _config: &AudioCaptureConfig,
        _device_id: Option<&str>,
    ) -> Result<MediaTrackHandle> {
        Err(Error::PermissionDenied(
            "Microphone access denied".to_string(),
        ))
    }
}

/// Scriptable control API
#[derive(Default)]
pub struct StubControlApi {
    /// Issues to return from provider validation
    pub provider_errors: Option<ValidationErrors>,
    /// Issues to return from workflow validation
    pub workflow_errors: Option<ValidationErrors>,
    /// When set, provider validation blocks until notified
    pub gate: Option<Arc<Notify>>,
    /// Number of provider validation calls observed
    pub provider_calls: AtomicUsize,
    /// Number of workflow validation calls observed
    pub workflow_calls: AtomicUsize,
}

impl StubControlApi {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn rejecting_providers(issues: Vec<(&str, &str)>) -> Self {
        Self {
            provider_errors: Some(make_errors(issues)),
            ..Self::default()
        }
    }

    pub fn rejecting_workflow(issues: Vec<(&str, &str)>) -> Self {
        Self {
            workflow_errors: Some(make_errors(issues)),
            ..Self::default()
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            // After the gate opens, fail so the test never negotiates.
            provider_errors: Some(make_errors(vec![("llm", "gated test")])),
            ..Self::default()
        }
    }
}

pub fn make_errors(issues: Vec<(&str, &str)>) -> ValidationErrors {
    ValidationErrors::new(
        issues
            .into_iter()
            .map(|(source, message)| ValidationIssue {
                source: source.to_string(),
                message: message.to_string(),
            })
            .collect(),
    )
}

#[async_trait]
impl ControlApi for StubControlApi {
    async fn validate_providers(&self, _access_token: &str) -> Result<()> {
        self.provider_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.provider_errors {
            Some(errors) => Err(Error::Validation(errors.clone())),
            None => Ok(()),
        }
    }

    async fn validate_workflow(&self, _workflow_id: &str, _access_token: &str) -> Result<()> {
        self.workflow_calls.fetch_add(1, Ordering::SeqCst);
        match &self.workflow_errors {
            Some(errors) => Err(Error::Validation(errors.clone())),
            None => Ok(()),
        }
    }
}

/// Factory that refuses to build a transport, counting attempts
#[derive(Default)]
pub struct RefusingFactory {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl SignalingFactory for RefusingFactory {
    async fn connect(
        &self,
        _session: &PeerSession,
        _access_token: &str,
    ) -> Result<Arc<dyn SignalingTransport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::SignalingError("no transport in this test".to_string()))
    }
}

/// An auth session holding a usable bearer token
pub fn token_auth() -> Arc<voxflow_rtc::auth::AuthSession> {
    use voxflow_rtc::auth::{AuthPrincipal, AuthSession, LocalUser};
    Arc::new(AuthSession::new(AuthPrincipal::Local(LocalUser {
        username: "test".to_string(),
        access_token: Some("test-token".to_string()),
    })))
}

/// Build an answering webrtc-rs peer API (default codecs + interceptors)
pub fn build_answering_api() -> webrtc::api::API {
    use webrtc::api::interceptor_registry::register_default_interceptors;
    use webrtc::api::media_engine::MediaEngine;
    use webrtc::api::APIBuilder;
    use webrtc::interceptor::registry::Registry;

    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .expect("codec registration");
    let registry = register_default_interceptors(Registry::new(), &mut media_engine)
        .expect("interceptor registration");
    APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build()
}
