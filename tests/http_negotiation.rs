//! End-to-end negotiation over the HTTP offer/answer strategy

mod harness;

use harness::backend::{BackendState, MockBackend};
use harness::{token_auth, SilenceSource};
use std::sync::Arc;
use voxflow_rtc::device::DeviceInputManager;
use voxflow_rtc::validation::HttpControlApi;
use voxflow_rtc::{
    CallContext, CallController, ConnectionStatus, DefaultSignalingFactory, RtcClientConfig,
    SignalingMode,
};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

fn config(base_url: &str) -> RtcClientConfig {
    RtcClientConfig::default()
        .with_api_base_url(base_url)
        .with_signaling(SignalingMode::Http)
        // Host candidates only: everything stays on loopback.
        .with_ice_servers(Vec::new())
        .with_teardown_delay_ms(100)
}

fn controller(config: RtcClientConfig) -> CallController {
    let control = Arc::new(HttpControlApi::new(&config.api_base_url).unwrap());
    let factory = Arc::new(DefaultSignalingFactory::new(config.clone()));
    CallController::with_parts(
        config,
        token_auth(),
        control,
        Arc::new(SilenceSource),
        Arc::new(DeviceInputManager::new()),
        factory,
    )
}

#[tokio::test]
async fn offer_answer_round_trip_connects() {
    let backend = MockBackend::spawn(BackendState::default()).await;
    let calls = controller(config(&backend.base_url()));

    calls
        .start("wf-1", "run-1", CallContext::from([("customer", "Ada")]))
        .await
        .unwrap();

    // The HTTP strategy marks the session connected once the answer applies.
    assert_eq!(calls.status(), ConnectionStatus::Connected);

    // The offer went out fully gathered (non-trickle).
    let offer_sdp = backend.first_offer_sdp().expect("backend saw an offer");
    assert!(offer_sdp.contains("a=candidate"));

    // Request carried the session coordinates and the call context.
    let offers = backend.state.offers.lock().unwrap();
    let offer = &offers[0];
    assert_eq!(offer["type"], "offer");
    assert_eq!(offer["workflow_id"], "wf-1");
    assert_eq!(offer["workflow_run_id"], "run-1");
    assert_eq!(offer["restart_pc"], false);
    assert!(!offer["pc_id"].as_str().unwrap().is_empty());
    assert_eq!(offer["call_context_vars"]["customer"], "Ada");
    drop(offers);

    let session = calls.session().await.expect("active session");
    assert!(session.remote_description().is_some());
    assert!(session.local_description().is_some());
}

#[tokio::test]
async fn stop_closes_the_peer_connection() {
    let backend = MockBackend::spawn(BackendState::default()).await;
    let calls = controller(config(&backend.base_url()));

    calls
        .start("wf-1", "run-1", CallContext::new())
        .await
        .unwrap();
    assert_eq!(calls.status(), ConnectionStatus::Connected);

    // stop() returns only after the post-stop delay and hard close.
    calls.stop().await;

    assert_eq!(calls.status(), ConnectionStatus::Idle);
    assert!(calls.is_completed().await);

    let session = calls.session().await.expect("session snapshot");
    assert!(session.is_completed());
    assert_eq!(session.status(), ConnectionStatus::Idle);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let backend = MockBackend::spawn(BackendState::default()).await;
    let calls = controller(config(&backend.base_url()));

    calls
        .start("wf-1", "run-1", CallContext::new())
        .await
        .unwrap();

    calls.stop().await;
    calls.stop().await;
    assert_eq!(calls.status(), ConnectionStatus::Idle);
}

#[tokio::test]
async fn backend_validation_rejection_aborts_before_offer() {
    let backend = MockBackend::spawn(BackendState {
        provider_error_body: Some(
            r#"{"detail":{"errors":[{"model":"tts","message":"missing key"}]}}"#.to_string(),
        ),
        ..Default::default()
    })
    .await;
    let calls = controller(config(&backend.base_url()));

    let result = calls.start("wf-1", "run-1", CallContext::new()).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().is_validation());

    assert_eq!(calls.error_message(), Some("tts: missing key".to_string()));
    assert_eq!(calls.status(), ConnectionStatus::Failed);
    assert!(backend.state.offers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn second_call_after_stop_gets_a_fresh_session() {
    let backend = MockBackend::spawn(BackendState::default()).await;
    let calls = controller(config(&backend.base_url()));

    calls
        .start("wf-1", "run-1", CallContext::new())
        .await
        .unwrap();
    let first_pc_id = calls.session().await.unwrap().pc_id().to_string();
    calls.stop().await;

    calls
        .start("wf-1", "run-2", CallContext::new())
        .await
        .unwrap();
    let second = calls.session().await.unwrap();
    assert_ne!(second.pc_id(), first_pc_id);
    assert_eq!(second.workflow_run_id(), "run-2");
    assert_eq!(calls.status(), ConnectionStatus::Connected);

    calls.stop().await;
}

#[tokio::test]
async fn connection_state_reaches_closed_after_stop() {
    use voxflow_rtc::config::AudioCaptureConfig;
    use voxflow_rtc::media::MediaSource;
    use voxflow_rtc::peer::{PeerController, PeerSession};
    use voxflow_rtc::signaling::HttpSignaling;

    // Drive the peer controller directly to observe the underlying
    // connection through teardown.
    let backend = MockBackend::spawn(BackendState::default()).await;
    let config = config(&backend.base_url());

    let session = PeerSession::new("wf-1", "run-1", CallContext::new());
    let transport =
        Arc::new(HttpSignaling::new(&backend.base_url(), "test-token", None).unwrap());
    let track = SilenceSource
        .create_track(&AudioCaptureConfig::default(), None)
        .unwrap();
    let (status_tx, status_rx) = tokio::sync::watch::channel(ConnectionStatus::Idle);

    let pc = PeerController::new(&config, session, transport, track, status_tx)
        .await
        .unwrap();
    pc.negotiate().await.unwrap();
    assert_eq!(pc.status().await, ConnectionStatus::Connected);

    pc.stop().await;
    assert_eq!(pc.connection_state(), RTCPeerConnectionState::Closed);
    assert!(pc.is_completed().await);
    assert_eq!(*status_rx.borrow(), ConnectionStatus::Idle);
}
