//! Mock HTTP backend
//!
//! Serves the validation endpoints and the offer endpoint. Offers are
//! answered by a real webrtc-rs peer so the client can complete ICE against
//! it over loopback; answering peers are kept alive for the server's
//! lifetime.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

/// Scriptable backend behavior
#[derive(Default)]
pub struct BackendState {
    /// 422 body for provider validation, when set
    pub provider_error_body: Option<String>,
    /// 422 body for workflow validation, when set
    pub workflow_error_body: Option<String>,
    /// Offer request bodies received, in order
    pub offers: Mutex<Vec<serde_json::Value>>,
    /// Answering peers, kept alive so ICE can complete
    pub peers: Mutex<Vec<Arc<RTCPeerConnection>>>,
}

/// A running mock backend
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    /// Spawn the backend on an ephemeral port
    pub async fn spawn(state: BackendState) -> Self {
        let state = Arc::new(state);
        let app = Router::new()
            .route("/api/v1/providers/validate", get(validate_providers))
            .route("/api/v1/workflows/:id/validate", post(validate_workflow))
            .route("/api/v1/pipecat/rtc/offer", post(answer_offer))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock backend serve");
        });

        Self { addr, state }
    }

    /// Base URL for client configuration
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// SDP of the first received offer
    pub fn first_offer_sdp(&self) -> Option<String> {
        self.state
            .offers
            .lock()
            .unwrap()
            .first()
            .and_then(|offer| offer["sdp"].as_str().map(str::to_string))
    }
}

async fn validate_providers(State(state): State<Arc<BackendState>>) -> impl IntoResponse {
    match &state.provider_error_body {
        Some(body) => (StatusCode::UNPROCESSABLE_ENTITY, body.clone()).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

async fn validate_workflow(State(state): State<Arc<BackendState>>) -> impl IntoResponse {
    match &state.workflow_error_body {
        Some(body) => (StatusCode::UNPROCESSABLE_ENTITY, body.clone()).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

async fn answer_offer(
    State(state): State<Arc<BackendState>>,
    Json(offer): Json<serde_json::Value>,
) -> impl IntoResponse {
    let sdp = offer["sdp"].as_str().unwrap_or_default().to_string();
    state.offers.lock().unwrap().push(offer);

    let api = super::build_answering_api();
    let pc = Arc::new(
        api.new_peer_connection(RTCConfiguration::default())
            .await
            .expect("answering peer"),
    );

    let remote = RTCSessionDescription::offer(sdp).expect("offer parse");
    pc.set_remote_description(remote).await.expect("set remote");

    let answer = pc.create_answer(None).await.expect("create answer");
    pc.set_local_description(answer).await.expect("set local");

    // Non-trickle: hand back the fully gathered answer.
    let mut gathered = pc.gathering_complete_promise().await;
    let _ = gathered.recv().await;

    let answer_sdp = pc
        .local_description()
        .await
        .expect("local description")
        .sdp;

    state.peers.lock().unwrap().push(pc);

    Json(serde_json::json!({ "sdp": answer_sdp })).into_response()
}
