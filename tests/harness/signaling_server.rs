//! Mock WebSocket signaling server
//!
//! Accepts one signaling socket per connection, answers offers with a real
//! webrtc-rs peer, and trickles the answering peer's candidates back to the
//! client. Records every received frame in arrival order.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use voxflow_rtc::signaling::protocol::{
    CandidatePayload, SdpKind, SdpPayload, SignalFrame,
};
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

type SharedSink = Arc<tokio::sync::Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>>;

/// Recorded server state
#[derive(Default)]
pub struct SignalingState {
    /// Frames received from the client, in arrival order
    pub received: Mutex<Vec<SignalFrame>>,
    /// Answering peers, kept alive so ICE can complete
    pub peers: Mutex<Vec<Arc<RTCPeerConnection>>>,
    /// When true, drop the socket right after the offer instead of answering
    pub drop_after_offer: bool,
}

impl SignalingState {
    /// Frame types received so far, e.g. `["offer", "ice-candidate"]`
    pub fn received_kinds(&self) -> Vec<&'static str> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|frame| match frame {
                SignalFrame::Offer(_) => "offer",
                SignalFrame::Answer(_) => "answer",
                SignalFrame::IceCandidate(_) => "ice-candidate",
                SignalFrame::Error(_) => "error",
            })
            .collect()
    }
}

/// A running mock signaling server
pub struct MockSignalingServer {
    pub addr: SocketAddr,
    pub state: Arc<SignalingState>,
}

impl MockSignalingServer {
    /// Spawn on an ephemeral port
    pub async fn spawn(state: SignalingState) -> Self {
        let state = Arc::new(state);
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock signaling server");
        let addr = listener.local_addr().expect("local addr");

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    if let Ok(socket) = tokio_tungstenite::accept_async(stream).await {
                        handle_connection(socket, state).await;
                    }
                });
            }
        });

        Self { addr, state }
    }

    /// Base URL clients should point their API configuration at
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn handle_connection(socket: WebSocketStream<TcpStream>, state: Arc<SignalingState>) {
    let (sink, mut source) = socket.split();
    let sink: SharedSink = Arc::new(tokio::sync::Mutex::new(sink));
    let mut pc: Option<Arc<RTCPeerConnection>> = None;

    while let Some(Ok(message)) = source.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(frame) = SignalFrame::from_json(&text) else {
            continue;
        };
        state.received.lock().unwrap().push(frame.clone());

        match frame {
            SignalFrame::Offer(offer) => {
                if state.drop_after_offer {
                    // Simulates the backend dying mid-negotiation.
                    let _ = sink.lock().await.close().await;
                    return;
                }
                let peer = answer_offer(offer, Arc::clone(&sink)).await;
                state.peers.lock().unwrap().push(Arc::clone(&peer));
                pc = Some(peer);
            }
            SignalFrame::IceCandidate(Some(candidate)) => {
                if let Some(pc) = &pc {
                    let _ = pc.add_ice_candidate(candidate.into()).await;
                }
            }
            SignalFrame::IceCandidate(None) => {}
            SignalFrame::Answer(_) | SignalFrame::Error(_) => {}
        }
    }
}

async fn answer_offer(offer: SdpPayload, sink: SharedSink) -> Arc<RTCPeerConnection> {
    let api = super::build_answering_api();
    let pc = Arc::new(
        api.new_peer_connection(RTCConfiguration::default())
            .await
            .expect("answering peer"),
    );

    // Trickle our candidates back to the client as they are found.
    let candidate_sink = Arc::clone(&sink);
    pc.on_ice_candidate(Box::new(move |candidate| {
        let sink = Arc::clone(&candidate_sink);
        Box::pin(async move {
            let payload = candidate.and_then(|c| c.to_json().ok()).map(CandidatePayload::from);
            let frame = SignalFrame::IceCandidate(payload);
            if let Ok(json) = frame.to_json() {
                let _ = sink.lock().await.send(Message::Text(json)).await;
            }
        })
    }));

    let remote = RTCSessionDescription::offer(offer.sdp).expect("offer parse");
    pc.set_remote_description(remote).await.expect("set remote");

    let answer = pc.create_answer(None).await.expect("create answer");
    pc.set_local_description(answer).await.expect("set local");

    // Trickle variant: the answer goes out immediately, before gathering.
    let answer_sdp = pc
        .local_description()
        .await
        .expect("local description")
        .sdp;
    let frame = SignalFrame::Answer(SdpPayload {
        sdp: answer_sdp,
        kind: SdpKind::Answer,
    });
    let json = frame.to_json().expect("serialize answer");
    let _ = sink.lock().await.send(Message::Text(json)).await;

    pc
}
