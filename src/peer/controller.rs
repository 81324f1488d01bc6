//! Peer connection ownership and negotiation
//!
//! A [`PeerController`] owns the `RTCPeerConnection` for exactly one call
//! session. It drives either negotiation variant (single-shot HTTP offer
//! after full ICE gathering, or immediate offer with trickled candidates
//! over WebSocket) and applies the ICE transition policy: `disconnected`
//! means the far end hung up and tears the session down gracefully, while
//! `failed` marks the attempt failed and leaves retry to the caller.

use crate::config::RtcClientConfig;
use crate::media::MediaTrackHandle;
use crate::peer::session::{ConnectionStatus, PeerSession};
use crate::signaling::protocol::{CandidatePayload, OfferRequest, SdpKind, SdpPayload};
use crate::signaling::{SignalEvent, SignalingTransport};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

/// What an ICE connection-state change means for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IceAction {
    /// Nothing to do
    Ignore,
    /// Media path established
    MarkConnected,
    /// Network failure; the attempt is over
    Fail,
    /// Far end hung up; tear down gracefully
    GracefulDisconnect,
}

/// Policy mapping ICE connection states to session actions.
///
/// `disconnected` is deliberately a graceful completion, not a failure:
/// the media server drops the connection when the workflow run ends.
pub(crate) fn ice_transition_action(state: RTCIceConnectionState) -> IceAction {
    match state {
        RTCIceConnectionState::Connected | RTCIceConnectionState::Completed => {
            IceAction::MarkConnected
        }
        RTCIceConnectionState::Failed => IceAction::Fail,
        RTCIceConnectionState::Disconnected => IceAction::GracefulDisconnect,
        _ => IceAction::Ignore,
    }
}

/// Owns one peer connection for the lifetime of a call session
pub struct PeerController {
    session: Arc<RwLock<PeerSession>>,
    pc: Arc<RTCPeerConnection>,
    transport: Arc<dyn SignalingTransport>,
    media: Arc<MediaTrackHandle>,
    status_tx: watch::Sender<ConnectionStatus>,
    teardown_delay: Duration,
    restart_pc: bool,
    torn_down: AtomicBool,
}

impl PeerController {
    /// Build the peer connection, attach the local track, and register the
    /// ICE/track handlers.
    pub async fn new(
        config: &RtcClientConfig,
        session: PeerSession,
        transport: Arc<dyn SignalingTransport>,
        media: MediaTrackHandle,
        status_tx: watch::Sender<ConnectionStatus>,
    ) -> Result<Arc<Self>> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::PeerConnectionError(format!("Failed to register codecs: {}", e)))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| {
                Error::PeerConnectionError(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration {
                ice_servers,
                ..Default::default()
            })
            .await
            .map_err(|e| {
                Error::PeerConnectionError(format!("Failed to create peer connection: {}", e))
            })?,
        );

        info!(pc_id = %session.pc_id(), "Created peer connection");

        pc.add_track(media.track() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::MediaTrackError(format!("Failed to add audio track: {}", e)))?;

        let controller = Arc::new(Self {
            session: Arc::new(RwLock::new(session)),
            pc,
            transport,
            media: Arc::new(media),
            status_tx,
            teardown_delay: Duration::from_millis(config.teardown_delay_ms),
            restart_pc: config.restart_pc,
            torn_down: AtomicBool::new(false),
        });

        controller.install_handlers();
        Ok(controller)
    }

    fn install_handlers(self: &Arc<Self>) {
        let trickles = self.transport.trickles();

        // Local ICE candidates: record, and trickle when the strategy does.
        let this = Arc::clone(self);
        self.pc.on_ice_candidate(Box::new(move |candidate| {
            let this = Arc::clone(&this);
            Box::pin(async move {
                match candidate {
                    Some(candidate) => {
                        let init = match candidate.to_json() {
                            Ok(init) => init,
                            Err(e) => {
                                warn!("Could not serialize ICE candidate: {}", e);
                                return;
                            }
                        };
                        let payload: CandidatePayload = init.into();
                        this.session
                            .write()
                            .await
                            .add_local_candidate(payload.clone());
                        if trickles {
                            if let Err(e) = this.transport.send_candidate(Some(payload)).await {
                                warn!("Failed to trickle ICE candidate: {}", e);
                            }
                        }
                    }
                    None => {
                        debug!("ICE gathering complete");
                        if trickles {
                            if let Err(e) = this.transport.send_candidate(None).await {
                                warn!("Failed to send end-of-candidates: {}", e);
                            }
                        }
                    }
                }
            })
        }));

        // ICE connection-state policy.
        let this = Arc::clone(self);
        self.pc
            .on_ice_connection_state_change(Box::new(move |state| {
                let this = Arc::clone(&this);
                Box::pin(async move {
                    debug!(?state, "ICE connection state changed");
                    match ice_transition_action(state) {
                        IceAction::Ignore => {}
                        IceAction::MarkConnected => {
                            this.session.write().await.mark_connected();
                            this.publish_status().await;
                        }
                        IceAction::Fail => {
                            warn!("ICE connection failed");
                            this.session.write().await.fail();
                            this.publish_status().await;
                        }
                        IceAction::GracefulDisconnect => {
                            info!("Server closed the media connection");
                            // Tear down from a fresh task: closing the peer
                            // connection inside its own state callback would
                            // wedge the event delivery.
                            tokio::spawn(async move { this.teardown().await });
                        }
                    }
                })
            }));

        // Inbound audio from the agent: drain RTP so the receive buffer
        // never backs up. Playback is the embedder's concern.
        self.pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            Box::pin(async move {
                info!(kind = %track.kind(), "Remote track started");
                tokio::spawn(async move {
                    while track.read_rtp().await.is_ok() {}
                    debug!("Remote track ended");
                });
            })
        }));
    }

    /// Run negotiation for the configured strategy
    pub async fn negotiate(self: &Arc<Self>) -> Result<()> {
        {
            let mut session = self.session.write().await;
            session.begin();
        }
        self.publish_status().await;

        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create offer: {}", e)))?;

        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        if self.transport.trickles() {
            self.negotiate_trickle().await
        } else {
            self.negotiate_blocking().await
        }
    }

    /// WebSocket variant: send the offer immediately, apply answers and
    /// candidates as they arrive.
    async fn negotiate_trickle(self: &Arc<Self>) -> Result<()> {
        let request = self.offer_request().await?;
        self.transport.send_offer(request).await?;

        let events = self
            .transport
            .take_events()
            .ok_or_else(|| Error::SignalingError("Transport produced no event stream".to_string()))?;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_event_loop(events).await;
        });

        Ok(())
    }

    /// HTTP variant: wait for full ICE gathering, post the complete offer,
    /// apply the returned answer.
    async fn negotiate_blocking(self: &Arc<Self>) -> Result<()> {
        let mut gathered = self.pc.gathering_complete_promise().await;
        let _ = gathered.recv().await;

        let request = self.offer_request().await?;
        let answer = self
            .transport
            .send_offer(request)
            .await?
            .ok_or_else(|| Error::SignalingError("Backend returned no answer".to_string()))?;

        self.apply_answer(answer).await?;

        // Request/response negotiation treats an accepted answer as the call
        // being up; ICE completion only confirms it.
        self.session.write().await.mark_connected();
        self.publish_status().await;
        Ok(())
    }

    /// Dispatch inbound signaling events in arrival order.
    ///
    /// Candidates that beat the answer are buffered and flushed once the
    /// remote description is applied (the browser stack queues these
    /// implicitly; webrtc-rs does not).
    async fn run_event_loop(self: Arc<Self>, mut events: mpsc::Receiver<SignalEvent>) {
        let mut pending: Vec<CandidatePayload> = Vec::new();

        while let Some(event) = events.recv().await {
            match event {
                SignalEvent::Answer(answer) => {
                    if let Err(e) = self.apply_answer(answer).await {
                        warn!("Failed to apply answer: {}", e);
                        self.session.write().await.fail();
                        self.publish_status().await;
                        break;
                    }
                    for candidate in pending.drain(..) {
                        if let Err(e) = self.add_remote_candidate(candidate).await {
                            warn!("Failed to add buffered candidate: {}", e);
                        }
                    }
                }
                SignalEvent::RemoteCandidate(candidate) => {
                    if self.pc.remote_description().await.is_some() {
                        if let Err(e) = self.add_remote_candidate(candidate).await {
                            warn!("Failed to add remote candidate: {}", e);
                        }
                    } else {
                        pending.push(candidate);
                    }
                }
                SignalEvent::Error(message) => {
                    warn!("Signaling error from server: {}", message);
                    self.session.write().await.fail();
                    self.publish_status().await;
                }
                SignalEvent::Closed => {
                    let (active, completed) = {
                        let session = self.session.read().await;
                        (session.is_active(), session.is_completed())
                    };
                    if active && !completed {
                        warn!("Signaling socket closed mid-call");
                        self.session.write().await.fail();
                        self.publish_status().await;
                    }
                    break;
                }
            }
        }
    }

    async fn apply_answer(&self, answer: SdpPayload) -> Result<()> {
        let description = RTCSessionDescription::answer(answer.sdp.clone())
            .map_err(|e| Error::SdpError(format!("Invalid answer SDP: {}", e)))?;

        self.pc
            .set_remote_description(description)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))?;

        self.session
            .write()
            .await
            .set_remote_description(answer.sdp);

        debug!("Remote answer applied");
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: CandidatePayload) -> Result<()> {
        self.session
            .write()
            .await
            .add_remote_candidate(candidate.clone());

        self.pc
            .add_ice_candidate(candidate.into())
            .await
            .map_err(|e| Error::IceCandidateError(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn offer_request(&self) -> Result<OfferRequest> {
        let sdp = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| Error::SdpError("No local description".to_string()))?
            .sdp;

        let mut session = self.session.write().await;
        session.set_local_description(sdp.clone());

        Ok(OfferRequest {
            sdp,
            kind: SdpKind::Offer,
            pc_id: session.pc_id().to_string(),
            restart_pc: self.restart_pc,
            workflow_id: session.workflow_id().to_string(),
            workflow_run_id: session.workflow_run_id().to_string(),
            call_context_vars: session.call_context().vars().clone(),
        })
    }

    /// Record a negotiation failure on the session
    pub async fn mark_failed(&self) {
        self.session.write().await.fail();
        self.publish_status().await;
    }

    /// Stop the call: mark the session completed, stop media senders, close
    /// the transport, and (after the teardown delay) release the peer
    /// connection. Idempotent.
    pub async fn stop(&self) {
        self.teardown().await;
    }

    async fn teardown(&self) {
        if self
            .torn_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        {
            let mut session = self.session.write().await;
            session.complete();
        }
        self.publish_status().await;

        // Stop producing before stopping the senders so no sample races the
        // sender shutdown.
        self.media.stop();

        for sender in self.pc.get_senders().await {
            if let Err(e) = sender.stop().await {
                debug!("Sender stop: {}", e);
            }
        }
        for transceiver in self.pc.get_transceivers().await {
            if let Err(e) = transceiver.stop().await {
                debug!("Transceiver stop: {}", e);
            }
        }

        if let Err(e) = self.transport.close().await {
            debug!("Transport close: {}", e);
        }

        // Let in-flight close frames flush before the hard teardown.
        tokio::time::sleep(self.teardown_delay).await;

        if let Err(e) = self.pc.close().await {
            warn!("Peer connection close failed: {}", e);
        }

        info!("Call session torn down");
    }

    /// Current status of the owned session
    pub async fn status(&self) -> ConnectionStatus {
        self.session.read().await.status()
    }

    /// Whether the session ended gracefully
    pub async fn is_completed(&self) -> bool {
        self.session.read().await.is_completed()
    }

    /// Snapshot of the owned session
    pub async fn session(&self) -> PeerSession {
        self.session.read().await.clone()
    }

    /// Current state of the underlying peer connection
    pub fn connection_state(
        &self,
    ) -> webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState {
        self.pc.connection_state()
    }

    async fn publish_status(&self) {
        let status = self.session.read().await.status();
        self.status_tx.send_replace(status);
    }
}
