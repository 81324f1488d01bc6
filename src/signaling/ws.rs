//! WebSocket trickle-ICE signaling
//!
//! A socket is opened before any media negotiation at
//! `…/api/v1/ws/signaling/{workflow_id}/{workflow_run_id}?token=…`. The
//! offer goes out as soon as the local description is set; candidates flow
//! bidirectionally as discovered, which removes the full-gathering latency
//! of the HTTP strategy. Inbound frames are dispatched strictly in arrival
//! order by a single reader task.

use super::protocol::{CandidatePayload, OfferRequest, SdpKind, SdpPayload, SignalFrame};
use super::{SignalEvent, SignalingTransport};
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Mutex as StdMutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Persistent-socket signaling with trickle ICE
pub struct WebSocketSignaling {
    writer: Mutex<WsSink>,
    events: StdMutex<Option<mpsc::Receiver<SignalEvent>>>,
    reader: tokio::task::JoinHandle<()>,
}

impl WebSocketSignaling {
    /// Build the signaling URL for a workflow run from the API base URL
    /// (`http` → `ws`, `https` → `wss`).
    pub fn signaling_url(
        api_base_url: &str,
        workflow_id: &str,
        workflow_run_id: &str,
        access_token: &str,
    ) -> Result<Url> {
        let mut url = Url::parse(api_base_url)
            .map_err(|e| Error::InvalidConfig(format!("Invalid API base URL: {}", e)))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::InvalidConfig(format!(
                    "Unsupported URL scheme for signaling: {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::InvalidConfig("Cannot set signaling URL scheme".to_string()))?;

        url.set_path(&format!(
            "/api/v1/ws/signaling/{}/{}",
            workflow_id, workflow_run_id
        ));
        url.set_query(Some(&format!("token={}", access_token)));
        Ok(url)
    }

    /// Open the socket and start the reader task
    pub async fn connect(url: Url) -> Result<Self> {
        debug!(%url, "Connecting signaling WebSocket");

        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::WebSocketError(format!("Signaling connect failed: {}", e)))?;

        let (sink, mut source) = stream.split();
        let (event_tx, event_rx) = mpsc::channel(64);

        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => match SignalFrame::from_json(&text) {
                        Ok(frame) => {
                            let event = match frame {
                                SignalFrame::Answer(sdp) => SignalEvent::Answer(sdp),
                                SignalFrame::IceCandidate(Some(candidate)) => {
                                    SignalEvent::RemoteCandidate(candidate)
                                }
                                // Remote end-of-candidates needs no action on
                                // the browserless side; the ICE agent finishes
                                // checks on what it has.
                                SignalFrame::IceCandidate(None) => continue,
                                SignalFrame::Error(err) => SignalEvent::Error(err.message),
                                SignalFrame::Offer(_) => {
                                    warn!("Ignoring unexpected offer frame from server");
                                    continue;
                                }
                            };
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Dropping malformed signaling frame: {}", e);
                        }
                    },
                    Ok(Message::Close(_)) | Err(_) => {
                        let _ = event_tx.send(SignalEvent::Closed).await;
                        break;
                    }
                    Ok(_) => {} // ping/pong/binary: nothing to dispatch
                }
            }
            // Socket dropped without a close frame.
            let _ = event_tx.try_send(SignalEvent::Closed);
        });

        Ok(Self {
            writer: Mutex::new(sink),
            events: StdMutex::new(Some(event_rx)),
            reader,
        })
    }

    async fn send_frame(&self, frame: SignalFrame) -> Result<()> {
        let json = frame.to_json()?;
        self.writer
            .lock()
            .await
            .send(Message::Text(json))
            .await
            .map_err(|e| Error::WebSocketError(format!("Signaling send failed: {}", e)))
    }
}

#[async_trait]
impl SignalingTransport for WebSocketSignaling {
    fn trickles(&self) -> bool {
        true
    }

    async fn send_offer(&self, offer: OfferRequest) -> Result<Option<SdpPayload>> {
        self.send_frame(SignalFrame::Offer(SdpPayload {
            sdp: offer.sdp,
            kind: SdpKind::Offer,
        }))
        .await?;
        Ok(None)
    }

    async fn send_candidate(&self, candidate: Option<CandidatePayload>) -> Result<()> {
        self.send_frame(SignalFrame::IceCandidate(candidate)).await
    }

    fn take_events(&self) -> Option<mpsc::Receiver<SignalEvent>> {
        self.events.lock().expect("event lock poisoned").take()
    }

    async fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        // A close error just means the socket is already gone.
        if let Err(e) = writer.send(Message::Close(None)).await {
            debug!("Signaling close frame not sent: {}", e);
        }
        let _ = writer.flush().await;
        Ok(())
    }
}

impl Drop for WebSocketSignaling {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
