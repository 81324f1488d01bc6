//! Call lifecycle orchestration
//!
//! One [`CallController`] drives the whole start sequence for a workflow
//! run: provider validation → workflow validation → microphone acquisition
//! → peer negotiation. At most one session is active at a time; a `start`
//! while another start is in flight (or without an access token) is a
//! no-op. Failures never propagate past this boundary un-captured: they are
//! recorded as status + message so the embedding UI can render them, and
//! returned to the caller.

use crate::auth::AuthSession;
use crate::config::{RtcClientConfig, SignalingMode};
use crate::device::DeviceInputManager;
use crate::media::MediaSource;
use crate::peer::{CallContext, ConnectionStatus, PeerController, PeerSession};
use crate::signaling::{HttpSignaling, SignalingTransport, WebSocketSignaling};
use crate::validation::{ControlApi, HttpControlApi};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::RwLock as StdRwLock;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Builds the signaling transport for a session
#[async_trait]
pub trait SignalingFactory: Send + Sync {
    /// Connect (or construct) the transport for one session
    async fn connect(
        &self,
        session: &PeerSession,
        access_token: &str,
    ) -> Result<Arc<dyn SignalingTransport>>;
}

/// Factory selecting the strategy from [`RtcClientConfig::signaling`]
pub struct DefaultSignalingFactory {
    config: RtcClientConfig,
}

impl DefaultSignalingFactory {
    /// Create a factory for the given configuration
    pub fn new(config: RtcClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SignalingFactory for DefaultSignalingFactory {
    async fn connect(
        &self,
        session: &PeerSession,
        access_token: &str,
    ) -> Result<Arc<dyn SignalingTransport>> {
        match self.config.signaling {
            SignalingMode::Http => Ok(Arc::new(HttpSignaling::new(
                &self.config.api_base_url,
                access_token,
                self.config.offer_codec_filter,
            )?)),
            SignalingMode::WebSocket => {
                let url = WebSocketSignaling::signaling_url(
                    &self.config.api_base_url,
                    session.workflow_id(),
                    session.workflow_run_id(),
                    access_token,
                )?;
                Ok(Arc::new(WebSocketSignaling::connect(url).await?))
            }
        }
    }
}

/// Orchestrates the lifecycle of real-time calls for one embedder
pub struct CallController {
    config: RtcClientConfig,
    auth: Arc<AuthSession>,
    control: Arc<dyn ControlApi>,
    media: Arc<dyn MediaSource>,
    devices: Arc<DeviceInputManager>,
    signaling: Arc<dyn SignalingFactory>,
    active: Mutex<Option<Arc<PeerController>>>,
    is_starting: AtomicBool,
    status_tx: watch::Sender<ConnectionStatus>,
    status_rx: watch::Receiver<ConnectionStatus>,
    last_error: StdRwLock<Option<String>>,
}

impl CallController {
    /// Create a controller with the default backend clients and, when the
    /// `device-cpal` feature is on, microphone capture.
    pub fn new(config: RtcClientConfig, auth: Arc<AuthSession>) -> Result<Self> {
        config.validate()?;

        let control: Arc<dyn ControlApi> = Arc::new(HttpControlApi::new(&config.api_base_url)?);
        let signaling: Arc<dyn SignalingFactory> =
            Arc::new(DefaultSignalingFactory::new(config.clone()));

        #[cfg(feature = "device-cpal")]
        let media: Arc<dyn MediaSource> = Arc::new(crate::media::capture::MicrophoneSource::new());
        #[cfg(not(feature = "device-cpal"))]
        let media: Arc<dyn MediaSource> = Arc::new(crate::media::UnavailableSource);

        Ok(Self::with_parts(
            config,
            auth,
            control,
            media,
            Arc::new(DeviceInputManager::new()),
            signaling,
        ))
    }

    /// Create a controller from explicit collaborators (tests, embedders
    /// with their own backend clients or capture stacks).
    pub fn with_parts(
        config: RtcClientConfig,
        auth: Arc<AuthSession>,
        control: Arc<dyn ControlApi>,
        media: Arc<dyn MediaSource>,
        devices: Arc<DeviceInputManager>,
        signaling: Arc<dyn SignalingFactory>,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Idle);
        Self {
            config,
            auth,
            control,
            media,
            devices,
            signaling,
            active: Mutex::new(None),
            is_starting: AtomicBool::new(false),
            status_tx,
            status_rx,
            last_error: StdRwLock::new(None),
        }
    }

    /// Start a call for a workflow run.
    ///
    /// No-op (returns `Ok`) when another start is already in flight, when a
    /// session is already active, or when no access token is available.
    /// A step failure records status `Failed` plus a user message and
    /// releases the guard so the caller may start again.
    pub async fn start(
        &self,
        workflow_id: &str,
        workflow_run_id: &str,
        context: CallContext,
    ) -> Result<()> {
        let Some(token) = self.auth.access_token() else {
            debug!("start ignored: no access token");
            return Ok(());
        };

        if self
            .is_starting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("start ignored: another start is in flight");
            return Ok(());
        }

        let result = self
            .run_start(workflow_id, workflow_run_id, context, &token)
            .await;

        self.is_starting.store(false, Ordering::SeqCst);

        if let Err(err) = &result {
            warn!("Call start failed: {}", err);
            self.record_error(err);
            if let Some(controller) = self.active.lock().await.as_ref() {
                controller.mark_failed().await;
            } else {
                self.status_tx.send_replace(ConnectionStatus::Failed);
            }
        }
        result
    }

    async fn run_start(
        &self,
        workflow_id: &str,
        workflow_run_id: &str,
        context: CallContext,
        token: &str,
    ) -> Result<()> {
        {
            let mut active = self.active.lock().await;
            if let Some(previous) = active.as_ref() {
                if previous.session().await.is_active() {
                    debug!("start ignored: a session is already active");
                    return Ok(());
                }
                // Release the finished/failed session before starting anew.
                previous.stop().await;
                *active = None;
            }
        }

        self.clear_error();

        // 1) Upstream provider configuration.
        self.control.validate_providers(token).await?;

        // 2) Target workflow configuration.
        self.control.validate_workflow(workflow_id, token).await?;

        // 3) Microphone, honoring the device selection.
        let selected = self.devices.selected();
        let track = self
            .media
            .create_track(&self.config.audio, selected.as_deref())?;

        // 4) Peer negotiation.
        let session = PeerSession::new(workflow_id, workflow_run_id, context);
        let transport = self.signaling.connect(&session, token).await?;
        let controller = PeerController::new(
            &self.config,
            session,
            transport,
            track,
            self.status_tx.clone(),
        )
        .await?;

        *self.active.lock().await = Some(Arc::clone(&controller));

        info!(workflow_id, workflow_run_id, "Starting call");
        controller.negotiate().await
    }

    /// Stop the active call, if any. Forces status back to `Idle`.
    pub async fn stop(&self) {
        let controller = self.active.lock().await.clone();
        if let Some(controller) = controller {
            controller.stop().await;
        } else {
            self.status_tx.send_replace(ConnectionStatus::Idle);
        }
    }

    /// Current call status
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch status transitions (UI bindings)
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Whether the most recent session ended gracefully
    pub async fn is_completed(&self) -> bool {
        match self.active.lock().await.as_ref() {
            Some(controller) => controller.is_completed().await,
            None => false,
        }
    }

    /// Whether a start invocation is currently in flight
    pub fn is_starting(&self) -> bool {
        self.is_starting.load(Ordering::SeqCst)
    }

    /// The last user-facing error message, if any
    pub fn error_message(&self) -> Option<String> {
        self.last_error.read().expect("error lock poisoned").clone()
    }

    /// The device manager backing microphone selection
    pub fn devices(&self) -> &Arc<DeviceInputManager> {
        &self.devices
    }

    /// Snapshot of the active session, if any
    pub async fn session(&self) -> Option<PeerSession> {
        match self.active.lock().await.as_ref() {
            Some(controller) => Some(controller.session().await),
            None => None,
        }
    }

    fn record_error(&self, err: &Error) {
        *self.last_error.write().expect("error lock poisoned") = Some(err.user_message());
    }

    fn clear_error(&self) {
        *self.last_error.write().expect("error lock poisoned") = None;
    }
}
