use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::session::CaptureSession;
use super::stats::{SessionMonitor, SessionReport, SessionStats};
use crate::audio::{AudioBackend, Capability};
use crate::error::CaptureError;
use crate::transport::{IdentifierSlot, Transport};

/// Capture states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    #[default]
    Idle,
    Recording,
}

impl CaptureState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Enabled state of the two controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl ControlState {
    pub const fn idle() -> Self {
        Self {
            start_enabled: true,
            stop_enabled: false,
        }
    }

    pub const fn recording() -> Self {
        Self {
            start_enabled: false,
            stop_enabled: true,
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Creates a fresh backend for each session
pub type BackendFactory =
    Arc<dyn Fn() -> Result<Box<dyn AudioBackend>, CaptureError> + Send + Sync>;

/// The capture component behind the `start-recording` / `stop-recording` controls
///
/// State machine:
///   IDLE -> RECORDING (start_capture, only if acquisition succeeds)
///   RECORDING -> IDLE (stop_capture)
///
/// Start and stop are serialized; a stop holds the controller until the
/// session's final chunk and finalize have been sent.
pub struct CaptureController {
    config: SessionConfig,
    capability: Capability,
    backends: BackendFactory,
    transport: Arc<dyn Transport>,
    identifier: IdentifierSlot,
    controls: watch::Sender<ControlState>,
    /// Stats handle of the recording session, readable without `session`
    live: watch::Sender<Option<SessionMonitor>>,
    session: Mutex<Option<CaptureSession>>,
}

impl CaptureController {
    pub fn new(
        config: SessionConfig,
        capability: Capability,
        backends: BackendFactory,
        transport: Arc<dyn Transport>,
        identifier: IdentifierSlot,
    ) -> Self {
        let (controls, _rx) = watch::channel(ControlState::idle());
        let (live, _rx) = watch::channel(None);

        Self {
            config,
            capability,
            backends,
            transport,
            identifier,
            controls,
            live,
            session: Mutex::new(None),
        }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn identifier(&self) -> &IdentifierSlot {
        &self.identifier
    }

    pub fn controls(&self) -> ControlState {
        *self.controls.borrow()
    }

    /// Receiver notified whenever a control changes
    pub fn watch_controls(&self) -> watch::Receiver<ControlState> {
        self.controls.subscribe()
    }

    pub fn state(&self) -> CaptureState {
        if self.controls().stop_enabled {
            CaptureState::Recording
        } else {
            CaptureState::Idle
        }
    }

    /// Start a capture session; returns its id
    pub async fn start_capture(&self) -> Result<String, CaptureError> {
        let mut slot = self.session.lock().await;

        if slot.is_some() {
            warn!("Recording already started");
            return Err(CaptureError::InvalidState {
                state: CaptureState::Recording,
                action: "start recording",
            });
        }

        self.controls.send_replace(ControlState::recording());

        match self.acquire().await {
            Ok(session) => {
                let id = session.id().to_string();
                self.live.send_replace(Some(session.monitor()));
                *slot = Some(session);
                info!("Recording started: {}", id);
                Ok(id)
            }
            Err(e) => {
                error!("Failed to start recording: {}", e);
                self.controls.send_replace(ControlState::idle());
                Err(e)
            }
        }
    }

    /// Stop the active capture session
    pub async fn stop_capture(&self) -> Result<SessionReport, CaptureError> {
        let mut slot = self.session.lock().await;

        let Some(session) = slot.take() else {
            warn!("Recording not active");
            return Err(CaptureError::InvalidState {
                state: CaptureState::Idle,
                action: "stop recording",
            });
        };

        self.controls.send_replace(ControlState::idle());
        self.live.send_replace(None);

        session.stop().await
    }

    /// Statistics of the recording session, if any
    ///
    /// Does not wait for a start or stop in progress.
    pub fn stats(&self) -> Option<SessionStats> {
        self.live
            .borrow()
            .as_ref()
            .map(|monitor| monitor.snapshot(true))
    }

    async fn acquire(&self) -> Result<CaptureSession, CaptureError> {
        self.capability.require()?;
        let backend = (self.backends)()?;

        CaptureSession::start(
            self.config.clone(),
            backend,
            Arc::clone(&self.transport),
            self.identifier.clone(),
        )
        .await
    }
}
