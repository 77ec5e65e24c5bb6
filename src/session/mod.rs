//! Capture session management
//!
//! This module provides:
//! - `CaptureSession`: one start-to-stop recording; owns the input stream and
//!   the relay task that chunks, packages and sends audio
//! - `CaptureController`: the Idle/Recording state machine behind the
//!   `start-recording` and `stop-recording` controls
//! - Session statistics and the final report

mod config;
mod controller;
mod session;
mod stats;

pub use config::{SessionConfig, SessionSettings};
pub use controller::{BackendFactory, CaptureController, CaptureState, ControlState};
pub use session::CaptureSession;
pub use stats::{SessionMonitor, SessionReport, SessionStats};
