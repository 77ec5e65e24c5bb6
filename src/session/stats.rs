use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::config::SessionSettings;
use crate::audio::{AudioChunk, ChunkMetadata};

/// Statistics about a capture session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,

    /// Whether recording is currently active
    pub is_recording: bool,

    /// When the recording started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Chunk-ready events so far
    pub chunks_count: usize,

    /// Messages handed to the transport successfully
    pub messages_sent: usize,

    pub bytes_sent: u64,

    /// Chunks dropped for lack of an identifier
    pub chunks_dropped: usize,

    /// Sends the transport rejected
    pub send_failures: usize,

    pub settings: SessionSettings,
}

/// Final report returned when a session stops
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub stats: SessionStats,

    /// Buffering mode's chunks, in arrival order
    #[serde(skip)]
    pub buffered: Vec<AudioChunk>,

    pub buffered_count: usize,

    /// Files written for buffered chunks
    pub saved_chunks: Vec<ChunkMetadata>,
}

/// Counters shared between a session and its relay task
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    pub chunks: AtomicUsize,
    pub messages: AtomicUsize,
    pub bytes: AtomicU64,
    pub dropped: AtomicUsize,
    pub send_failures: AtomicUsize,
}

impl SessionCounters {
    pub fn record_sent(&self, bytes: usize) {
        self.messages.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(bytes as u64, Ordering::SeqCst);
    }
}

/// Read-only view of a running session's counters
///
/// Cloned out of the session so stats can be read without waiting on the
/// controller while a start or stop is in progress.
#[derive(Debug, Clone)]
pub struct SessionMonitor {
    session_id: String,
    started_at: DateTime<Utc>,
    settings: SessionSettings,
    counters: Arc<SessionCounters>,
}

impl SessionMonitor {
    pub(crate) fn new(
        session_id: String,
        settings: SessionSettings,
        counters: Arc<SessionCounters>,
    ) -> Self {
        Self {
            session_id,
            started_at: Utc::now(),
            settings,
            counters,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn snapshot(&self, is_recording: bool) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.session_id.clone(),
            is_recording,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            chunks_count: self.counters.chunks.load(Ordering::SeqCst),
            messages_sent: self.counters.messages.load(Ordering::SeqCst),
            bytes_sent: self.counters.bytes.load(Ordering::SeqCst),
            chunks_dropped: self.counters.dropped.load(Ordering::SeqCst),
            send_failures: self.counters.send_failures.load(Ordering::SeqCst),
            settings: self.settings.clone(),
        }
    }
}
