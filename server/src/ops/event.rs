//! Progress events broadcast to operation observers
//!
//! Events are transient: they are fanned out to live subscribers and never
//! persisted. A subscriber that attaches mid-run only sees events emitted
//! from that point forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::health::ServiceHealth;

/// Log severity carried inside a `log` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// One progress event for an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Event {
    /// A new phase started
    #[serde(rename_all = "camelCase")]
    Phase {
        name: String,
        /// 1-based phase index
        index: u32,
        total: u32,
    },

    /// Overall progress estimate
    Progress { percent: u8 },

    /// Free-form log line
    Log {
        level: EventLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Terminal success, with the final service health list
    Complete { services: Vec<ServiceHealth> },

    /// Terminal failure
    Error {
        message: String,
        /// Phase in which the failure occurred, if known
        phase: Option<String>,
        /// Whether a whole-operation retry is worth attempting
        recoverable: bool,
    },
}

impl Event {
    /// SSE event name for this variant
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Phase { .. } => "phase",
            Event::Progress { .. } => "progress",
            Event::Log { .. } => "log",
            Event::Complete { .. } => "complete",
            Event::Error { .. } => "error",
        }
    }

    /// Terminal events are the last thing an observer ever receives
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Complete { .. } | Event::Error { .. })
    }

    pub fn log(level: EventLevel, message: impl Into<String>) -> Self {
        Event::Log {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
