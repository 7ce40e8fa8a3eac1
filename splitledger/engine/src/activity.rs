//! Append-only activity log shared by every flow.
//!
//! Each append happens inside a single critical section that assigns the
//! sequence number, stores the entry and fans it out to subscribers, so lines
//! from concurrent flows never interleave or get lost.

use std::collections::VecDeque;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::ActivityConfig;

const SUBSCRIBER_BUFFER: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    System,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::System => "system",
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

struct Inner {
    next_sequence: u64,
    entries: VecDeque<ActivityEntry>,
}

pub struct ActivityLog {
    inner: Mutex<Inner>,
    capacity: usize,
    mirror_to_tracing: bool,
    sender: broadcast::Sender<ActivityEntry>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::from_config(&ActivityConfig::default())
    }
}

impl fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityLog")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl ActivityLog {
    pub fn new(capacity: usize, mirror_to_tracing: bool) -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            inner: Mutex::new(Inner {
                next_sequence: 0,
                entries: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            mirror_to_tracing,
            sender,
        }
    }

    pub fn from_config(config: &ActivityConfig) -> Self {
        Self::new(config.capacity, config.mirror_to_tracing)
    }

    pub fn append(&self, level: LogLevel, message: impl Into<String>) -> ActivityEntry {
        let message = message.into();
        if self.mirror_to_tracing {
            mirror(level, &message);
        }
        let mut inner = self.inner.lock();
        let entry = ActivityEntry {
            sequence: inner.next_sequence,
            timestamp_ms: now_ms(),
            level,
            message,
        };
        inner.next_sequence += 1;
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry.clone());
        // No receivers is fine; the entry is still retained.
        let _ = self.sender.send(entry.clone());
        entry
    }

    pub fn system(&self, message: impl Into<String>) {
        self.append(LogLevel::System, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.append(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.append(LogLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.append(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.append(LogLevel::Error, message);
    }

    /// Live stream of entries appended after the call.
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEntry> {
        self.sender.subscribe()
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    pub fn entries_since(&self, sequence: u64) -> Vec<ActivityEntry> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.sequence >= sequence)
            .cloned()
            .collect()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.level == level)
            .count()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn mirror(level: LogLevel, message: &str) {
    match level {
        LogLevel::System | LogLevel::Info | LogLevel::Success => {
            info!(target: "splitledger::activity", level = level.label(), "{message}")
        }
        LogLevel::Warning => warn!(target: "splitledger::activity", "{message}"),
        LogLevel::Error => error!(target: "splitledger::activity", "{message}"),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
