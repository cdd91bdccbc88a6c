//! Injected logging capability.
//!
//! The host supplies a [`PluginLog`]; the plugin writes its user-visible
//! messages through it and never checks which concrete sink it got.
//! [`TracingLog`] forwards to `tracing`, [`MemoryLog`] keeps entries for
//! inspection.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// User-visible log sink.
pub trait PluginLog: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sink that forwards to the global `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl PluginLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!(target: "devstrip", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "devstrip", "{}", message);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Sink that records every entry in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Messages logged at error level, in order.
    pub fn errors(&self) -> Vec<String> {
        self.messages(LogLevel::Error)
    }

    /// Messages logged at info level, in order.
    pub fn infos(&self) -> Vec<String> {
        self.messages(LogLevel::Info)
    }

    fn messages(&self, level: LogLevel) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.message.clone())
            .collect()
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.lock().push(LogEntry {
            level,
            message: message.to_string(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PluginLog for MemoryLog {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}
