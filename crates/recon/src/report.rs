use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One report line. `text` may span several lines (e.g. a column list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub severity: Severity,
    /// Dump the message concerns; `None` for session-level messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
    pub text: String,
}

/// Sink for engine messages. Formatting and colour belong to the implementor.
pub trait Reporter {
    fn report(&mut self, message: Message);
}

/// Collects messages in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    pub messages: Vec<Message>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.messages.iter().filter(|m| m.severity == severity).count()
    }

    pub fn texts(&self, severity: Severity) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.severity == severity)
            .map(|m| m.text.as_str())
            .collect()
    }
}

impl Reporter for MemoryReporter {
    fn report(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// Forwards messages to the `log` facade.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, message: Message) {
        let pass = message.pass.as_deref().unwrap_or("session");
        match message.severity {
            Severity::Info => log::info!("[{pass}] {}", message.text),
            Severity::Warning => log::warn!("[{pass}] {}", message.text),
            Severity::Error => log::error!("[{pass}] {}", message.text),
        }
    }
}
