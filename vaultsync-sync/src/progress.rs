//! Progress lines for an in-flight sync action.

use tokio::sync::mpsc::UnboundedSender;

pub trait Progress: Send + Sync {
    fn log(&self, message: &str);
}

/// Forwards every line to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl Progress for TracingProgress {
    fn log(&self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Delivers lines to another task, e.g. the one driving the UI.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: UnboundedSender<String>,
}

impl ChannelProgress {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl Progress for ChannelProgress {
    fn log(&self, message: &str) {
        // The receiver may be gone once the caller stopped listening.
        let _ = self.tx.send(message.to_string());
    }
}
