use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// User-visible notification surface.
///
/// Fire-and-forget: implementations must not block and never report failure
/// back to the caller. Each call is delivered independently, without dedup.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, message: &str);

    fn success(&self, message: &str) {
        self.notify(NotificationKind::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(NotificationKind::Error, message);
    }

    fn warning(&self, message: &str) {
        self.notify(NotificationKind::Warning, message);
    }
}

/// Routes notifications into the tracing pipeline
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        match kind {
            NotificationKind::Success => tracing::info!(kind = %kind, "{}", message),
            NotificationKind::Warning => tracing::warn!(kind = %kind, "{}", message),
            NotificationKind::Error => tracing::error!(kind = %kind, "{}", message),
        }
    }
}

/// Queues notifications for a consumer (a UI toast layer, a test)
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, NotificationFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, NotificationFeed { rx })
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        // A dropped feed just means nobody is listening anymore
        if self.tx.send(Notification::new(kind, message)).is_err() {
            tracing::debug!("notification feed closed, dropping: {}", message);
        }
    }
}

/// Receiving side of a [`ChannelNotifier`]
#[derive(Debug)]
pub struct NotificationFeed {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl NotificationFeed {
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }

    /// Everything queued so far, oldest first
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(notification) = self.rx.try_recv() {
            out.push(notification);
        }
        out
    }
}
