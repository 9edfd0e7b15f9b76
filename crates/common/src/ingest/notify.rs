//! Alerts raised while ingesting
//!
//! Size mismatches and newly collected versions are reported to a
//! [`NotificationSink`]. [`TracingSink`] just logs them;
//! [`ChannelSink`] forwards them over a flume channel to whatever task
//! raises the actual alerts.

use serde::Serialize;

use crate::au::AuId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NotificationKind {
    /// Received size differs from the declared length
    FileVerification,
    /// A version with different content was stored
    NewFileVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub au_id: AuId,
    pub url: String,
    pub severity: Severity,
    pub message: String,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info => tracing::info!("[{}] {:?}: {}", n.au_id, n.kind, n.message),
            Severity::Warning => tracing::warn!("[{}] {:?}: {}", n.au_id, n.kind, n.message),
            Severity::Error => tracing::error!("[{}] {:?}: {}", n.au_id, n.kind, n.message),
        }
    }
}

/// Cloneable sink handing notifications to a receiver task
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: flume::Sender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, flume::Receiver<Notification>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            tracing::debug!("Notification receiver gone, dropping: {:?}", e.into_inner());
        }
    }
}
