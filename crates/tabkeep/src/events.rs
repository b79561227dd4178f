//! Typed notifications from the core to its UI host.
//!
//! Stores, the accessor and the coordinator publish [`CoreEvent`]s on a channel
//! instead of broadcasting globally. The host owns the single [`EventReceiver`]
//! and drains it on its own schedule; a dropped receiver turns sends into no-ops.
//!
//! Best-effort operations that fall back to a safe default still publish a
//! [`CoreEvent::Failure`], so nothing the core swallows is invisible to the host.

use crate::error::TabkeepError;
use crate::model::DocumentId;
use std::path::PathBuf;
use std::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    DocumentChanged { document: DocumentId },
    TitleChanged { document: DocumentId, title: String },
    WorkingDirectoryChanged { path: Option<PathBuf> },
    Failure(Notice),
    /// Restored documents that never got a window within the retry budget.
    FanOutAbandoned { remaining: Vec<DocumentId> },
}

/// A non-fatal failure the host may show to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub operation: &'static str,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<CoreEvent>,
}

impl EventSender {
    pub fn send(&self, event: CoreEvent) {
        let _ = self.tx.send(event);
    }

    pub fn failure(&self, operation: &'static str, err: &TabkeepError) {
        tracing::warn!(operation, error = %err, "operation fell back to default");
        self.send(CoreEvent::Failure(Notice {
            operation,
            message: err.to_string(),
        }));
    }
}

pub struct EventReceiver {
    rx: mpsc::Receiver<CoreEvent>,
}

impl EventReceiver {
    /// Takes every event published so far.
    pub fn drain(&self) -> Vec<CoreEvent> {
        self.rx.try_iter().collect()
    }
}

pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, EventReceiver { rx })
}
