//! Output Notifications
//!
//! Reports list changes and navigation requests to the host workflow, and
//! upload outcomes to the user. All sinks are fire-and-forget: a failed
//! delivery is logged and never alters the attachment list.

use std::sync::Arc;

use fu_core::AttachmentId;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Name of the host attribute that receives the attachment ids
pub const ATTACHMENT_IDS_ATTRIBUTE: &str = "contentDocumentIds";

/// Sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink closed")]
    Closed,
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Toast style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastVariant {
    Success,
    Error,
}

/// A user-facing notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub title: String,
    pub message: Option<String>,
    pub variant: ToastVariant,
}

impl Toast {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: None,
            variant: ToastVariant::Success,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: Some(message.into()),
            variant: ToastVariant::Error,
        }
    }
}

/// Everything an uploader emits, in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    AttributeChanged {
        name: String,
        value: Vec<AttachmentId>,
    },
    NavigateNext,
    Toast(Toast),
}

/// Receives output from the uploader on behalf of the host workflow
pub trait HostSink: Send + Sync {
    /// The attachment list changed; `ids` is the full current list
    ///
    /// Called while the uploader holds its list lock, which keeps
    /// notifications in mutation order. Implementations must not call
    /// back into the uploader (`attachments`, `attachment_ids`, `badges`)
    /// from here; that lock is not re-entrant and the call would deadlock.
    /// Everything the host needs is in `ids`.
    fn attachments_changed(&self, ids: &[AttachmentId]) -> SinkResult<()>;

    /// Ask the host to move to the next step
    fn advance_requested(&self) -> SinkResult<()>;
}

/// Presents upload outcomes to the user
pub trait UiSink: Send + Sync {
    fn show_toast(&self, toast: Toast) -> SinkResult<()>;
}

/// Translates list changes into host and user notifications
#[derive(Clone)]
pub struct OutputNotifier {
    host: Arc<dyn HostSink>,
    ui: Arc<dyn UiSink>,
}

impl OutputNotifier {
    pub fn new(host: Arc<dyn HostSink>, ui: Arc<dyn UiSink>) -> Self {
        Self { host, ui }
    }

    /// Use one sink for both host and user notifications
    pub fn with_sink<S>(sink: Arc<S>) -> Self
    where
        S: HostSink + UiSink + 'static,
    {
        Self {
            host: sink.clone(),
            ui: sink,
        }
    }

    /// Send the full id list to the host
    pub fn notify(&self, ids: &[AttachmentId]) -> SinkResult<()> {
        debug!(count = ids.len(), "Notifying host of attachment change");
        self.host.attachments_changed(ids).map_err(|e| {
            warn!(error = %e, "Attachment change notification failed");
            e
        })
    }

    pub fn signal_advance(&self) -> SinkResult<()> {
        debug!("Requesting navigation to next step");
        self.host.advance_requested().map_err(|e| {
            warn!(error = %e, "Advance request failed");
            e
        })
    }

    pub fn upload_succeeded(&self, filename: &str) {
        self.toast(Toast::success(format!("{} uploaded successfully!!", filename)));
    }

    pub fn upload_failed(&self, filename: &str, reason: &dyn std::fmt::Display) {
        self.toast(Toast::error(
            format!("{} could not be uploaded", filename),
            reason.to_string(),
        ));
    }

    pub fn remove_failed(&self, name: &str, reason: &dyn std::fmt::Display) {
        self.toast(Toast::error(
            format!("{} could not be deleted", name),
            reason.to_string(),
        ));
    }

    fn toast(&self, toast: Toast) {
        if let Err(e) = self.ui.show_toast(toast) {
            warn!(error = %e, "Toast delivery failed");
        }
    }
}

/// Sink that keeps every event in memory, for tests and embedding hosts
#[derive(Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<HostEvent>>,
    reject_changes: std::sync::atomic::AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `attachments_changed` fail (the event is not recorded)
    pub fn reject_changes(&self, reject: bool) {
        self.reject_changes
            .store(reject, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().clone()
    }

    /// Id lists from every attribute change, oldest first
    pub fn changes(&self) -> Vec<Vec<AttachmentId>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                HostEvent::AttributeChanged { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn advance_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, HostEvent::NavigateNext))
            .count()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                HostEvent::Toast(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl HostSink for RecordingSink {
    fn attachments_changed(&self, ids: &[AttachmentId]) -> SinkResult<()> {
        if self.reject_changes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SinkError::Rejected("host refused attribute change".to_string()));
        }
        self.events.lock().push(HostEvent::AttributeChanged {
            name: ATTACHMENT_IDS_ATTRIBUTE.to_string(),
            value: ids.to_vec(),
        });
        Ok(())
    }

    fn advance_requested(&self) -> SinkResult<()> {
        self.events.lock().push(HostEvent::NavigateNext);
        Ok(())
    }
}

impl UiSink for RecordingSink {
    fn show_toast(&self, toast: Toast) -> SinkResult<()> {
        self.events.lock().push(HostEvent::Toast(toast));
        Ok(())
    }
}

/// Sink that forwards events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: HostEvent) -> SinkResult<()> {
        self.tx.send(event).map_err(|_| SinkError::Closed)
    }
}

impl HostSink for ChannelSink {
    fn attachments_changed(&self, ids: &[AttachmentId]) -> SinkResult<()> {
        self.send(HostEvent::AttributeChanged {
            name: ATTACHMENT_IDS_ATTRIBUTE.to_string(),
            value: ids.to_vec(),
        })
    }

    fn advance_requested(&self) -> SinkResult<()> {
        self.send(HostEvent::NavigateNext)
    }
}

impl UiSink for ChannelSink {
    fn show_toast(&self, toast: Toast) -> SinkResult<()> {
        self.send(HostEvent::Toast(toast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_sends_full_list() {
        let sink = Arc::new(RecordingSink::new());
        let notifier = OutputNotifier::with_sink(sink.clone());

        notifier.notify(&[AttachmentId::from("a")]).unwrap();
        notifier
            .notify(&[AttachmentId::from("a"), AttachmentId::from("b")])
            .unwrap();

        assert_eq!(
            sink.changes(),
            vec![
                vec![AttachmentId::from("a")],
                vec![AttachmentId::from("a"), AttachmentId::from("b")],
            ]
        );
    }

    #[test]
    fn test_success_toast_title() {
        let sink = Arc::new(RecordingSink::new());
        OutputNotifier::with_sink(sink.clone()).upload_succeeded("report.pdf");

        assert_eq!(
            sink.toasts(),
            vec![Toast::success("report.pdf uploaded successfully!!")]
        );
    }

    #[test]
    fn test_rejected_notify_is_reported() {
        let sink = Arc::new(RecordingSink::new());
        sink.reject_changes(true);
        let notifier = OutputNotifier::with_sink(sink.clone());

        assert!(matches!(
            notifier.notify(&[AttachmentId::from("a")]),
            Err(SinkError::Rejected(_))
        ));
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelSink::new();
        let notifier = OutputNotifier::with_sink(Arc::new(sink));

        notifier.notify(&[AttachmentId::from("068xx001")]).unwrap();
        notifier.signal_advance().unwrap();

        assert_eq!(
            rx.recv().await,
            Some(HostEvent::AttributeChanged {
                name: ATTACHMENT_IDS_ATTRIBUTE.to_string(),
                value: vec![AttachmentId::from("068xx001")],
            })
        );
        assert_eq!(rx.recv().await, Some(HostEvent::NavigateNext));
    }

    #[test]
    fn test_channel_sink_closed() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        assert!(matches!(sink.advance_requested(), Err(SinkError::Closed)));
    }

    #[test]
    fn test_host_event_json_shape() {
        let event = HostEvent::AttributeChanged {
            name: ATTACHMENT_IDS_ATTRIBUTE.to_string(),
            value: vec![AttachmentId::from("068xx001")],
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({
                "event": "attribute_changed",
                "name": "contentDocumentIds",
                "value": ["068xx001"],
            })
        );
    }
}
