//! Change notifications emitted after successful mutations.

use std::sync::Mutex;

use serde::Serialize;

use crate::types::{Document, LinkInstance};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    DocumentCreated {
        project_id: String,
        document: Document,
    },
    DocumentUpdated {
        project_id: String,
        before: Document,
        after: Document,
    },
    DocumentDeleted {
        project_id: String,
        document: Document,
    },
    /// Replaces per-document events for bulk imports.
    CollectionImported {
        project_id: String,
        collection_id: String,
        documents: usize,
    },
    LinkCreated {
        project_id: String,
        link: LinkInstance,
    },
    LinkDeleted {
        project_id: String,
        link: LinkInstance,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::DocumentCreated { .. } => "document_created",
            Event::DocumentUpdated { .. } => "document_updated",
            Event::DocumentDeleted { .. } => "document_deleted",
            Event::CollectionImported { .. } => "collection_imported",
            Event::LinkCreated { .. } => "link_created",
            Event::LinkDeleted { .. } => "link_deleted",
        }
    }
}

/// Fire-and-forget receiver of change events. Delivery failures must be
/// handled inside the sink; they never fail the originating mutation.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: Event);
}

#[derive(Debug, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _event: Event) {}
}

/// Writes each event to the tracing log.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: Event) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(event = event.name(), %payload, "change event"),
            Err(e) => tracing::warn!(event = event.name(), "failed to encode change event: {e}"),
        }
    }
}

/// Keeps every event in memory, for embedders and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        for documents in [1, 2] {
            sink.notify(Event::CollectionImported {
                project_id: "p".into(),
                collection_id: "c".into(),
                documents,
            });
        }

        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            Event::CollectionImported { documents: 2, .. }
        ));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(Event::CollectionImported {
            project_id: "p".into(),
            collection_id: "c".into(),
            documents: 3,
        })
        .unwrap();
        assert_eq!(json["event"], "collection_imported");
        assert_eq!(json["documents"], 3);
    }
}
