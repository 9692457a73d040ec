//! Event sink trait and implementations.

use super::types::is_problem;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

/// Receives pipeline lifecycle events.
///
/// Sinks must not fail: an event that cannot be delivered is dropped.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    ///
    /// * `event_type` - dotted event name, e.g. `stage.started`
    /// * `data` - event payload
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event without awaiting.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Forwards events to `tracing`.
///
/// Blocked and failed stages and rejected uploads are logged at `WARN`;
/// everything else at the configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging routine events at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event_type: &str, data: Option<&Value>) {
        if is_problem(event_type) {
            warn!(event_type = %event_type, event_data = ?data, "Event: {event_type}");
        } else if self.level == Level::DEBUG || self.level == Level::TRACE {
            debug!(event_type = %event_type, event_data = ?data, "Event: {event_type}");
        } else {
            info!(event_type = %event_type, event_data = ?data, "Event: {event_type}");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// Records every event. Used by tests and by shells that render history.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.read().clone()
    }

    /// The collected event names in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Drops all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Events whose name starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types;

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        NoOpEventSink.emit(types::STAGE_STARTED, None).await;
        let sink = LoggingEventSink::debug();
        sink.emit(types::STAGE_FAILED, Some(serde_json::json!({"stage": "a"})))
            .await;
        sink.try_emit(types::LOG_CLEARED, None);
    }

    #[tokio::test]
    async fn test_collecting_sink_order_and_filter() {
        let sink = CollectingEventSink::new();
        sink.emit(types::UPLOAD_ACCEPTED, None).await;
        sink.emit(types::STAGE_STARTED, None).await;
        sink.try_emit(types::STAGE_COMPLETED, Some(serde_json::json!({"ok": true})));

        assert_eq!(
            sink.event_types(),
            vec!["upload.accepted", "stage.started", "stage.completed"]
        );
        assert_eq!(sink.events_of_type("stage.").len(), 2);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_collecting_sink_from_sync_code() {
        let sink = CollectingEventSink::new();
        tokio_test::block_on(sink.emit(types::STAGE_BLOCKED, None));
        assert_eq!(sink.len(), 1);
    }
}
