//! Trace recorder — every mode event goes through here.
//!
//! An event is appended to the active session's log first and only then
//! published on the [`EventBus`], so a subscriber never sees an event the
//! log does not have.

use std::sync::Arc;
use stepwise_core::event::{EventBus, ModeEvent, ModeKind};
use stepwise_core::session::SessionStore;
use tracing::debug;

/// Records mode events for one session.
pub struct TraceRecorder {
    store: Arc<dyn SessionStore>,
    bus: Arc<EventBus>,
    session_id: String,
}

impl TraceRecorder {
    pub fn new(
        store: Arc<dyn SessionStore>,
        bus: Arc<EventBus>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bus,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stamp, persist and publish one event.
    pub async fn record(&self, kind: ModeKind) -> Arc<ModeEvent> {
        let event = Arc::new(ModeEvent::new(kind));
        debug!(session = %self.session_id, mode = event.mode(), "Mode event");
        self.store
            .append_entry(&self.session_id, &event.to_value())
            .await;
        self.bus.publish(Arc::clone(&event));
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::event::PlanPhase;
    use stepwise_memory::InMemorySessionStore;

    #[tokio::test]
    async fn appends_then_publishes() {
        let store = Arc::new(InMemorySessionStore::default());
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let recorder = TraceRecorder::new(store.clone(), bus, "s1");

        recorder
            .record(ModeKind::Plan {
                status: PlanPhase::Creating,
                plan_id: None,
                message: None,
            })
            .await;

        let published = rx.recv().await.unwrap();
        assert_eq!(published.mode(), "PLAN");

        let entries = store.read_entries("s1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mode(), Some("PLAN"));
    }
}
