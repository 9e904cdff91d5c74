// crates/server/src/live/broadcaster.rs
//! Fan-out of build events to a project's subscribers.

use std::sync::Arc;

use xapp_core::BuildEvent;

use super::registry::SubscriberRegistry;
use crate::metrics;

/// Delivers events to the current subscribers of the event's project.
///
/// Delivery is best-effort and per subscriber: a broken channel detaches that
/// subscriber and the remaining ones still receive the event.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Returns the number of subscribers the event was queued to.
    pub fn broadcast(&self, event: &BuildEvent) -> usize {
        let subscribers = self.registry.subscribers_of(&event.project_id);
        if subscribers.is_empty() {
            return 0;
        }

        let line = event.to_wire();
        let mut delivered = 0;
        for subscriber in &subscribers {
            match subscriber.deliver(line.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        project_id = %event.project_id,
                        error = %e,
                        "pruning subscriber after failed delivery"
                    );
                    if self.registry.detach(&event.project_id, e.subscriber_id) {
                        metrics::record_subscriber_pruned();
                    }
                }
            }
        }
        metrics::record_events_delivered(delivered);
        delivered
    }
}
