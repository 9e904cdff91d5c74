// crates/server/src/live/registry.rs
//! Per-project subscriber registry for live build streams.
//!
//! Keyed by [`ProjectId`] in a sharded `DashMap`, so attach/detach/snapshot on
//! one project serialize against each other while unrelated projects do not
//! contend. An empty subscriber list is never retained: the entry is removed
//! in the same locked step that removes its last subscriber.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use xapp_core::{DeliveryError, ProjectId};

use crate::metrics;

pub type SubscriberId = u64;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Sending half of one live connection.
///
/// The registry only holds this sender; the WebSocket task owns the socket and
/// the receiving half.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<String>,
}

impl Subscriber {
    /// New subscriber with a process-unique id, plus the receiver its
    /// transport task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed);
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Queue one wire line. Fails only once the receiving side is gone.
    pub fn deliver(&self, line: String) -> Result<(), DeliveryError> {
        self.tx.send(line).map_err(|_| DeliveryError {
            subscriber_id: self.id,
        })
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscriber {}

#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    projects: DashMap<ProjectId, Vec<Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` under `project`; it receives every broadcast
    /// issued after this returns.
    pub fn attach(&self, project: &ProjectId, subscriber: Subscriber) {
        let id = subscriber.id;
        self.projects
            .entry(project.clone())
            .or_default()
            .push(subscriber);
        metrics::subscriber_connected();
        tracing::debug!(project_id = %project, subscriber_id = id, "subscriber attached");
    }

    /// Remove a subscriber. Returns whether anything was removed; detaching an
    /// unknown subscriber or project is a no-op.
    pub fn detach(&self, project: &ProjectId, subscriber_id: SubscriberId) -> bool {
        let removed = match self.projects.entry(project.clone()) {
            Entry::Occupied(mut entry) => {
                let subscribers = entry.get_mut();
                let before = subscribers.len();
                subscribers.retain(|s| s.id != subscriber_id);
                let removed = subscribers.len() < before;
                if subscribers.is_empty() {
                    entry.remove();
                }
                removed
            }
            Entry::Vacant(_) => false,
        };
        if removed {
            metrics::subscriber_disconnected();
            tracing::debug!(project_id = %project, subscriber_id, "subscriber detached");
        }
        removed
    }

    /// Point-in-time copy of a project's subscribers, in attach order.
    /// Never creates an entry.
    pub fn subscribers_of(&self, project: &ProjectId) -> Vec<Subscriber> {
        self.projects
            .get(project)
            .map(|subscribers| subscribers.value().clone())
            .unwrap_or_default()
    }

    pub fn contains_project(&self, project: &ProjectId) -> bool {
        self.projects.contains_key(project)
    }

    /// Projects with at least one live subscriber.
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn subscriber_count(&self, project: &ProjectId) -> usize {
        self.projects.get(project).map(|s| s.len()).unwrap_or(0)
    }

    pub fn total_subscribers(&self) -> usize {
        self.projects.iter().map(|entry| entry.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pid(raw: &str) -> ProjectId {
        ProjectId::parse(raw).unwrap()
    }

    #[test]
    fn test_attach_creates_entry_and_snapshot_in_order() {
        let registry = SubscriberRegistry::new();
        let p = pid("p1");
        let (a, _rx_a) = Subscriber::channel();
        let (b, _rx_b) = Subscriber::channel();

        registry.attach(&p, a.clone());
        registry.attach(&p, b.clone());

        assert_eq!(registry.subscribers_of(&p), vec![a, b]);
        assert_eq!(registry.subscriber_count(&p), 2);
        assert_eq!(registry.project_count(), 1);
    }

    #[test]
    fn test_last_detach_removes_project() {
        let registry = SubscriberRegistry::new();
        let p = pid("p1");
        let (a, _rx_a) = Subscriber::channel();
        let (b, _rx_b) = Subscriber::channel();
        registry.attach(&p, a.clone());
        registry.attach(&p, b.clone());

        assert!(registry.detach(&p, a.id()));
        assert!(registry.contains_project(&p));
        assert_eq!(registry.subscribers_of(&p), vec![b.clone()]);

        assert!(registry.detach(&p, b.id()));
        assert!(!registry.contains_project(&p));
        assert_eq!(registry.project_count(), 0);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let p = pid("p1");
        let (a, _rx) = Subscriber::channel();
        registry.attach(&p, a.clone());

        assert!(registry.detach(&p, a.id()));
        assert!(!registry.detach(&p, a.id()));
        assert!(!registry.detach(&pid("never-seen"), a.id()));
        assert_eq!(registry.project_count(), 0);
    }

    #[test]
    fn test_detach_unknown_subscriber_keeps_others() {
        let registry = SubscriberRegistry::new();
        let p = pid("p1");
        let (a, _rx) = Subscriber::channel();
        registry.attach(&p, a.clone());

        assert!(!registry.detach(&p, a.id() + 10_000));
        assert_eq!(registry.subscribers_of(&p), vec![a]);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let registry = SubscriberRegistry::new();
        let p = pid("p1");
        let (a, _rx_a) = Subscriber::channel();
        registry.attach(&p, a.clone());

        let snapshot = registry.subscribers_of(&p);
        let (b, _rx_b) = Subscriber::channel();
        registry.attach(&p, b);
        registry.detach(&p, a.id());

        assert_eq!(snapshot, vec![a]);
    }

    #[test]
    fn test_snapshot_of_unknown_project_creates_nothing() {
        let registry = SubscriberRegistry::new();
        assert!(registry.subscribers_of(&pid("ghost")).is_empty());
        assert_eq!(registry.project_count(), 0);
    }

    #[test]
    fn test_projects_are_independent() {
        let registry = SubscriberRegistry::new();
        let (a, _rx_a) = Subscriber::channel();
        let (b, _rx_b) = Subscriber::channel();
        registry.attach(&pid("p1"), a.clone());
        registry.attach(&pid("p2"), b);

        registry.detach(&pid("p1"), a.id());
        assert!(!registry.contains_project(&pid("p1")));
        assert_eq!(registry.subscriber_count(&pid("p2")), 1);
        assert_eq!(registry.total_subscribers(), 1);
    }

    #[test]
    fn test_deliver_fails_after_receiver_dropped() {
        let (sub, rx) = Subscriber::channel();
        assert!(sub.deliver("one\n".into()).is_ok());
        drop(rx);
        assert_eq!(
            sub.deliver("two\n".into()),
            Err(DeliveryError {
                subscriber_id: sub.id()
            })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_attach_detach_leaves_no_entries() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut tasks = Vec::new();
        for i in 0..32 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let p = ProjectId::parse(&format!("p{}", i % 4)).unwrap();
                for _ in 0..50 {
                    let (sub, _rx) = Subscriber::channel();
                    let id = sub.id();
                    registry.attach(&p, sub);
                    tokio::task::yield_now().await;
                    assert!(registry.detach(&p, id));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(registry.project_count(), 0);
        assert_eq!(registry.total_subscribers(), 0);
    }
}
