//! Registry of connected observers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SendResult;
use crate::metrics;

/// Identity of a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something that can receive text notifications.
#[async_trait]
pub trait Observer: Send + Sync {
    fn id(&self) -> ObserverId;

    /// Deliver one text message. May wait, e.g. on a full outbound queue.
    async fn send_text(&self, text: &str) -> SendResult<()>;
}

/// The set of observers that receive broadcasts.
///
/// Registration and removal may happen at any time, concurrently with
/// broadcasts; a broadcast works on a [`snapshot`](Self::snapshot).
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<HashMap<ObserverId, Arc<dyn Observer>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Adding one that is already present is a no-op.
    pub async fn add(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = observer.id();
        let mut observers = self.observers.write().await;
        if observers.insert(id, observer).is_none() {
            info!(observer_id = %id, total = observers.len(), "Observer connected");
        }
        metrics::set_observers(observers.len());
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub async fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write().await;
        let removed = observers.remove(&id).is_some();
        if removed {
            info!(observer_id = %id, total = observers.len(), "Observer disconnected");
        } else {
            debug!(observer_id = %id, "Observer already removed");
        }
        metrics::set_observers(observers.len());
        removed
    }

    pub async fn contains(&self, id: ObserverId) -> bool {
        self.observers.read().await.contains_key(&id)
    }

    /// Observers registered at this instant.
    pub async fn snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.observers.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.observers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.observers.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::{Broadcaster, BroadcasterConfig};
    use std::collections::HashSet;
    use tokio::task::JoinSet;

    struct NullObserver(ObserverId);

    #[async_trait]
    impl Observer for NullObserver {
        fn id(&self) -> ObserverId {
            self.0
        }

        async fn send_text(&self, _text: &str) -> SendResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_add_remove_idempotent() {
        let registry = ObserverRegistry::new();
        let observer = Arc::new(NullObserver(ObserverId::new()));

        let id = registry.add(observer.clone()).await;
        registry.add(observer).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(id).await);

        assert!(registry.remove(id).await);
        assert!(!registry.remove(id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_unknown() {
        let registry = ObserverRegistry::new();
        assert!(!registry.remove(ObserverId::new()).await);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = Arc::new(ObserverRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = registry.add(Arc::new(NullObserver(ObserverId::new()))).await;
                let _ = registry.snapshot().await;
                id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        assert_eq!(registry.len().await, 32);

        for id in ids.iter().step_by(2) {
            registry.remove(*id).await;
        }
        assert_eq!(registry.len().await, 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_churn_during_broadcasts() {
        let registry = Arc::new(ObserverRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone(), BroadcasterConfig::default());
        let mut tasks = JoinSet::new();

        // Long-lived observers, each registered twice
        let stayers: Vec<ObserverId> = (0..16).map(|_| ObserverId::new()).collect();
        for id in stayers.clone() {
            let registry = registry.clone();
            tasks.spawn(async move {
                registry.add(Arc::new(NullObserver(id))).await;
                tokio::task::yield_now().await;
                registry.add(Arc::new(NullObserver(id))).await;
            });
        }

        // Short-lived observers that connect and disconnect
        for _ in 0..32 {
            let registry = registry.clone();
            tasks.spawn(async move {
                let observer = Arc::new(NullObserver(ObserverId::new()));
                let id = registry.add(observer.clone()).await;
                tokio::task::yield_now().await;
                registry.add(observer).await;
                assert!(registry.remove(id).await);
                assert!(!registry.remove(id).await);
            });
        }

        // Broadcasts and snapshots racing the churn
        for _ in 0..8 {
            let registry = registry.clone();
            let broadcaster = broadcaster.clone();
            tasks.spawn(async move {
                for _ in 0..10 {
                    let report = broadcaster.broadcast_system_message("churn").await;
                    assert_eq!(report.failed + report.timed_out, 0);

                    let snapshot = registry.snapshot().await;
                    let unique: HashSet<ObserverId> = snapshot.iter().map(|o| o.id()).collect();
                    assert_eq!(unique.len(), snapshot.len());
                    tokio::task::yield_now().await;
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }

        let remaining: HashSet<ObserverId> =
            registry.snapshot().await.iter().map(|o| o.id()).collect();
        let expected: HashSet<ObserverId> = stayers.into_iter().collect();
        assert_eq!(remaining, expected);
        assert_eq!(registry.len().await, 16);

        let report = broadcaster.broadcast_system_message("final").await;
        assert_eq!(report.attempted, 16);
        assert_eq!(report.delivered, 16);
    }
}
