use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::workflow::EntityKind;

/// Per-entity async locks. Commands on one entity run one at a time;
/// different entities never contend.
#[derive(Clone, Default, Debug)]
pub struct EntityLocks {
    inner: Arc<DashMap<(EntityKind, Uuid), Arc<Mutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, kind: EntityKind, id: Uuid) -> EntityGuard {
        let mutex = self
            .inner
            .entry((kind, id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        EntityGuard {
            key: (kind, id),
            guard: Some(mutex.lock_owned().await),
            locks: self.inner.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Held for the duration of one command. Dropping it releases the lock and
/// forgets the entry when nobody else is waiting on it.
#[derive(Debug)]
pub struct EntityGuard {
    key: (EntityKind, Uuid),
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<(EntityKind, Uuid), Arc<Mutex<()>>>>,
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Map entry plus nobody else: safe to remove.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_entity_is_serialized() {
        let locks = EntityLocks::new();
        let id = Uuid::new_v4();
        let first = locks.acquire(EntityKind::Delivery, id).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(EntityKind::Delivery, id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_entities_do_not_block() {
        let locks = EntityLocks::new();
        let _a = locks.acquire(EntityKind::Order, Uuid::new_v4()).await;
        let b = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(EntityKind::Order, Uuid::new_v4()),
        )
        .await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
