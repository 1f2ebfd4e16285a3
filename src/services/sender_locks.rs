use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes message handling per sender. Entries are dropped again once
/// nobody holds or waits for them.
#[derive(Clone, Default)]
pub struct SenderLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

#[derive(Debug)]
pub struct SenderGuard {
    guard: Option<OwnedMutexGuard<()>>,
    sender: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SenderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, sender: &str) -> SenderGuard {
        let lock = self.inner.entry(sender.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        SenderGuard {
            guard: Some(guard),
            sender: sender.to_string(),
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

impl Drop for SenderGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.sender, |_, lock| Arc::strong_count(lock) == 1);
    }
}
