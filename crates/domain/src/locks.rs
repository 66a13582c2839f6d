//! Per-user serialization of cart mutations and checkout.

use std::collections::HashMap;
use std::sync::Arc;

use common::UserId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per user.
///
/// Cart mutations and checkout for the same user take the same lock, so a
/// checkout never observes a half-applied cart edit. Different users never
/// contend. Cloning shares the underlying table.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<UserId, Arc<Mutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and returns the user's lock. Released when the guard drops.
    pub async fn lock(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let entry = {
            let mut table = self.inner.lock().await;
            // Entries only the table references are idle
            table.retain(|id, lock| *id == user_id || Arc::strong_count(lock) > 1);
            table.entry(user_id).or_default().clone()
        };
        entry.lock_owned().await
    }

    /// Number of users currently tracked.
    pub async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}
