//! In-memory social store

use super::{Applied, Commit, FriendStore, SocialState};
use crate::error::{SocialError, StorageError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// In-memory store. Snapshots share structure with the live state until the
/// next commit copies it.
#[derive(Debug, Default)]
pub struct MemoryFriendStore {
    state: RwLock<Arc<SocialState>>,
}

impl MemoryFriendStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with existing state
    pub fn with_state(state: SocialState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
        }
    }
}

#[async_trait]
impl FriendStore for MemoryFriendStore {
    async fn snapshot(&self) -> Result<Arc<SocialState>, StorageError> {
        Ok(self.state.read().clone())
    }

    async fn commit(&self, commit: Commit) -> Result<Vec<Applied>, SocialError> {
        if let Some(deadline) = commit.deadline().filter(|deadline| deadline.expired()) {
            return Err(deadline.timeout_error().into());
        }
        let mut guard = self.state.write();
        Arc::make_mut(&mut *guard).apply(&commit)
    }
}
