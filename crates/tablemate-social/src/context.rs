//! Shared handles for the ledger and the graph
//!
//! Both components read and commit through one store, serialize through one
//! lock registry and stamp records from one clock. Every storage access is
//! bounded by the configured timeout.

use crate::config::SocialConfig;
use crate::error::{SocialError, StorageError};
use crate::locks::PairLocks;
use crate::store::{Applied, Commit, Deadline, FriendStore, SocialState};
use crate::time::Clock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Time a store may take past a commit's deadline to finish a commit it had
/// already started persisting.
const COMMIT_GRACE: Duration = Duration::from_millis(500);

pub(crate) struct SocialContext {
    store: Arc<dyn FriendStore>,
    pub(crate) locks: PairLocks,
    pub(crate) clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl SocialContext {
    pub(crate) fn new(
        store: Arc<dyn FriendStore>,
        clock: Arc<dyn Clock>,
        config: &SocialConfig,
    ) -> Self {
        Self {
            store,
            locks: PairLocks::new(),
            clock,
            timeout: config.storage_timeout(),
        }
    }

    pub(crate) async fn snapshot(&self) -> Result<Arc<SocialState>, SocialError> {
        self.bounded(self.timeout, async {
            self.store.snapshot().await.map_err(SocialError::from)
        })
        .await
    }

    /// The store enforces the commit's deadline; the outer bound catches
    /// stores that overrun it.
    pub(crate) async fn commit(&self, commit: Commit) -> Result<Vec<Applied>, SocialError> {
        let commit = commit.with_deadline(Deadline::after(self.timeout));
        self.bounded(self.timeout + COMMIT_GRACE, self.store.commit(commit))
            .await
    }

    async fn bounded<T>(
        &self,
        limit: Duration,
        operation: impl Future<Output = Result<T, SocialError>>,
    ) -> Result<T, SocialError> {
        match tokio::time::timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => {
                let after_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(after_ms, "storage operation timed out");
                Err(StorageError::Timeout { after_ms }.into())
            }
        }
    }
}
