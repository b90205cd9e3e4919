//! File-backed social store
//!
//! The whole state lives in one JSON document. Each commit is applied to a
//! copy of the current state, written to a sibling temp file and renamed over
//! the document; only then does the in-memory view advance. A commit that
//! fails to persist leaves both the document and the view unchanged, and so
//! does one whose deadline passes before persisting begins.

use super::{Applied, Commit, FriendStore, SocialState};
use crate::error::{SocialError, StorageError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

/// JSON document store for social state
#[derive(Debug, Clone)]
pub struct FileFriendStore {
    inner: Arc<FileInner>,
}

#[derive(Debug)]
struct FileInner {
    path: PathBuf,
    state: RwLock<Arc<SocialState>>,
    /// Serializes apply + persist + publish
    write_gate: Mutex<()>,
}

impl FileFriendStore {
    /// Open the document at `path`, starting empty if it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let state = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<SocialState>(&bytes).map_err(|e| {
                StorageError::Corrupt(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SocialState::new(),
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::debug!(
            path = %path.display(),
            pending = state.pending_count(),
            edges = state.edge_count(),
            "opened social store"
        );

        Ok(Self {
            inner: Arc::new(FileInner {
                path,
                state: RwLock::new(Arc::new(state)),
                write_gate: Mutex::new(()),
            }),
        })
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

/// Where an in-flight commit stands relative to its caller's deadline.
#[derive(Debug, Default)]
struct Phase(AtomicU8);

impl Phase {
    const WAITING: u8 = 0;
    const PERSISTING: u8 = 1;
    const ABANDONED: u8 = 2;

    /// Claim the right to persist. Fails once the caller has given up.
    fn begin_persist(&self) -> bool {
        self.transition(Self::PERSISTING)
    }

    /// Give up on the commit. Fails once persisting has begun.
    fn abandon(&self) -> bool {
        self.transition(Self::ABANDONED)
    }

    fn transition(&self, to: u8) -> bool {
        self.0
            .compare_exchange(Self::WAITING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl FileInner {
    async fn commit(&self, commit: Commit, phase: &Phase) -> Result<Vec<Applied>, SocialError> {
        let _gate = self.write_gate.lock().await;

        let mut next = SocialState::clone(&self.state.read());
        let applied = next.apply(&commit)?;

        if !phase.begin_persist() {
            tracing::debug!(path = %self.path.display(), "commit abandoned before persist");
            let deadline = commit.deadline();
            return Err(deadline
                .map(|deadline| deadline.timeout_error())
                .unwrap_or_else(|| StorageError::Unavailable("commit abandoned".to_string()))
                .into());
        }

        persist(&self.path, &next).await.map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "commit not persisted");
            e
        })?;
        *self.state.write() = Arc::new(next);

        Ok(applied)
    }
}

#[async_trait]
impl FriendStore for FileFriendStore {
    async fn snapshot(&self) -> Result<Arc<SocialState>, StorageError> {
        Ok(self.inner.state.read().clone())
    }

    async fn commit(&self, commit: Commit) -> Result<Vec<Applied>, SocialError> {
        // The commit runs on its own task so a caller that stops waiting
        // cannot interrupt it between persist and publish.
        let deadline = commit.deadline();
        let inner = Arc::clone(&self.inner);
        let phase = Arc::new(Phase::default());
        let task_phase = Arc::clone(&phase);
        let mut task = tokio::spawn(async move { inner.commit(commit, &task_phase).await });

        let joined = match deadline {
            None => (&mut task).await,
            Some(deadline) => match tokio::time::timeout_at(deadline.at(), &mut task).await {
                Ok(joined) => joined,
                Err(_) if phase.abandon() => return Err(deadline.timeout_error().into()),
                // Persisting already began: report what actually happened.
                Err(_) => (&mut task).await,
            },
        };
        joined.map_err(|e| StorageError::Unavailable(format!("commit task failed: {e}")))?
    }
}

async fn persist(path: &Path, state: &SocialState) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::Io(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
    }

    let bytes = serde_json::to_vec_pretty(state)
        .map_err(|e| StorageError::Corrupt(format!("failed to encode state: {e}")))?;

    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)
        .await
        .map_err(|e| StorageError::Io(format!("failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path).await.map_err(|e| {
        StorageError::Io(format!("failed to replace {}: {}", path.display(), e))
    })?;

    Ok(())
}
