//! User directory
//!
//! Maps human-readable handles to [`UserRef`]s and back. The identity system
//! owns the mapping; the friend service only resolves through it.

use crate::error::SocialError;
use crate::types::UserRef;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Handle resolution supplied by the identity system.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a handle. Unknown handles fail with `NotFound`.
    async fn resolve(&self, handle: &str) -> Result<UserRef, SocialError>;

    /// Handle registered for `user`, if any.
    async fn handle_of(&self, user: &UserRef) -> Result<Option<String>, SocialError>;
}

#[derive(Debug, Default)]
struct Entries {
    by_handle: HashMap<String, UserRef>,
    by_user: HashMap<UserRef, String>,
}

/// In-memory directory
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    entries: RwLock<Entries>,
}

impl MemoryUserDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded from `(handle, user)` pairs.
    pub fn from_entries<H: Into<String>>(entries: impl IntoIterator<Item = (H, UserRef)>) -> Self {
        let directory = Self::new();
        for (handle, user) in entries {
            directory.register(handle, user);
        }
        directory
    }

    /// Bind `handle` to `user`, replacing any earlier binding of either.
    pub fn register(&self, handle: impl Into<String>, user: UserRef) {
        let handle = handle.into();
        let mut entries = self.entries.write();
        if let Some(old_user) = entries.by_handle.remove(&handle) {
            entries.by_user.remove(&old_user);
        }
        if let Some(old_handle) = entries.by_user.remove(&user) {
            entries.by_handle.remove(&old_handle);
        }
        entries.by_handle.insert(handle.clone(), user.clone());
        entries.by_user.insert(user, handle);
    }

    /// Drop the binding for `handle`, returning the user it named.
    pub fn unregister(&self, handle: &str) -> Option<UserRef> {
        let mut entries = self.entries.write();
        let user = entries.by_handle.remove(handle)?;
        entries.by_user.remove(&user);
        Some(user)
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.entries.read().by_handle.len()
    }

    /// Whether no users are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn resolve(&self, handle: &str) -> Result<UserRef, SocialError> {
        self.entries
            .read()
            .by_handle
            .get(handle)
            .cloned()
            .ok_or_else(|| SocialError::user_not_found(handle))
    }

    async fn handle_of(&self, user: &UserRef) -> Result<Option<String>, SocialError> {
        Ok(self.entries.read().by_user.get(user).cloned())
    }
}
