//! Tablemate Social - Friend Requests and Friendship Graph
//!
//! This crate tracks pairwise friendships between users and the request
//! workflow that creates them:
//!
//! - Request ledger: `send`, `withdraw`, `accept`, `reject` and the pending
//!   request queries (`RequestLedger`)
//! - Friendship graph: symmetric edges, removal and membership queries
//!   (`FriendshipGraph`)
//! - Service facade: handle resolution, rendered views and user purge
//!   (`FriendService`)
//!
//! # Consistency
//!
//! Mutations on a pair `{a, b}` are serialized by a per-pair lock, and every
//! commit re-checks its preconditions under the store's write lock. Accepting
//! a request resolves it and creates the edge in one commit, so callers never
//! observe one without the other.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tablemate_social::{FriendService, MemoryUserDirectory, UserRef};
//!
//! let alice = UserRef::new("alice");
//! let bob = UserRef::new("bob");
//! let service = FriendService::in_memory(Arc::new(MemoryUserDirectory::new()));
//!
//! service.send_request(&alice, &bob).await?;
//! service.accept_request(&alice, &bob).await?;
//! assert!(service.are_friends(&bob, &alice).await?);
//! ```

pub mod config;
mod context;
pub mod directory;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod locks;
pub mod service;
pub mod store;
pub mod time;
pub mod types;

pub use config::SocialConfig;
pub use directory::{MemoryUserDirectory, UserDirectory};
pub use error::{ConflictReason, ErrorKind, Missing, SocialError, StorageError};
pub use graph::FriendshipGraph;
pub use ledger::RequestLedger;
pub use locks::{PairGuard, PairLocks};
pub use service::{FriendService, PurgeSummary, RequestView};
pub use store::{
    Applied, Commit, Deadline, FileFriendStore, FriendStore, MemoryFriendStore, Mutation,
    SocialState,
};
pub use time::{Clock, FixedClock, SystemClock};
pub use types::{FriendRequest, FriendshipEdge, PairKey, RequestId, RequestStatus, UserRef};
