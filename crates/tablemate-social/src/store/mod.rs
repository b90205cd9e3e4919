//! Social state storage
//!
//! The request ledger and the friendship graph share one typed state,
//! [`SocialState`], and change it only through [`Commit`]s. A commit is an
//! ordered batch of [`Mutation`]s, each carrying its own precondition. The
//! batch applies all-or-nothing: the first failed precondition rolls back
//! everything applied before it.
//!
//! Backends implement [`FriendStore`]:
//! - [`MemoryFriendStore`] keeps the state in memory
//! - [`FileFriendStore`] persists it as a JSON document

mod filesystem;
mod memory;

pub use filesystem::FileFriendStore;
pub use memory::MemoryFriendStore;

use crate::error::{Missing, SocialError, StorageError};
use crate::types::{FriendRequest, FriendshipEdge, PairKey, RequestId, RequestStatus, UserRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Schema version for persisted social state
pub const SOCIAL_STATE_SCHEMA_VERSION: u32 = 1;

/// Storage backend for social state.
#[async_trait]
pub trait FriendStore: Send + Sync {
    /// Consistent, immutable view of the current state.
    async fn snapshot(&self) -> Result<Arc<SocialState>, StorageError>;

    /// Apply a commit atomically, returning one [`Applied`] per mutation.
    ///
    /// A commit whose [`Deadline`] passes before it takes effect must apply
    /// nothing and fail with the deadline's timeout error.
    async fn commit(&self, commit: Commit) -> Result<Vec<Applied>, SocialError>;
}

/// A single state change and its precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Record a new pending request. Requires no edge and no pending request
    /// between the pair.
    InsertRequest(FriendRequest),
    /// Move a pending request to a terminal status. Requires it be pending.
    ResolveRequest {
        /// Request to resolve
        id: RequestId,
        /// Terminal status
        status: RequestStatus,
        /// Resolution time
        at: DateTime<Utc>,
    },
    /// Delete a pending request outright. Requires it be pending.
    DeleteRequest(RequestId),
    /// Insert an edge if absent. No precondition; existing edges are kept.
    InsertEdge(FriendshipEdge),
    /// Delete an edge. Requires it exist.
    DeleteEdge(PairKey),
    /// Remove every request and edge referencing a user.
    PurgeUser(UserRef),
}

/// Effect of one applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Request recorded
    RequestInserted(RequestId),
    /// Request moved to a terminal status
    RequestResolved {
        /// Resolved request
        id: RequestId,
        /// Its terminal status
        status: RequestStatus,
    },
    /// Pending request deleted
    RequestDeleted(RequestId),
    /// Edge insert processed
    EdgeInserted {
        /// Edge key
        pair: PairKey,
        /// False when the edge already existed
        created: bool,
    },
    /// Edge removed
    EdgeDeleted(PairKey),
    /// User references purged
    UserPurged {
        /// Requests removed
        requests_removed: usize,
        /// Edges removed
        edges_removed: usize,
    },
}

/// Stand-in for budgets too large to represent as an instant.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Point in time after which a commit must not take effect.
///
/// Stores check it before their point of no return. A commit that has not
/// reached it by then is abandoned with [`StorageError::Timeout`]; one that
/// has already passed it completes and reports its real outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            at: now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE),
            budget,
        }
    }

    /// The instant the deadline falls on.
    pub fn at(&self) -> Instant {
        self.at
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Error reported for a commit abandoned at this deadline.
    pub fn timeout_error(&self) -> StorageError {
        StorageError::Timeout {
            after_ms: u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Ordered, all-or-nothing batch of mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit {
    mutations: Vec<Mutation>,
    deadline: Option<Deadline>,
}

impl Commit {
    /// Empty commit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit holding a single mutation.
    pub fn single(mutation: Mutation) -> Self {
        Self {
            mutations: vec![mutation],
            deadline: None,
        }
    }

    /// Append a mutation.
    pub fn with(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Bound when the commit may still take effect.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The commit's deadline, if any.
    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    /// Whether the commit carries a deadline that has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| deadline.expired())
    }

    /// Mutations in application order.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Whether the commit holds no mutations.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

enum Undo {
    RemoveRequest(RequestId),
    RestoreRequest(FriendRequest),
    RemoveEdge(PairKey),
    RestoreEdge(FriendshipEdge),
}

/// Typed request and edge records, with a pending-per-pair index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StateDocument", into = "StateDocument")]
pub struct SocialState {
    requests: BTreeMap<RequestId, FriendRequest>,
    pending: BTreeMap<PairKey, RequestId>,
    edges: BTreeMap<PairKey, FriendshipEdge>,
}

impl SocialState {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request by id, in any status.
    pub fn request(&self, id: &RequestId) -> Option<&FriendRequest> {
        self.requests.get(id)
    }

    /// All requests, pending and historical.
    pub fn requests(&self) -> impl Iterator<Item = &FriendRequest> {
        self.requests.values()
    }

    /// All edges.
    pub fn edges(&self) -> impl Iterator<Item = &FriendshipEdge> {
        self.edges.values()
    }

    /// The pending request between a pair, in either direction.
    pub fn pending_between(&self, pair: &PairKey) -> Option<&FriendRequest> {
        self.pending.get(pair).and_then(|id| self.requests.get(id))
    }

    /// The pending request exactly `from -> to`.
    pub fn pending_from_to(&self, from: &UserRef, to: &UserRef) -> Option<&FriendRequest> {
        let pair = PairKey::of(from, to).ok()?;
        self.pending_between(&pair)
            .filter(|request| request.is_between(from, to))
    }

    /// Edge for a pair.
    pub fn edge(&self, pair: &PairKey) -> Option<&FriendshipEdge> {
        self.edges.get(pair)
    }

    /// Whether an edge joins `a` and `b`. Always false for `a == b`.
    pub fn are_friends(&self, a: &UserRef, b: &UserRef) -> bool {
        PairKey::of(a, b)
            .map(|pair| self.edges.contains_key(&pair))
            .unwrap_or(false)
    }

    /// Users joined to `user` by an edge.
    pub fn friends_of(&self, user: &UserRef) -> BTreeSet<UserRef> {
        self.edges
            .values()
            .filter_map(|edge| edge.other(user).cloned())
            .collect()
    }

    /// Pending requests addressed to `user`, oldest first.
    pub fn incoming(&self, user: &UserRef) -> Vec<FriendRequest> {
        self.pending_where(|request| &request.to == user)
    }

    /// Pending requests sent by `user`, oldest first.
    pub fn outgoing(&self, user: &UserRef) -> Vec<FriendRequest> {
        self.pending_where(|request| &request.from == user)
    }

    /// Resolved requests involving `user`, oldest first.
    pub fn history(&self, user: &UserRef) -> Vec<FriendRequest> {
        let mut requests: Vec<FriendRequest> = self
            .requests
            .values()
            .filter(|request| request.status.is_terminal() && request.involves(user))
            .cloned()
            .collect();
        sort_requests(&mut requests);
        requests
    }

    /// Number of pending requests.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn pending_where(&self, keep: impl Fn(&FriendRequest) -> bool) -> Vec<FriendRequest> {
        let mut requests: Vec<FriendRequest> = self
            .pending
            .values()
            .filter_map(|id| self.requests.get(id))
            .filter(|request| keep(request))
            .cloned()
            .collect();
        sort_requests(&mut requests);
        requests
    }

    /// Apply a commit. On error nothing from the commit remains applied.
    pub fn apply(&mut self, commit: &Commit) -> Result<Vec<Applied>, SocialError> {
        let mut undo = Vec::new();
        let mut applied = Vec::with_capacity(commit.mutations().len());

        for mutation in commit.mutations() {
            match self.apply_one(mutation, &mut undo) {
                Ok(effect) => applied.push(effect),
                Err(err) => {
                    self.rollback(undo);
                    return Err(err);
                }
            }
        }

        Ok(applied)
    }

    fn apply_one(
        &mut self,
        mutation: &Mutation,
        undo: &mut Vec<Undo>,
    ) -> Result<Applied, SocialError> {
        match mutation {
            Mutation::InsertRequest(request) => {
                if !request.is_pending() {
                    return Err(SocialError::invalid(format!(
                        "new request {} must be pending, not {}",
                        request.id, request.status
                    )));
                }
                let pair = request.pair_key()?;
                if self.requests.contains_key(&request.id) {
                    return Err(SocialError::invalid(format!(
                        "request id {} already recorded",
                        request.id
                    )));
                }
                if self.edges.contains_key(&pair) {
                    return Err(SocialError::already_friends(&request.from, &request.to));
                }
                if self.pending.contains_key(&pair) {
                    return Err(SocialError::pending_exists(&request.from, &request.to));
                }

                self.pending.insert(pair, request.id);
                self.requests.insert(request.id, request.clone());
                undo.push(Undo::RemoveRequest(request.id));
                Ok(Applied::RequestInserted(request.id))
            }

            Mutation::ResolveRequest { id, status, at } => {
                if !status.is_terminal() {
                    return Err(SocialError::invalid(format!(
                        "cannot resolve request {id} to {status}"
                    )));
                }
                let previous = self.take_pending(id)?;
                let mut resolved = previous.clone();
                resolved.status = *status;
                resolved.resolved_at = Some(*at);
                self.requests.insert(*id, resolved);
                undo.push(Undo::RestoreRequest(previous));
                Ok(Applied::RequestResolved {
                    id: *id,
                    status: *status,
                })
            }

            Mutation::DeleteRequest(id) => {
                let previous = self.take_pending(id)?;
                self.requests.remove(id);
                undo.push(Undo::RestoreRequest(previous));
                Ok(Applied::RequestDeleted(*id))
            }

            Mutation::InsertEdge(edge) => {
                if self.edges.contains_key(&edge.pair) {
                    return Ok(Applied::EdgeInserted {
                        pair: edge.pair.clone(),
                        created: false,
                    });
                }
                self.edges.insert(edge.pair.clone(), edge.clone());
                undo.push(Undo::RemoveEdge(edge.pair.clone()));
                Ok(Applied::EdgeInserted {
                    pair: edge.pair.clone(),
                    created: true,
                })
            }

            Mutation::DeleteEdge(pair) => match self.edges.remove(pair) {
                Some(edge) => {
                    undo.push(Undo::RestoreEdge(edge));
                    Ok(Applied::EdgeDeleted(pair.clone()))
                }
                None => Err(SocialError::friendship_not_found(pair.low(), pair.high())),
            },

            Mutation::PurgeUser(user) => {
                let request_ids: Vec<RequestId> = self
                    .requests
                    .values()
                    .filter(|request| request.involves(user))
                    .map(|request| request.id)
                    .collect();
                for id in &request_ids {
                    if let Some(request) = self.requests.remove(id) {
                        if let Ok(pair) = request.pair_key() {
                            if self.pending.get(&pair) == Some(id) {
                                self.pending.remove(&pair);
                            }
                        }
                        undo.push(Undo::RestoreRequest(request));
                    }
                }

                let pairs: Vec<PairKey> = self
                    .edges
                    .keys()
                    .filter(|pair| pair.contains(user))
                    .cloned()
                    .collect();
                for pair in &pairs {
                    if let Some(edge) = self.edges.remove(pair) {
                        undo.push(Undo::RestoreEdge(edge));
                    }
                }

                Ok(Applied::UserPurged {
                    requests_removed: request_ids.len(),
                    edges_removed: pairs.len(),
                })
            }
        }
    }

    /// Detach a pending request from the pending index.
    fn take_pending(&mut self, id: &RequestId) -> Result<FriendRequest, SocialError> {
        let request = self
            .requests
            .get(id)
            .filter(|request| request.is_pending())
            .cloned()
            .ok_or(SocialError::NotFound(Missing::RequestId(*id)))?;
        let pair = request.pair_key()?;
        self.pending.remove(&pair);
        Ok(request)
    }

    fn rollback(&mut self, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            match step {
                Undo::RemoveRequest(id) => {
                    if let Some(request) = self.requests.remove(&id) {
                        if let Ok(pair) = request.pair_key() {
                            self.pending.remove(&pair);
                        }
                    }
                }
                Undo::RestoreRequest(request) => {
                    if request.is_pending() {
                        if let Ok(pair) = request.pair_key() {
                            self.pending.insert(pair, request.id);
                        }
                    }
                    self.requests.insert(request.id, request);
                }
                Undo::RemoveEdge(pair) => {
                    self.edges.remove(&pair);
                }
                Undo::RestoreEdge(edge) => {
                    self.edges.insert(edge.pair.clone(), edge);
                }
            }
        }
    }
}

fn sort_requests(requests: &mut [FriendRequest]) {
    requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

/// Persisted form of [`SocialState`]; the pending index is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateDocument {
    schema_version: u32,
    requests: Vec<FriendRequest>,
    edges: Vec<FriendshipEdge>,
}

impl From<SocialState> for StateDocument {
    fn from(state: SocialState) -> Self {
        Self {
            schema_version: SOCIAL_STATE_SCHEMA_VERSION,
            requests: state.requests.into_values().collect(),
            edges: state.edges.into_values().collect(),
        }
    }
}

impl TryFrom<StateDocument> for SocialState {
    type Error = String;

    fn try_from(document: StateDocument) -> Result<Self, Self::Error> {
        if document.schema_version != SOCIAL_STATE_SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema version {}",
                document.schema_version
            ));
        }

        let mut state = SocialState::new();
        for edge in document.edges {
            if state.edges.insert(edge.pair.clone(), edge).is_some() {
                return Err("duplicate friendship edge".to_string());
            }
        }
        for request in document.requests {
            let pair = request.pair_key().map_err(|err| err.to_string())?;
            if request.is_pending() {
                if state.edges.contains_key(&pair) {
                    return Err(format!("pending request {} between friends", request.id));
                }
                if state.pending.insert(pair, request.id).is_some() {
                    return Err(format!("second pending request {} for pair", request.id));
                }
            }
            if state.requests.insert(request.id, request).is_some() {
                return Err("duplicate request id".to_string());
            }
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn user(name: &str) -> UserRef {
        UserRef::new(name)
    }

    fn edge(a: &str, b: &str) -> FriendshipEdge {
        FriendshipEdge {
            pair: PairKey::new(user(a), user(b)).unwrap(),
            since: at(0),
            request_id: None,
        }
    }

    #[test]
    fn test_insert_request_blocks_reverse_direction() {
        let mut state = SocialState::new();
        let first = FriendRequest::pending(user("alice"), user("bob"), at(0)).unwrap();
        state
            .apply(&Commit::single(Mutation::InsertRequest(first)))
            .unwrap();

        let reverse = FriendRequest::pending(user("bob"), user("alice"), at(1)).unwrap();
        let err = state
            .apply(&Commit::single(Mutation::InsertRequest(reverse)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(state.pending_count(), 1);
    }

    #[test]
    fn test_failed_commit_rolls_back_earlier_mutations() {
        let mut state = SocialState::new();
        let request = FriendRequest::pending(user("alice"), user("bob"), at(0)).unwrap();
        let id = request.id;
        state
            .apply(&Commit::single(Mutation::InsertRequest(request)))
            .unwrap();

        // Resolve succeeds, edge insert succeeds, then deleting a missing
        // edge fails: all three must be undone.
        let commit = Commit::new()
            .with(Mutation::ResolveRequest {
                id,
                status: RequestStatus::Accepted,
                at: at(5),
            })
            .with(Mutation::InsertEdge(edge("alice", "bob")))
            .with(Mutation::DeleteEdge(
                PairKey::new(user("carol"), user("dave")).unwrap(),
            ));
        let before = state.clone();
        let err = state.apply(&commit).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(state, before);
        assert!(state.pending_from_to(&user("alice"), &user("bob")).is_some());
        assert!(!state.are_friends(&user("alice"), &user("bob")));
    }

    #[test]
    fn test_insert_edge_is_idempotent() {
        let mut state = SocialState::new();
        let effects = state
            .apply(
                &Commit::new()
                    .with(Mutation::InsertEdge(edge("alice", "bob")))
                    .with(Mutation::InsertEdge(edge("bob", "alice"))),
            )
            .unwrap();

        assert_eq!(state.edge_count(), 1);
        assert!(matches!(
            effects[1],
            Applied::EdgeInserted { created: false, .. }
        ));
    }

    #[test]
    fn test_purge_user_removes_requests_and_edges() {
        let mut state = SocialState::new();
        let pending = FriendRequest::pending(user("carol"), user("alice"), at(0)).unwrap();
        let unrelated = FriendRequest::pending(user("bob"), user("carol"), at(1)).unwrap();
        state
            .apply(
                &Commit::new()
                    .with(Mutation::InsertRequest(pending))
                    .with(Mutation::InsertRequest(unrelated))
                    .with(Mutation::InsertEdge(edge("alice", "bob"))),
            )
            .unwrap();

        let effects = state
            .apply(&Commit::single(Mutation::PurgeUser(user("alice"))))
            .unwrap();

        assert_eq!(
            effects,
            vec![Applied::UserPurged {
                requests_removed: 1,
                edges_removed: 1
            }]
        );
        assert_eq!(state.pending_count(), 1);
        assert!(state.friends_of(&user("bob")).is_empty());
    }

    #[test]
    fn test_state_document_roundtrip_rebuilds_pending_index() {
        let mut state = SocialState::new();
        let request = FriendRequest::pending(user("alice"), user("bob"), at(0)).unwrap();
        state
            .apply(
                &Commit::new()
                    .with(Mutation::InsertRequest(request))
                    .with(Mutation::InsertEdge(edge("carol", "dave"))),
            )
            .unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let restored: SocialState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, state);
        assert!(restored
            .pending_from_to(&user("alice"), &user("bob"))
            .is_some());
    }

    #[test]
    fn test_state_document_rejects_duplicate_pending() {
        let first = FriendRequest::pending(user("alice"), user("bob"), at(0)).unwrap();
        let second = FriendRequest::pending(user("bob"), user("alice"), at(1)).unwrap();
        let document = StateDocument {
            schema_version: SOCIAL_STATE_SCHEMA_VERSION,
            requests: vec![first, second],
            edges: Vec::new(),
        };
        let json = serde_json::to_string(&document).unwrap();

        assert!(serde_json::from_str::<SocialState>(&json).is_err());
    }
}
