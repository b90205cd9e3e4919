//! Friend service
//!
//! Facade the surrounding service layer talks to. It composes the
//! [`RequestLedger`] and the [`FriendshipGraph`] over one store and adds:
//!
//! - Handle-based commands, resolved through a [`UserDirectory`]
//! - Handle-rendered views of requests and friends
//! - Cascading removal of a deleted identity
//!
//! The caller identity passed to every command has already been validated by
//! the identity provider.

use crate::config::SocialConfig;
use crate::context::SocialContext;
use crate::directory::UserDirectory;
use crate::error::SocialError;
use crate::graph::FriendshipGraph;
use crate::ledger::RequestLedger;
use crate::store::{Applied, Commit, FriendStore, MemoryFriendStore, Mutation};
use crate::time::{Clock, SystemClock};
use crate::types::{FriendRequest, FriendshipEdge, RequestId, RequestStatus, UserRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Friend request rendered with handles instead of refs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestView {
    /// Request identifier
    pub id: RequestId,
    /// Sender handle
    pub from: String,
    /// Recipient handle
    pub to: String,
    /// Lifecycle status
    pub status: RequestStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Outcome of removing every trace of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeSummary {
    /// Pending and historical requests removed
    pub requests_removed: usize,
    /// Friendships removed
    pub edges_removed: usize,
}

/// Friend request and friendship service.
#[derive(Clone)]
pub struct FriendService {
    ctx: Arc<SocialContext>,
    ledger: RequestLedger,
    graph: FriendshipGraph,
    directory: Arc<dyn UserDirectory>,
}

impl FriendService {
    /// Create a service over `store`, stamping records with the system clock.
    pub fn new(
        store: Arc<dyn FriendStore>,
        directory: Arc<dyn UserDirectory>,
        config: SocialConfig,
    ) -> Self {
        Self::with_clock(store, directory, Arc::new(SystemClock), config)
    }

    /// Create a service with an explicit clock.
    pub fn with_clock(
        store: Arc<dyn FriendStore>,
        directory: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
        config: SocialConfig,
    ) -> Self {
        let ctx = Arc::new(SocialContext::new(store, clock, &config));
        let graph = FriendshipGraph::new(ctx.clone());
        let ledger = RequestLedger::new(ctx.clone(), graph.clone());
        Self {
            ctx,
            ledger,
            graph,
            directory,
        }
    }

    /// Service over a fresh in-memory store with default configuration.
    pub fn in_memory(directory: Arc<dyn UserDirectory>) -> Self {
        Self::new(
            Arc::new(MemoryFriendStore::new()),
            directory,
            SocialConfig::default(),
        )
    }

    /// The request ledger.
    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    /// The friendship graph.
    pub fn graph(&self) -> &FriendshipGraph {
        &self.graph
    }

    // ---------------------------------------------------------------------
    // Ledger operations
    // ---------------------------------------------------------------------

    /// See [`RequestLedger::send_request`].
    pub async fn send_request(
        &self,
        from: &UserRef,
        to: &UserRef,
    ) -> Result<RequestId, SocialError> {
        self.ledger.send_request(from, to).await
    }

    /// See [`RequestLedger::remove_request`].
    pub async fn remove_request(&self, from: &UserRef, to: &UserRef) -> Result<(), SocialError> {
        self.ledger.remove_request(from, to).await
    }

    /// See [`RequestLedger::accept_request`].
    pub async fn accept_request(
        &self,
        from: &UserRef,
        to: &UserRef,
    ) -> Result<FriendshipEdge, SocialError> {
        self.ledger.accept_request(from, to).await
    }

    /// See [`RequestLedger::reject_request`].
    pub async fn reject_request(&self, from: &UserRef, to: &UserRef) -> Result<(), SocialError> {
        self.ledger.reject_request(from, to).await
    }

    /// See [`RequestLedger::get_requests`].
    pub async fn get_requests(&self, user: &UserRef) -> Result<Vec<FriendRequest>, SocialError> {
        self.ledger.get_requests(user).await
    }

    // ---------------------------------------------------------------------
    // Graph operations
    // ---------------------------------------------------------------------

    /// See [`FriendshipGraph::remove_friend`].
    pub async fn remove_friend(&self, user: &UserRef, other: &UserRef) -> Result<(), SocialError> {
        self.graph.remove_friend(user, other).await
    }

    /// See [`FriendshipGraph::get_friends`].
    pub async fn get_friends(&self, user: &UserRef) -> Result<BTreeSet<UserRef>, SocialError> {
        self.graph.get_friends(user).await
    }

    /// See [`FriendshipGraph::are_friends`].
    pub async fn are_friends(&self, a: &UserRef, b: &UserRef) -> Result<bool, SocialError> {
        self.graph.are_friends(a, b).await
    }

    // ---------------------------------------------------------------------
    // Handle-based commands
    // ---------------------------------------------------------------------

    /// `caller` sends a request to the user named `handle`.
    pub async fn send_request_to(
        &self,
        caller: &UserRef,
        handle: &str,
    ) -> Result<RequestId, SocialError> {
        let to = self.directory.resolve(handle).await?;
        self.ledger.send_request(caller, &to).await
    }

    /// `caller` withdraws their request to the user named `handle`.
    pub async fn withdraw_request_to(
        &self,
        caller: &UserRef,
        handle: &str,
    ) -> Result<(), SocialError> {
        let to = self.directory.resolve(handle).await?;
        self.ledger.remove_request(caller, &to).await
    }

    /// `caller` accepts the request from the user named `handle`.
    pub async fn accept_request_from(
        &self,
        caller: &UserRef,
        handle: &str,
    ) -> Result<FriendshipEdge, SocialError> {
        let from = self.directory.resolve(handle).await?;
        self.ledger.accept_request(&from, caller).await
    }

    /// `caller` rejects the request from the user named `handle`.
    pub async fn reject_request_from(
        &self,
        caller: &UserRef,
        handle: &str,
    ) -> Result<(), SocialError> {
        let from = self.directory.resolve(handle).await?;
        self.ledger.reject_request(&from, caller).await
    }

    /// `caller` ends the friendship with the user named `handle`.
    pub async fn remove_friend_named(
        &self,
        caller: &UserRef,
        handle: &str,
    ) -> Result<(), SocialError> {
        let other = self.directory.resolve(handle).await?;
        self.graph.remove_friend(caller, &other).await
    }

    /// Handles of `caller`'s friends, sorted.
    pub async fn friend_handles(&self, caller: &UserRef) -> Result<Vec<String>, SocialError> {
        let friends = self.graph.get_friends(caller).await?;
        let mut handles = Vec::with_capacity(friends.len());
        for friend in &friends {
            handles.push(self.display_name(friend).await?);
        }
        handles.sort();
        Ok(handles)
    }

    /// Requests awaiting `caller`'s decision, rendered with handles.
    pub async fn incoming_request_views(
        &self,
        caller: &UserRef,
    ) -> Result<Vec<RequestView>, SocialError> {
        let requests = self.ledger.get_requests(caller).await?;
        self.views(requests).await
    }

    /// Requests `caller` has sent, rendered with handles.
    pub async fn outgoing_request_views(
        &self,
        caller: &UserRef,
    ) -> Result<Vec<RequestView>, SocialError> {
        let requests = self.ledger.get_sent_requests(caller).await?;
        self.views(requests).await
    }

    /// Resolved requests involving `caller`, rendered with handles.
    pub async fn history_views(&self, caller: &UserRef) -> Result<Vec<RequestView>, SocialError> {
        let requests = self.ledger.request_history(caller).await?;
        self.views(requests).await
    }

    // ---------------------------------------------------------------------
    // Identity lifecycle
    // ---------------------------------------------------------------------

    /// Remove every request and friendship referencing `user`, in one commit.
    /// Called when the identity system deletes the user.
    pub async fn forget_user(&self, user: &UserRef) -> Result<PurgeSummary, SocialError> {
        let applied = self
            .ctx
            .commit(Commit::single(Mutation::PurgeUser(user.clone())))
            .await?;

        let summary = applied
            .iter()
            .find_map(|effect| match effect {
                Applied::UserPurged {
                    requests_removed,
                    edges_removed,
                } => Some(PurgeSummary {
                    requests_removed: *requests_removed,
                    edges_removed: *edges_removed,
                }),
                _ => None,
            })
            .unwrap_or_default();

        tracing::info!(
            %user,
            requests_removed = summary.requests_removed,
            edges_removed = summary.edges_removed,
            "user purged from social graph"
        );
        Ok(summary)
    }

    async fn views(&self, requests: Vec<FriendRequest>) -> Result<Vec<RequestView>, SocialError> {
        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            views.push(RequestView {
                id: request.id,
                from: self.display_name(&request.from).await?,
                to: self.display_name(&request.to).await?,
                status: request.status,
                created_at: request.created_at,
            });
        }
        Ok(views)
    }

    /// Handle for `user`, falling back to the raw ref for unregistered users.
    async fn display_name(&self, user: &UserRef) -> Result<String, SocialError> {
        Ok(self
            .directory
            .handle_of(user)
            .await?
            .unwrap_or_else(|| user.to_string()))
    }
}
