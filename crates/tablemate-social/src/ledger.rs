//! Friend request ledger
//!
//! Owns the request lifecycle:
//!
//! ```text
//! send_request ──▶ pending ──accept_request──▶ accepted (+ edge)
//!                    │  └────reject_request──▶ rejected
//!                    └──remove_request──▶ deleted
//! ```
//!
//! Only the recipient accepts or rejects, only the sender withdraws. At most
//! one pending request exists per unordered pair, in either direction.
//! Accepted and rejected requests stay on record as history.

use crate::context::SocialContext;
use crate::error::SocialError;
use crate::graph::FriendshipGraph;
use crate::store::{Applied, Commit, Mutation};
use crate::types::{FriendRequest, FriendshipEdge, PairKey, RequestId, RequestStatus, UserRef};
use std::sync::Arc;

/// Friend request workflow commands and queries.
#[derive(Clone)]
pub struct RequestLedger {
    ctx: Arc<SocialContext>,
    graph: FriendshipGraph,
}

impl RequestLedger {
    pub(crate) fn new(ctx: Arc<SocialContext>, graph: FriendshipGraph) -> Self {
        Self { ctx, graph }
    }

    /// Send a friend request `from -> to`.
    ///
    /// Fails with `InvalidOperation` for `from == to`, and with `Conflict` if
    /// the pair are already friends or a pending request exists between them
    /// in either direction.
    pub async fn send_request(
        &self,
        from: &UserRef,
        to: &UserRef,
    ) -> Result<RequestId, SocialError> {
        let pair = PairKey::of(from, to)?;
        let _guard = self.ctx.locks.lock(&pair).await;

        if self.graph.are_friends(from, to).await? {
            return Err(SocialError::already_friends(from, to));
        }
        let snapshot = self.ctx.snapshot().await?;
        if snapshot.pending_between(&pair).is_some() {
            return Err(SocialError::pending_exists(from, to));
        }

        let request = FriendRequest::pending(from.clone(), to.clone(), self.ctx.clock.now())?;
        let id = request.id;
        self.ctx
            .commit(Commit::single(Mutation::InsertRequest(request)))
            .await?;

        tracing::info!(%from, %to, request_id = %id, "friend request sent");
        Ok(id)
    }

    /// Withdraw the pending request `from -> to`. Direction-sensitive: only
    /// the sender's own request matches.
    pub async fn remove_request(&self, from: &UserRef, to: &UserRef) -> Result<(), SocialError> {
        let pair = PairKey::of(from, to)?;
        let _guard = self.ctx.locks.lock(&pair).await;

        let id = self.pending_id(from, to).await?;
        self.ctx
            .commit(Commit::single(Mutation::DeleteRequest(id)))
            .await?;

        tracing::info!(%from, %to, request_id = %id, "friend request withdrawn");
        Ok(())
    }

    /// Accept the pending request `from -> to` on behalf of `to`.
    ///
    /// Resolves the request and creates the friendship in one commit.
    pub async fn accept_request(
        &self,
        from: &UserRef,
        to: &UserRef,
    ) -> Result<FriendshipEdge, SocialError> {
        let pair = PairKey::of(from, to)?;
        let _guard = self.ctx.locks.lock(&pair).await;

        let id = self.pending_id(from, to).await?;
        let now = self.ctx.clock.now();
        let commit = Commit::new()
            .with(Mutation::ResolveRequest {
                id,
                status: RequestStatus::Accepted,
                at: now,
            })
            .with(FriendshipGraph::create_edge(pair.clone(), now, Some(id)));
        let applied = self.ctx.commit(commit).await?;

        let created = applied
            .iter()
            .any(|effect| matches!(effect, Applied::EdgeInserted { created: true, .. }));
        let edge = if created {
            FriendshipEdge {
                pair,
                since: now,
                request_id: Some(id),
            }
        } else {
            tracing::debug!(%from, %to, "friendship already present at accept");
            self.ctx
                .snapshot()
                .await?
                .edge(&pair)
                .cloned()
                .ok_or_else(|| SocialError::friendship_not_found(from, to))?
        };

        tracing::info!(%from, %to, request_id = %id, "friend request accepted");
        Ok(edge)
    }

    /// Reject the pending request `from -> to` on behalf of `to`.
    pub async fn reject_request(&self, from: &UserRef, to: &UserRef) -> Result<(), SocialError> {
        let pair = PairKey::of(from, to)?;
        let _guard = self.ctx.locks.lock(&pair).await;

        let id = self.pending_id(from, to).await?;
        self.ctx
            .commit(Commit::single(Mutation::ResolveRequest {
                id,
                status: RequestStatus::Rejected,
                at: self.ctx.clock.now(),
            }))
            .await?;

        tracing::info!(%from, %to, request_id = %id, "friend request rejected");
        Ok(())
    }

    /// Pending requests awaiting `user`'s decision, oldest first.
    pub async fn get_requests(&self, user: &UserRef) -> Result<Vec<FriendRequest>, SocialError> {
        Ok(self.ctx.snapshot().await?.incoming(user))
    }

    /// Pending requests `user` has sent and may still withdraw, oldest first.
    pub async fn get_sent_requests(
        &self,
        user: &UserRef,
    ) -> Result<Vec<FriendRequest>, SocialError> {
        Ok(self.ctx.snapshot().await?.outgoing(user))
    }

    /// Accepted and rejected requests involving `user`, oldest first.
    pub async fn request_history(
        &self,
        user: &UserRef,
    ) -> Result<Vec<FriendRequest>, SocialError> {
        Ok(self.ctx.snapshot().await?.history(user))
    }

    async fn pending_id(&self, from: &UserRef, to: &UserRef) -> Result<RequestId, SocialError> {
        self.ctx
            .snapshot()
            .await?
            .pending_from_to(from, to)
            .map(|request| request.id)
            .ok_or_else(|| SocialError::request_not_found(from, to))
    }
}
