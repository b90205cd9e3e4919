//! Friendship graph
//!
//! Symmetric edge set over [`UserRef`]s, one canonical edge per unordered
//! pair. Edges are created only by an accepted friend request (see
//! [`RequestLedger::accept_request`](crate::ledger::RequestLedger::accept_request))
//! and removed by [`FriendshipGraph::remove_friend`] or a user purge.

use crate::context::SocialContext;
use crate::error::SocialError;
use crate::store::{Commit, Mutation};
use crate::types::{FriendshipEdge, PairKey, RequestId, UserRef};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Edge store operations and membership queries.
#[derive(Clone)]
pub struct FriendshipGraph {
    ctx: Arc<SocialContext>,
}

impl FriendshipGraph {
    pub(crate) fn new(ctx: Arc<SocialContext>) -> Self {
        Self { ctx }
    }

    /// Edge insert for `pair`, for inclusion in the accepting commit. Applying
    /// it when the edge already exists is a no-op.
    pub(crate) fn create_edge(
        pair: PairKey,
        since: DateTime<Utc>,
        request_id: Option<RequestId>,
    ) -> Mutation {
        Mutation::InsertEdge(FriendshipEdge {
            pair,
            since,
            request_id,
        })
    }

    /// Delete the friendship between `user` and `other`. Symmetric.
    pub async fn remove_friend(&self, user: &UserRef, other: &UserRef) -> Result<(), SocialError> {
        let pair = PairKey::of(user, other)?;
        let _guard = self.ctx.locks.lock(&pair).await;

        self.ctx
            .commit(Commit::single(Mutation::DeleteEdge(pair)))
            .await
            .map_err(|err| match err {
                SocialError::NotFound(_) => SocialError::friendship_not_found(user, other),
                err => err,
            })?;

        tracing::info!(%user, friend = %other, "friendship removed");
        Ok(())
    }

    /// Users connected to `user`. Never contains `user` itself.
    pub async fn get_friends(&self, user: &UserRef) -> Result<BTreeSet<UserRef>, SocialError> {
        let snapshot = self.ctx.snapshot().await?;
        Ok(snapshot.friends_of(user))
    }

    /// Edges touching `user`, with their creation details.
    pub async fn friendships(&self, user: &UserRef) -> Result<Vec<FriendshipEdge>, SocialError> {
        let snapshot = self.ctx.snapshot().await?;
        Ok(snapshot
            .edges()
            .filter(|edge| edge.involves(user))
            .cloned()
            .collect())
    }

    /// Whether `a` and `b` are friends. False for `a == b`.
    pub async fn are_friends(&self, a: &UserRef, b: &UserRef) -> Result<bool, SocialError> {
        let snapshot = self.ctx.snapshot().await?;
        Ok(snapshot.are_friends(a, b))
    }
}
