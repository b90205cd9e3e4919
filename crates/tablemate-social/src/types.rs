//! Typed social records
//!
//! - `UserRef`, `RequestId`, `PairKey` - Identifiers
//! - `FriendRequest`, `RequestStatus` - Request ledger records
//! - `FriendshipEdge` - Friendship graph records

use crate::error::SocialError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, externally issued user identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(String);

impl UserRef {
    /// Wrap an identifier issued by the identity provider.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Unique friend request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical, order-independent key for an unordered pair of users.
///
/// `low < high` always holds, so `{a, b}` and `{b, a}` map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "PairKeyRepr", into = "PairKeyRepr")]
pub struct PairKey {
    low: UserRef,
    high: UserRef,
}

#[derive(Serialize, Deserialize)]
struct PairKeyRepr {
    low: UserRef,
    high: UserRef,
}

impl PairKey {
    /// Build the key for `{a, b}`. Fails for `a == b`.
    pub fn new(a: UserRef, b: UserRef) -> Result<Self, SocialError> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Ok(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => Err(SocialError::self_target(&a)),
        }
    }

    /// Build the key from borrowed refs.
    pub fn of(a: &UserRef, b: &UserRef) -> Result<Self, SocialError> {
        Self::new(a.clone(), b.clone())
    }

    /// Smaller endpoint.
    pub fn low(&self) -> &UserRef {
        &self.low
    }

    /// Larger endpoint.
    pub fn high(&self) -> &UserRef {
        &self.high
    }

    /// Whether `user` is one of the endpoints.
    pub fn contains(&self, user: &UserRef) -> bool {
        &self.low == user || &self.high == user
    }

    /// The endpoint opposite `user`, if `user` is an endpoint.
    pub fn other(&self, user: &UserRef) -> Option<&UserRef> {
        if &self.low == user {
            Some(&self.high)
        } else if &self.high == user {
            Some(&self.low)
        } else {
            None
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.low, self.high)
    }
}

impl TryFrom<PairKeyRepr> for PairKey {
    type Error = String;

    fn try_from(repr: PairKeyRepr) -> Result<Self, Self::Error> {
        if repr.low < repr.high {
            Ok(Self {
                low: repr.low,
                high: repr.high,
            })
        } else {
            Err(format!(
                "pair key endpoints out of order: {} >= {}",
                repr.low, repr.high
            ))
        }
    }
}

impl From<PairKey> for PairKeyRepr {
    fn from(key: PairKey) -> Self {
        Self {
            low: key.low,
            high: key.high,
        }
    }
}

/// Friend request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Awaiting the recipient's decision
    Pending,
    /// Accepted by the recipient; an edge exists or existed
    Accepted,
    /// Rejected by the recipient
    Rejected,
}

impl RequestStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A friend request record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    /// Unique request identifier
    pub id: RequestId,
    /// Sender
    pub from: UserRef,
    /// Recipient
    pub to: UserRef,
    /// Lifecycle status
    pub status: RequestStatus,
    /// Creation time, immutable
    pub created_at: DateTime<Utc>,
    /// When the request reached a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl FriendRequest {
    /// Create a pending request `from -> to`.
    pub fn pending(
        from: UserRef,
        to: UserRef,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SocialError> {
        if from == to {
            return Err(SocialError::self_target(&from));
        }
        Ok(Self {
            id: RequestId::new(),
            from,
            to,
            status: RequestStatus::Pending,
            created_at,
            resolved_at: None,
        })
    }

    /// Check if the request is pending.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, RequestStatus::Pending)
    }

    /// Whether `user` is the sender or the recipient.
    pub fn involves(&self, user: &UserRef) -> bool {
        &self.from == user || &self.to == user
    }

    /// Whether this is exactly the directed request `from -> to`.
    pub fn is_between(&self, from: &UserRef, to: &UserRef) -> bool {
        &self.from == from && &self.to == to
    }

    /// Canonical key for the request's pair.
    pub fn pair_key(&self) -> Result<PairKey, SocialError> {
        PairKey::of(&self.from, &self.to)
    }
}

/// A confirmed, symmetric friendship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendshipEdge {
    /// Canonical endpoints
    pub pair: PairKey,
    /// When the friendship was confirmed
    pub since: DateTime<Utc>,
    /// Request whose acceptance created this edge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl FriendshipEdge {
    /// Whether `user` is an endpoint.
    pub fn involves(&self, user: &UserRef) -> bool {
        self.pair.contains(user)
    }

    /// The friend of `user` on this edge.
    pub fn other(&self, user: &UserRef) -> Option<&UserRef> {
        self.pair.other(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_pair_key_is_order_independent() {
        let ab = PairKey::new("alice".into(), "bob".into()).unwrap();
        let ba = PairKey::new("bob".into(), "alice".into()).unwrap();

        assert_eq!(ab, ba);
        assert_eq!(ab.low().as_str(), "alice");
        assert_eq!(ab.high().as_str(), "bob");
        assert_eq!(ab.other(&"alice".into()), Some(&UserRef::new("bob")));
        assert_eq!(ab.other(&"carol".into()), None);
    }

    #[test]
    fn test_pair_key_rejects_self_pair() {
        let err = PairKey::new("alice".into(), "alice".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_pair_key_deserialize_validates_order() {
        let ok: PairKey = serde_json::from_str(r#"{"low":"a","high":"b"}"#).unwrap();
        assert_eq!(ok.low().as_str(), "a");

        assert!(serde_json::from_str::<PairKey>(r#"{"low":"b","high":"a"}"#).is_err());
        assert!(serde_json::from_str::<PairKey>(r#"{"low":"a","high":"a"}"#).is_err());
    }

    #[test]
    fn test_pending_request_rejects_self() {
        let err = FriendRequest::pending("alice".into(), "alice".into(), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_request_status_serializes_lowercase() {
        let json = serde_json::to_string(&RequestStatus::Accepted).unwrap();
        assert_eq!(json, "\"accepted\"");
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
    }
}
