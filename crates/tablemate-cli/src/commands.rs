//! Friend commands run on behalf of one caller

use crate::Result;
use clap::Subcommand;
use serde::Serialize;
use tablemate_social::{
    FriendService, PurgeSummary, RequestId, RequestView, UserDirectory, UserRef,
};

/// Commands available to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List your friends
    Friends,

    /// End a friendship
    Unfriend {
        /// Handle of the friend
        handle: String,
    },

    /// List requests awaiting your decision
    Requests,

    /// List requests you have sent
    Sent,

    /// Send a friend request
    Request {
        /// Handle of the recipient
        handle: String,
    },

    /// Withdraw a request you sent
    Withdraw {
        /// Handle of the recipient
        handle: String,
    },

    /// Accept a request sent to you
    Accept {
        /// Handle of the sender
        handle: String,
    },

    /// Reject a request sent to you
    Reject {
        /// Handle of the sender
        handle: String,
    },

    /// Show accepted and rejected requests involving you
    History,

    /// Remove every request and friendship of a deleted user
    Forget {
        /// Handle of the deleted user
        handle: String,
    },
}

/// Result of a command, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Friend list
    Friends {
        /// Friend handles, sorted
        friends: Vec<String>,
    },
    /// Incoming, outgoing or resolved requests
    Requests {
        /// Requests, oldest first
        requests: Vec<RequestView>,
    },
    /// New pending request
    RequestSent {
        /// Recipient handle
        to: String,
        /// Id of the new request
        id: RequestId,
    },
    /// Pending request deleted by its sender
    RequestWithdrawn {
        /// Recipient handle
        to: String,
    },
    /// Request accepted, friendship created
    RequestAccepted {
        /// Sender handle
        from: String,
    },
    /// Request rejected
    RequestRejected {
        /// Sender handle
        from: String,
    },
    /// Friendship removed
    Unfriended {
        /// Former friend's handle
        handle: String,
    },
    /// User purged
    Forgotten {
        /// Handle of the purged user
        handle: String,
        /// What was removed
        summary: PurgeSummary,
    },
}

/// Run `command` as `caller`.
pub async fn run_command(
    service: &FriendService,
    directory: &dyn UserDirectory,
    caller: &UserRef,
    command: Command,
) -> Result<Outcome> {
    tracing::debug!(%caller, ?command, "running command");
    let outcome = match command {
        Command::Friends => Outcome::Friends {
            friends: service.friend_handles(caller).await?,
        },
        Command::Requests => Outcome::Requests {
            requests: service.incoming_request_views(caller).await?,
        },
        Command::Sent => Outcome::Requests {
            requests: service.outgoing_request_views(caller).await?,
        },
        Command::History => Outcome::Requests {
            requests: service.history_views(caller).await?,
        },
        Command::Request { handle } => {
            let id = service.send_request_to(caller, &handle).await?;
            Outcome::RequestSent { to: handle, id }
        }
        Command::Withdraw { handle } => {
            service.withdraw_request_to(caller, &handle).await?;
            Outcome::RequestWithdrawn { to: handle }
        }
        Command::Accept { handle } => {
            service.accept_request_from(caller, &handle).await?;
            Outcome::RequestAccepted { from: handle }
        }
        Command::Reject { handle } => {
            service.reject_request_from(caller, &handle).await?;
            Outcome::RequestRejected { from: handle }
        }
        Command::Unfriend { handle } => {
            service.remove_friend_named(caller, &handle).await?;
            Outcome::Unfriended { handle }
        }
        Command::Forget { handle } => {
            let user = directory.resolve(&handle).await?;
            let summary = service.forget_user(&user).await?;
            Outcome::Forgotten { handle, summary }
        }
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CliError;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use tablemate_social::{ErrorKind, MemoryUserDirectory};

    struct Fixture {
        service: FriendService,
        directory: Arc<MemoryUserDirectory>,
        alice: UserRef,
        bob: UserRef,
    }

    fn fixture() -> Fixture {
        let alice = UserRef::new("u-1");
        let bob = UserRef::new("u-2");
        let directory = Arc::new(MemoryUserDirectory::from_entries([
            ("alice", alice.clone()),
            ("bob", bob.clone()),
        ]));
        Fixture {
            service: FriendService::in_memory(directory.clone()),
            directory,
            alice,
            bob,
        }
    }

    async fn run(fx: &Fixture, caller: &UserRef, command: Command) -> Result<Outcome> {
        run_command(&fx.service, fx.directory.as_ref(), caller, command).await
    }

    #[tokio::test]
    async fn test_request_then_accept_makes_friends() {
        let fx = fixture();
        let request = Command::Request {
            handle: "bob".to_string(),
        };
        assert_matches!(
            run(&fx, &fx.alice, request).await,
            Ok(Outcome::RequestSent { ref to, .. }) if to == "bob"
        );

        let pending = run(&fx, &fx.bob, Command::Requests).await.unwrap();
        assert_matches!(pending, Outcome::Requests { ref requests } if requests.len() == 1);

        let accept = Command::Accept {
            handle: "alice".to_string(),
        };
        run(&fx, &fx.bob, accept).await.unwrap();
        assert_eq!(
            run(&fx, &fx.alice, Command::Friends).await.unwrap(),
            Outcome::Friends {
                friends: vec!["bob".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_forget_clears_friendships() {
        let fx = fixture();
        fx.service.send_request(&fx.alice, &fx.bob).await.unwrap();
        fx.service.accept_request(&fx.alice, &fx.bob).await.unwrap();

        let forget = Command::Forget {
            handle: "alice".to_string(),
        };
        let outcome = run(&fx, &fx.bob, forget).await.unwrap();
        assert_matches!(
            outcome,
            Outcome::Forgotten { ref summary, .. } if summary.edges_removed == 1
        );
        assert!(fx.service.get_friends(&fx.bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_social_errors_pass_through() {
        let fx = fixture();
        let unfriend = Command::Unfriend {
            handle: "bob".to_string(),
        };
        assert_matches!(
            run(&fx, &fx.alice, unfriend).await,
            Err(CliError::Social(err)) if err.kind() == ErrorKind::NotFound
        );
    }
}
