//! Property tests over arbitrary command sequences.
//!
//! Random sequences of ledger and graph commands are replayed against the
//! service and a simple reference model; after every step the service must
//! agree with the model and the graph invariants must hold.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tablemate_social::{ErrorKind, FriendService, MemoryUserDirectory, UserRef};

const USERS: u8 = 5;

#[derive(Debug, Clone)]
enum Command {
    Send(u8, u8),
    Withdraw(u8, u8),
    Accept(u8, u8),
    Reject(u8, u8),
    Unfriend(u8, u8),
}

fn arb_command() -> impl Strategy<Value = Command> {
    let user = 0..USERS;
    (0u8..5, user.clone(), user).prop_map(|(op, a, b)| match op {
        0 => Command::Send(a, b),
        1 => Command::Withdraw(a, b),
        2 => Command::Accept(a, b),
        3 => Command::Reject(a, b),
        _ => Command::Unfriend(a, b),
    })
}

fn user(n: u8) -> UserRef {
    UserRef::new(format!("user-{n}"))
}

fn unordered(a: u8, b: u8) -> (u8, u8) {
    (a.min(b), a.max(b))
}

/// Reference model: pending requests keyed by unordered pair, plus edges.
#[derive(Default)]
struct Model {
    pending: BTreeMap<(u8, u8), (u8, u8)>,
    edges: BTreeSet<(u8, u8)>,
}

impl Model {
    fn expect(&mut self, command: &Command) -> Result<(), ErrorKind> {
        match *command {
            Command::Send(a, b) => {
                if a == b {
                    return Err(ErrorKind::InvalidOperation);
                }
                let key = unordered(a, b);
                if self.edges.contains(&key) || self.pending.contains_key(&key) {
                    return Err(ErrorKind::Conflict);
                }
                self.pending.insert(key, (a, b));
                Ok(())
            }
            Command::Withdraw(a, b) | Command::Reject(a, b) => {
                if a == b {
                    return Err(ErrorKind::InvalidOperation);
                }
                let key = unordered(a, b);
                if self.pending.get(&key) != Some(&(a, b)) {
                    return Err(ErrorKind::NotFound);
                }
                self.pending.remove(&key);
                Ok(())
            }
            Command::Accept(a, b) => {
                if a == b {
                    return Err(ErrorKind::InvalidOperation);
                }
                let key = unordered(a, b);
                if self.pending.get(&key) != Some(&(a, b)) {
                    return Err(ErrorKind::NotFound);
                }
                self.pending.remove(&key);
                self.edges.insert(key);
                Ok(())
            }
            Command::Unfriend(a, b) => {
                if a == b {
                    return Err(ErrorKind::InvalidOperation);
                }
                if !self.edges.remove(&unordered(a, b)) {
                    return Err(ErrorKind::NotFound);
                }
                Ok(())
            }
        }
    }
}

async fn run(service: &FriendService, command: &Command) -> Result<(), ErrorKind> {
    let outcome = match *command {
        Command::Send(a, b) => service.send_request(&user(a), &user(b)).await.map(|_| ()),
        Command::Withdraw(a, b) => service.remove_request(&user(a), &user(b)).await,
        Command::Accept(a, b) => service.accept_request(&user(a), &user(b)).await.map(|_| ()),
        Command::Reject(a, b) => service.reject_request(&user(a), &user(b)).await,
        Command::Unfriend(a, b) => service.remove_friend(&user(a), &user(b)).await,
    };
    outcome.map_err(|err| err.kind())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// The service agrees with the reference model on every outcome, and
    /// friendship stays symmetric and irreflexive.
    #[test]
    fn commands_match_reference_model(commands in prop::collection::vec(arb_command(), 1..60)) {
        let rt = runtime();
        rt.block_on(async {
            let service = FriendService::in_memory(Arc::new(MemoryUserDirectory::new()));
            let mut model = Model::default();

            for command in &commands {
                let expected = model.expect(command);
                let actual = run(&service, command).await;
                prop_assert_eq!(actual, expected, "command {:?}", command);
            }

            for a in 0..USERS {
                let friends = service.get_friends(&user(a)).await.unwrap();
                prop_assert!(!friends.contains(&user(a)));
                for b in 0..USERS {
                    let ab = service.are_friends(&user(a), &user(b)).await.unwrap();
                    let ba = service.are_friends(&user(b), &user(a)).await.unwrap();
                    prop_assert_eq!(ab, ba);
                    prop_assert_eq!(ab, a != b && model.edges.contains(&unordered(a, b)));
                    prop_assert_eq!(friends.contains(&user(b)), ab);
                }

                let incoming = service.get_requests(&user(a)).await.unwrap();
                let expected_incoming = model.pending.values().filter(|(_, to)| *to == a).count();
                prop_assert_eq!(incoming.len(), expected_incoming);
            }
            Ok(())
        })?;
    }

    /// Self-targeted requests are always refused.
    #[test]
    fn self_request_is_invalid(n in 0u8..=u8::MAX) {
        let rt = runtime();
        let kind = rt.block_on(async {
            let service = FriendService::in_memory(Arc::new(MemoryUserDirectory::new()));
            service.send_request(&user(n), &user(n)).await.map_err(|err| err.kind())
        });
        prop_assert_eq!(kind, Err(ErrorKind::InvalidOperation));
    }

    /// A second request for a pending pair conflicts in either direction.
    #[test]
    fn second_request_conflicts(a in 0u8..20, b in 0u8..20, reverse in any::<bool>()) {
        prop_assume!(a != b);
        let rt = runtime();
        let second = rt.block_on(async {
            let service = FriendService::in_memory(Arc::new(MemoryUserDirectory::new()));
            service.send_request(&user(a), &user(b)).await.unwrap();
            let (from, to) = if reverse { (b, a) } else { (a, b) };
            service.send_request(&user(from), &user(to)).await.map_err(|err| err.kind())
        });
        prop_assert_eq!(second, Err(ErrorKind::Conflict));
    }
}
