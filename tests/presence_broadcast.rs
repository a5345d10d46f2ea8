mod common;

use common::{drain, Harness};
use heistline::server::{ClientEvent, ServerEvent};

fn last_online(events: &[ServerEvent]) -> Option<Vec<String>> {
    events.iter().rev().find_map(|ev| match ev {
        ServerEvent::OnlinePlayers { players } => Some(players.clone()),
        _ => None,
    })
}

#[tokio::test]
async fn register_sends_init_then_online_players() {
    let h = Harness::new(100);
    let (mut session, mut rx) = h.server.connect(Some("127.0.0.1:4000".into()));
    h.server
        .handle_event(
            &mut session,
            ClientEvent::Register {
                account_key: "acct-alice".into(),
                display_name: "Alice".into(),
            },
        )
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    match &events[0] {
        ServerEvent::Init {
            profile,
            locations,
            travel_costs,
        } => {
            assert_eq!(profile.display_name, "Alice");
            assert_eq!(profile.balance, 0);
            assert_eq!(profile.health, 100);
            assert_eq!(locations.len(), 5);
            assert!(locations.contains(&profile.location));
            assert_eq!(travel_costs.get("Paris"), Some(&60));
            assert_eq!(travel_costs.get("Tokyo"), Some(&150));
        }
        other => panic!("expected init, got {other:?}"),
    }
    assert_eq!(last_online(&events), Some(vec!["Alice".to_string()]));
    assert!(session.is_registered());
}

#[tokio::test]
async fn every_connection_sees_the_current_player_set() {
    let h = Harness::new(100);
    let mut alice = h.player("acct-alice", "Alice").await;
    let mut bob = h.player("acct-bob", "Bob").await;

    assert_eq!(
        last_online(&alice.drain()),
        Some(vec!["Alice".to_string(), "Bob".to_string()])
    );

    h.server.disconnect(&bob.session);
    assert_eq!(last_online(&alice.drain()), Some(vec!["Alice".to_string()]));
    assert!(bob.drain().iter().all(|ev| !matches!(ev, ServerEvent::OnlinePlayers { .. })));
    assert_eq!(h.server.online_players(), vec!["Alice"]);
}

#[tokio::test]
async fn anonymous_connections_receive_broadcasts_but_are_not_listed() {
    let h = Harness::new(100);
    let (_lurker, mut lurker_rx) = h.server.connect(None);
    let _alice = h.player("acct-alice", "Alice").await;

    assert_eq!(
        last_online(&drain(&mut lurker_rx)),
        Some(vec!["Alice".to_string()])
    );
    assert_eq!(h.server.online_players(), vec!["Alice"]);
}

#[tokio::test]
async fn last_connect_wins_and_stale_disconnect_keeps_newer_login() {
    let h = Harness::new(100);
    let mut old = h.player("acct-alice", "Alice").await;
    let mut new = h.player("acct-alice", "Alice").await;
    let mut bob = h.player("acct-bob", "Bob").await;
    old.drain();
    new.drain();

    bob.whisper(&h, "Alice", "which one are you?").await;
    assert!(old.drain().is_empty());
    assert!(new
        .drain()
        .iter()
        .any(|ev| matches!(ev, ServerEvent::PrivateMessage { from, .. } if from == "Bob")));
    bob.drain();

    // The displaced connection closing must not take Alice offline.
    h.server.disconnect(&old.session);
    assert_eq!(h.server.online_players(), vec!["Alice", "Bob"]);
    assert!(bob.drain().is_empty(), "no presence change, no broadcast");

    h.server.disconnect(&new.session);
    assert_eq!(h.server.online_players(), vec!["Bob"]);
    assert_eq!(last_online(&bob.drain()), Some(vec!["Bob".to_string()]));
}

#[tokio::test]
async fn presence_list_has_no_duplicates_after_churn() {
    let h = Harness::new(100);
    let mut clients = Vec::new();
    for round in 0..3 {
        for (key, name) in [("acct-alice", "Alice"), ("acct-bob", "Bob"), ("acct-carol", "Carol")] {
            let c = h.player(key, name).await;
            if round < 2 {
                h.server.disconnect(&c.session);
            } else {
                clients.push(c);
            }
        }
    }
    assert_eq!(h.server.online_players(), vec!["Alice", "Bob", "Carol"]);
    let first = clients.remove(0);
    h.server.disconnect(&first.session);
    assert_eq!(h.server.online_players(), vec!["Bob", "Carol"]);
}

#[tokio::test]
async fn renaming_on_the_same_connection_replaces_the_old_name() {
    let h = Harness::new(100);
    let mut alice = h.player("acct-alice", "Alice").await;
    alice
        .send(
            &h,
            ClientEvent::Register {
                account_key: "acct-alice".into(),
                display_name: "Alicia".into(),
            },
        )
        .await;
    assert_eq!(h.server.online_players(), vec!["Alicia"]);
    assert_eq!(alice.session.display_name.as_deref(), Some("Alicia"));
}

#[tokio::test]
async fn invalid_registration_is_silently_dropped() {
    let h = Harness::new(100);
    let (mut session, mut rx) = h.server.connect(None);
    for (key, name) in [("", "Alice"), ("acct-x", "a/b"), ("acct-x", " ")] {
        h.server
            .handle_event(
                &mut session,
                ClientEvent::Register {
                    account_key: key.into(),
                    display_name: name.into(),
                },
            )
            .await
            .unwrap();
    }
    assert!(drain(&mut rx).is_empty());
    assert!(!session.is_registered());
    assert!(h.server.online_players().is_empty());
}

#[tokio::test]
async fn game_actions_before_register_are_dropped() {
    let h = Harness::new(100);
    let (mut session, mut rx) = h.server.connect(None);
    for ev in [
        ClientEvent::RobBank,
        ClientEvent::Travel {
            destination: "Paris".into(),
        },
        ClientEvent::Message { text: "hi".into() },
        ClientEvent::MarkRead { ids: vec![] },
    ] {
        h.server.handle_event(&mut session, ev).await.unwrap();
    }
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registers_list_the_name_once() {
    let h = Harness::new(100);
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let server = h.server.clone();
        tasks.push(tokio::spawn(async move {
            let (mut session, rx) = server.connect(None);
            server
                .handle_event(
                    &mut session,
                    ClientEvent::Register {
                        account_key: "acct-alice".into(),
                        display_name: "Alice".into(),
                    },
                )
                .await
                .unwrap();
            (session, rx)
        }));
    }
    let mut connections = Vec::new();
    for t in tasks {
        connections.push(t.await.unwrap());
    }

    assert_eq!(h.server.online_players(), vec!["Alice"]);
    assert!(connections.iter().all(|(session, _)| session.is_registered()));
}
