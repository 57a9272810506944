//! Room lifecycle properties exercised through the public router API.

use chat_protocol::{codec, ChatEvent, Envelope, MessageType};
use prochord_chat_core::{MessageRouter, RoomDirectory};
use prochord_chat_transport::{MemorySession, Session};
use std::collections::BTreeSet;
use std::sync::Arc;

fn frame(envelope: Envelope) -> Vec<u8> {
    codec::encode(&envelope).unwrap().to_vec()
}

fn session(id: &str) -> (Arc<MemorySession>, Arc<dyn Session>) {
    let memory = Arc::new(MemorySession::new(id));
    let handle: Arc<dyn Session> = memory.clone();
    (memory, handle)
}

#[test]
fn test_replay_matches_fold() {
    let router = MessageRouter::new(Arc::new(RoomDirectory::new()));
    let users = ["alice", "bob", "carol"];
    let handles: Vec<_> = users
        .iter()
        .enumerate()
        .map(|(i, _)| session(&format!("conn-{i}")).1)
        .collect();

    // (user index, type)
    let script = [
        (0, MessageType::Enter),
        (1, MessageType::Join),
        (2, MessageType::Enter),
        (1, MessageType::Exit),
        (1, MessageType::Enter),
        (0, MessageType::Exit),
        (2, MessageType::Join),
        (2, MessageType::Exit),
    ];

    let mut expected = BTreeSet::new();
    for (user, ty) in script {
        let name = users[user];
        let envelope = Envelope::new(ty, ChatEvent::new(11, name, ""));
        router.handle(&handles[user], name, &frame(envelope));

        match ty {
            MessageType::Enter | MessageType::Join => {
                expected.insert(name.to_string());
            }
            MessageType::Exit => {
                expected.remove(name);
            }
            _ => unreachable!(),
        }

        let actual: BTreeSet<String> = router
            .directory()
            .get(11)
            .map(|room| room.usernames().into_iter().collect())
            .unwrap_or_default();
        assert_eq!(actual, expected);
        assert_eq!(router.directory().contains(11), !expected.is_empty());
    }
}

#[test]
fn test_talk_reaches_exactly_current_participants() {
    let router = MessageRouter::new(Arc::new(RoomDirectory::new()));
    let (alice, alice_handle) = session("conn-a");
    let (bob, bob_handle) = session("conn-b");
    let (carol, carol_handle) = session("conn-c");
    let (outsider, outsider_handle) = session("conn-x");

    router.handle(&alice_handle, "alice", &frame(Envelope::Enter(ChatEvent::new(3, "alice", ""))));
    router.handle(&bob_handle, "bob", &frame(Envelope::Join(ChatEvent::new(3, "bob", ""))));
    router.handle(&carol_handle, "carol", &frame(Envelope::Join(ChatEvent::new(3, "carol", ""))));
    router.handle(&outsider_handle, "dave", &frame(Envelope::Enter(ChatEvent::new(4, "dave", ""))));
    for s in [&alice, &bob, &carol, &outsider] {
        s.take_sent();
    }

    bob.set_fail_sends(true);
    let outcome = router
        .handle(&alice_handle, "alice", &frame(Envelope::Talk(ChatEvent::new(3, "alice", "hello"))))
        .unwrap();

    assert_eq!(outcome.broadcast.delivered, 2);
    assert_eq!(outcome.broadcast.failed, 1);

    let talk = Envelope::Talk(ChatEvent::new(3, "alice", "hello"));
    assert_eq!(alice.sent_envelopes(), vec![talk.clone()]);
    assert_eq!(carol.sent_envelopes(), vec![talk]);
    assert!(bob.sent().is_empty());
    assert!(outsider.sent().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enters_create_one_room() {
    for round in 0..50 {
        let directory = Arc::new(RoomDirectory::new());
        let router = Arc::new(MessageRouter::new(directory.clone()));
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let tasks: Vec<_> = ["alice", "bob"]
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let router = router.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    let (memory, handle) = session(&format!("conn-{round}-{i}"));
                    barrier.wait().await;
                    router.handle(&handle, name, &frame(Envelope::Enter(ChatEvent::new(100, name, ""))));
                    memory
                })
            })
            .collect();

        let mut sessions = Vec::new();
        for task in tasks {
            sessions.push(task.await.unwrap());
        }

        assert_eq!(directory.len(), 1);
        assert_eq!(directory.participant_count(100), 2);

        // Whoever entered second was announced to both participants
        let announcements: usize = sessions.iter().map(|s| s.sent().len()).sum();
        assert_eq!(announcements, 3);
    }
}
