#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use tokio::sync::mpsc;

use duet_core::DuetError;
use duet_relay::realtime::{Connection, Frame, RoomRegistry, MAX_PEERS_PER_ROOM};

fn conn(id: &str) -> (Arc<Connection>, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(8);
    (Connection::new(id, tx), rx)
}

#[test]
fn third_join_is_rejected() {
    let rooms = RoomRegistry::new();
    let room = rooms.create_room();
    let (a, _ra) = conn("a");
    let (b, _rb) = conn("b");
    let (c, _rc) = conn("c");

    assert_eq!(rooms.join_room(&room, &a).unwrap().peer_count, 1);
    assert_eq!(rooms.join_room(&room, &b).unwrap().peer_count, 2);
    assert!(matches!(rooms.join_room(&room, &c), Err(DuetError::RoomFull)));
    assert_eq!(rooms.member_count(&room), MAX_PEERS_PER_ROOM);
    assert!(c.room().is_none());
}

#[test]
fn unknown_room_is_not_found() {
    let rooms = RoomRegistry::new();
    let (a, _ra) = conn("a");
    assert!(matches!(
        rooms.join_room("no-such-room", &a),
        Err(DuetError::RoomNotFound)
    ));
    assert!(!rooms.room_exists("no-such-room"));
    assert_eq!(rooms.member_count("no-such-room"), 0);
}

#[test]
fn rejoin_same_room_is_noop() {
    let rooms = RoomRegistry::new();
    let room = rooms.create_room();
    let (a, _ra) = conn("a");

    rooms.join_room(&room, &a).unwrap();
    let again = rooms.join_room(&room, &a).unwrap();
    assert!(again.already_member);
    assert_eq!(again.peer_count, 1);
    assert_eq!(rooms.member_count(&room), 1);
}

#[test]
fn joining_another_room_requires_leaving_first() {
    let rooms = RoomRegistry::new();
    let first = rooms.create_room();
    let second = rooms.create_room();
    let (a, _ra) = conn("a");

    rooms.join_room(&first, &a).unwrap();
    assert!(matches!(
        rooms.join_room(&second, &a),
        Err(DuetError::AlreadyInRoom(_))
    ));
    assert_eq!(a.room().as_deref(), Some(&*first));
}

#[test]
fn last_leave_deletes_room_and_second_leave_is_noop() {
    let rooms = RoomRegistry::new();
    let room = rooms.create_room();
    let (a, _ra) = conn("a");
    let (b, _rb) = conn("b");
    rooms.join_room(&room, &a).unwrap();
    rooms.join_room(&room, &b).unwrap();

    let first = rooms.leave_room(&a).expect("a was in a room");
    assert_eq!(first.remaining.len(), 1);
    assert_eq!(first.remaining[0].id(), "b");
    assert!(!first.room_deleted);
    assert!(rooms.leave_room(&a).is_none());

    let last = rooms.leave_room(&b).expect("b was in a room");
    assert!(last.room_deleted);
    assert!(last.remaining.is_empty());
    assert!(!rooms.room_exists(&room));
    assert_eq!(rooms.room_count(), 0);

    // a deleted room cannot be joined again
    assert!(matches!(rooms.join_room(&room, &a), Err(DuetError::RoomNotFound)));
}

#[test]
fn created_rooms_are_counted_before_anyone_joins() {
    let rooms = RoomRegistry::new();
    let room = rooms.create_room();
    assert!(rooms.room_exists(&room));
    assert_eq!(rooms.member_count(&room), 0);
    assert_eq!(rooms.room_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_exceed_capacity() {
    for _ in 0..50 {
        let rooms = Arc::new(RoomRegistry::new());
        let room = rooms.create_room();

        let mut tasks = Vec::new();
        let mut keep = Vec::new();
        for i in 0..8 {
            let (c, rx) = conn(&format!("c{i}"));
            keep.push(rx);
            let rooms = Arc::clone(&rooms);
            let room = Arc::clone(&room);
            tasks.push(tokio::spawn(async move { rooms.join_room(&room, &c).is_ok() }));
        }

        let mut admitted = 0;
        for t in tasks {
            if t.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, MAX_PEERS_PER_ROOM);
        assert_eq!(rooms.member_count(&room), MAX_PEERS_PER_ROOM);
    }
}
