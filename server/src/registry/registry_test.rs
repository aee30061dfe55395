use std::{collections::HashSet, thread};

use super::*;

#[test]
fn add_and_remove() {
    let registry = ConnectionRegistry::new();
    let (conn, _rx) = Connection::new(4);
    let id = conn.id();

    registry.add(conn.clone());
    assert_eq!(registry.len(), 1);
    assert!(registry.get(id).is_some());

    let removed = registry.remove(id).unwrap();
    assert!(!removed.is_open());
    assert!(registry.is_empty());
    assert!(registry.remove(id).is_none());
}

#[test]
fn send_on_full_queue_closes_connection() {
    let (conn, _rx) = Connection::new(1);

    conn.send("a".into()).unwrap();
    assert_eq!(conn.send("b".into()), Err(ConnectionError::Full));
    assert!(!conn.is_open());
    assert_eq!(conn.send("c".into()), Err(ConnectionError::Closed));
}

#[test]
fn send_after_receiver_dropped_fails() {
    let (conn, rx) = Connection::new(4);
    drop(rx);

    assert_eq!(conn.send("a".into()), Err(ConnectionError::Closed));
    assert!(!conn.is_open());
}

#[test]
fn for_each_open_skips_closed_connections() {
    let registry = ConnectionRegistry::new();
    let mut receivers = Vec::new();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let (conn, rx) = Connection::new(4);
        ids.push(conn.id());
        registry.add(conn);
        receivers.push(rx);
    }
    registry.get(ids[1]).unwrap().mark_closed();

    let mut visited = Vec::new();
    registry.for_each_open(|c| visited.push(c.id()));

    assert_eq!(visited.len(), 2);
    assert!(!visited.contains(&ids[1]));
}

#[test]
fn removal_during_iteration_visits_each_live_connection_once() {
    let registry = ConnectionRegistry::new();
    let mut receivers = Vec::new();
    for _ in 0..10 {
        let (conn, rx) = Connection::new(4);
        registry.add(conn);
        receivers.push(rx);
    }

    let mut visited = Vec::new();
    registry.for_each_open(|c| {
        visited.push(c.id());
        registry.remove(c.id());
    });

    let unique: HashSet<_> = visited.iter().collect();
    assert_eq!(visited.len(), 10);
    assert_eq!(unique.len(), 10);
    assert!(registry.is_empty());
}

#[test]
fn concurrent_iteration_and_removal() {
    let registry = Arc::new(ConnectionRegistry::new());
    let mut receivers = Vec::new();
    let mut ids = Vec::new();
    for _ in 0..200 {
        let (conn, rx) = Connection::new(4);
        ids.push(conn.id());
        registry.add(conn);
        receivers.push(rx);
    }

    let remover = {
        let registry = registry.clone();
        let ids = ids.clone();
        thread::spawn(move || {
            for id in ids.iter().step_by(2) {
                registry.remove(*id);
            }
        })
    };

    for _ in 0..50 {
        let mut seen = HashSet::new();
        registry.for_each_open(|c| assert!(seen.insert(c.id()), "visited twice"));
    }
    remover.join().unwrap();

    let mut remaining = 0;
    registry.for_each_open(|_| remaining += 1);
    assert_eq!(remaining, 100);
}

#[tokio::test]
async fn closed_resolves_after_removal() {
    let registry = ConnectionRegistry::new();
    let (conn, _rx) = Connection::new(4);
    registry.add(conn.clone());

    let waiter = tokio::spawn({
        let conn = conn.clone();
        async move { conn.closed().await }
    });
    registry.remove(conn.id());

    tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn overflow_resolves_closed() {
    let (conn, _rx) = Connection::new(1);
    conn.send("a".into()).unwrap();
    assert!(conn.send("b".into()).is_err());

    tokio::time::timeout(std::time::Duration::from_secs(1), conn.closed())
        .await
        .unwrap();
}
