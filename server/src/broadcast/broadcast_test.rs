use chrono::Utc;

use super::*;
use crate::registry::Connection;

fn event(vehicle_id: i64) -> LocationEvent {
    LocationEvent {
        vehicle_id,
        lat: 4.6,
        lon: -74.1,
        event_type: "moving".into(),
        direction: "south".into(),
        received_at: Utc::now(),
    }
}

#[test]
fn failed_observer_is_pruned_and_others_still_receive() {
    let registry = Arc::new(ConnectionRegistry::new());
    let fanout = Fanout::new(registry.clone());

    let (a, mut rx_a) = Connection::new(4);
    let (b, rx_b) = Connection::new(4);
    let (c, mut rx_c) = Connection::new(4);
    registry.add(a.clone());
    registry.add(b.clone());
    registry.add(c.clone());
    drop(rx_b);

    let delivered = fanout.broadcast(&event(11));

    assert_eq!(delivered, 2);
    for rx in [&mut rx_a, &mut rx_c] {
        let frame: Frame = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert!(frame.success);
        assert_eq!(frame.message, BROADCAST_MESSAGE);
        assert_eq!(frame.data.unwrap()["vehicle_id"], 11);
    }
    assert!(registry.get(b.id()).is_none());
    assert!(registry.get(a.id()).is_some());
    assert!(registry.get(c.id()).is_some());
}

#[test]
fn slow_observer_does_not_block_fanout() {
    let registry = Arc::new(ConnectionRegistry::new());
    let fanout = Fanout::new(registry.clone());

    let (slow, _rx_slow) = Connection::new(1);
    let (fast, mut rx_fast) = Connection::new(8);
    registry.add(slow.clone());
    registry.add(fast);

    fanout.broadcast(&event(1));
    fanout.broadcast(&event(2));

    assert!(registry.get(slow.id()).is_none());
    assert!(rx_fast.try_recv().is_ok());
    assert!(rx_fast.try_recv().is_ok());
}

#[test]
fn broadcast_without_observers_is_a_no_op() {
    let fanout = Fanout::new(Arc::new(ConnectionRegistry::new()));
    assert_eq!(fanout.broadcast(&event(1)), 0);
}
