use std::sync::Arc;

use tandem_client::{Client, ReconnectPolicy, SessionEvent};
use tandem_core::RoomId;

use crate::integration::init_tracing;
use crate::utils::{
    EVENT_TIMEOUT_MS, EventProbe, MockAdapterFactory, MockConfig, client_config,
    spawn_test_server,
};

#[tokio::test]
async fn test_server_disconnect_triggers_rejoin_and_renegotiation() {
    init_tracing();
    let (addr, state) = spawn_test_server().await;

    let factory_a = MockAdapterFactory::new(MockConfig::default());
    let (a, events_a) = Client::start(client_config(addr, "r1"), Arc::new(factory_a.clone()));
    let mut probe_a = EventProbe::new(events_a);
    probe_a
        .wait_for(EVENT_TIMEOUT_MS, |e| matches!(e, SessionEvent::Joined(_)))
        .await
        .unwrap();

    let factory_b = MockAdapterFactory::new(MockConfig::default());
    let (b, events_b) = Client::start(client_config(addr, "r1"), Arc::new(factory_b.clone()));
    let mut probe_b = EventProbe::new(events_b);
    let b_id = b.peer_id();

    probe_a
        .wait_for(EVENT_TIMEOUT_MS, |e| matches!(e, SessionEvent::PeerConnected(_)))
        .await
        .unwrap();
    probe_b
        .wait_for(EVENT_TIMEOUT_MS, |e| matches!(e, SessionEvent::PeerConnected(_)))
        .await
        .unwrap();

    assert!(state.signaling.disconnect(&b_id));

    let dropped = probe_b
        .wait_for(EVENT_TIMEOUT_MS, |e| {
            matches!(e, SessionEvent::SignalingDisconnected { .. })
        })
        .await
        .unwrap();
    assert!(matches!(
        dropped,
        SessionEvent::SignalingDisconnected {
            will_reconnect: true,
            ..
        }
    ));
    let stale = factory_b.adapters_for(&a.peer_id()).pop().unwrap();
    assert!(stale.is_closed(), "state is reset on disconnect");

    probe_b
        .wait_for(EVENT_TIMEOUT_MS, |e| matches!(e, SessionEvent::Joined(_)))
        .await
        .unwrap();

    probe_a
        .wait_for(EVENT_TIMEOUT_MS, |e| matches!(e, SessionEvent::PeerLeft(p) if *p == b_id))
        .await
        .unwrap();
    probe_a
        .wait_for(EVENT_TIMEOUT_MS, |e| matches!(e, SessionEvent::PeerConnected(p) if *p == b_id))
        .await
        .unwrap();
    probe_b
        .wait_for(EVENT_TIMEOUT_MS, |e| matches!(e, SessionEvent::PeerConnected(_)))
        .await
        .unwrap();

    // Two negotiations on each side: the original and the one after rejoin.
    assert_eq!(factory_a.adapters_for(&b_id).len(), 2);
    assert_eq!(factory_b.adapters_for(&a.peer_id()).len(), 2);
    assert_eq!(state.room_manager.room_count(), 1);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    init_tracing();

    // Nothing listens on this port once the listener is dropped.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let mut config = client_config(addr, "void");
    config.reconnect = ReconnectPolicy {
        initial_delay: std::time::Duration::from_millis(10),
        max_delay: std::time::Duration::from_millis(20),
        max_attempts: Some(2),
    };
    assert_eq!(config.identity.room_id, RoomId::new("void").unwrap());

    let (client, events) = Client::start(config, Arc::new(MockAdapterFactory::new(MockConfig::default())));
    let mut probe = EventProbe::new(events);

    probe
        .wait_for(EVENT_TIMEOUT_MS, |e| matches!(e, SessionEvent::Stopped))
        .await
        .unwrap();

    let attempts = probe.count(|e| matches!(e, SessionEvent::SignalingDisconnected { .. }));
    assert_eq!(attempts, 3);
    assert!(matches!(
        probe.seen().iter().rev().find(|e| matches!(e, SessionEvent::SignalingDisconnected { .. })),
        Some(SessionEvent::SignalingDisconnected {
            will_reconnect: false,
            ..
        })
    ));
    assert_eq!(probe.count(|e| matches!(e, SessionEvent::SignalingConnected)), 0);
    client.stop().await;
}
