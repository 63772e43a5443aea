use tandem_core::{IceServerConfig, PeerId, SignalMessage};
use tandem_server::ServerConfig;

use crate::integration::init_tracing;
use crate::utils::{SIGNAL_TIMEOUT_MS, WsTestClient, spawn_test_server};

#[tokio::test]
async fn test_ice_config_is_pushed_on_connect() {
    init_tracing();

    let config = ServerConfig {
        ice_servers: vec![IceServerConfig::stun("stun:stun.example.org:3478")],
        ..ServerConfig::default()
    };
    let (addr, _state) = spawn_test_server(config).await;

    let mut client = WsTestClient::connect(addr, PeerId::new()).await.unwrap();
    let first = client.recv(SIGNAL_TIMEOUT_MS).await.unwrap();

    match first {
        Some(SignalMessage::IceConfig { ice_servers }) => {
            assert_eq!(ice_servers.len(), 1);
            assert_eq!(ice_servers[0].urls, vec!["stun:stun.example.org:3478".to_owned()]);
        }
        other => panic!("expected ice_config first, got {:?}", other),
    }
}

#[tokio::test]
async fn test_join_over_socket_yields_welcomes() {
    init_tracing();
    let (addr, state) = spawn_test_server(ServerConfig::default()).await;

    let mut alice = WsTestClient::connect(addr, PeerId::new()).await.unwrap();
    alice.join("lobby").await.unwrap();
    let own = alice
        .recv_until(SIGNAL_TIMEOUT_MS, |m| matches!(m, SignalMessage::Welcome { .. }))
        .await
        .unwrap();
    assert_eq!(own, SignalMessage::Welcome { peer_id: alice.peer_id });

    let mut bob = WsTestClient::connect(addr, PeerId::new()).await.unwrap();
    bob.join("lobby").await.unwrap();

    let roster = bob
        .recv_until(SIGNAL_TIMEOUT_MS, |m| matches!(m, SignalMessage::Welcome { .. }))
        .await
        .unwrap();
    assert_eq!(roster, SignalMessage::Welcome { peer_id: alice.peer_id });
    let own = bob
        .recv_until(SIGNAL_TIMEOUT_MS, |m| matches!(m, SignalMessage::Welcome { .. }))
        .await
        .unwrap();
    assert_eq!(own, SignalMessage::Welcome { peer_id: bob.peer_id });

    let announced = alice
        .recv_until(SIGNAL_TIMEOUT_MS, |m| matches!(m, SignalMessage::Welcome { .. }))
        .await
        .unwrap();
    assert_eq!(announced, SignalMessage::Welcome { peer_id: bob.peer_id });

    assert!(state.signaling.is_connected(&alice.peer_id));
    assert_eq!(state.room_manager.room_count(), 1);
}
