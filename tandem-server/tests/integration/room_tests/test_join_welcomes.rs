use std::collections::HashSet;

use tandem_core::{PeerId, SignalMessage};
use tandem_server::RoomConfig;

use crate::integration::{create_test_manager, init_tracing, join, room};

fn is_welcome(msg: &SignalMessage) -> bool {
    matches!(msg, SignalMessage::Welcome { .. })
}

#[tokio::test]
async fn test_each_member_gets_one_welcome_per_member() {
    init_tracing();

    let (manager, signaling) = create_test_manager(RoomConfig::default());
    let r = room("r1");
    let peers: Vec<PeerId> = (0..3).map(|_| PeerId::new()).collect();

    for (i, peer) in peers.iter().enumerate() {
        join(&manager, &r, *peer, i as u64).await;
    }

    for peer in &peers {
        assert!(
            signaling.wait_for(peer, 3, 2000, is_welcome).await,
            "peer {} did not get 3 welcomes",
            peer
        );
    }
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let expected: HashSet<PeerId> = peers.iter().copied().collect();
    for peer in &peers {
        let welcomes = signaling.welcomes_for(peer).await;
        assert_eq!(welcomes.len(), 3, "exactly one welcome per member");
        assert_eq!(welcomes.into_iter().collect::<HashSet<_>>(), expected);
    }
}

#[tokio::test]
async fn test_joiner_sees_roster_before_its_own_welcome() {
    init_tracing();

    let (manager, signaling) = create_test_manager(RoomConfig::default());
    let r = room("r1");
    let first = PeerId::new();
    let second = PeerId::new();

    join(&manager, &r, first, 1).await;
    join(&manager, &r, second, 2).await;

    assert!(signaling.wait_for(&second, 2, 2000, is_welcome).await);
    assert_eq!(signaling.welcomes_for(&second).await, vec![first, second]);

    assert!(signaling.wait_for(&first, 2, 2000, is_welcome).await);
    assert_eq!(signaling.welcomes_for(&first).await, vec![first, second]);
}

#[tokio::test]
async fn test_full_room_rejects_join() {
    init_tracing();

    let (manager, signaling) = create_test_manager(RoomConfig {
        max_members: 2,
        ..RoomConfig::default()
    });
    let r = room("small");
    let peers: Vec<PeerId> = (0..3).map(|_| PeerId::new()).collect();

    for (i, peer) in peers.iter().enumerate() {
        join(&manager, &r, *peer, i as u64).await;
    }

    let rejected = peers[2];
    assert!(
        signaling
            .wait_for(&rejected, 1, 2000, |m| matches!(m, SignalMessage::Error { .. }))
            .await
    );
    assert!(signaling.welcomes_for(&rejected).await.is_empty());
    assert_eq!(signaling.welcomes_for(&peers[0]).await.len(), 2);
}
