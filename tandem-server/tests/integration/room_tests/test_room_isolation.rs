use std::time::Duration;

use tandem_core::{PeerId, SessionDescription, SignalMessage};
use tandem_server::{RoomCommand, RoomConfig};

use crate::integration::{create_test_manager, init_tracing, join, room};

#[tokio::test]
async fn test_messages_stay_inside_their_room() {
    init_tracing();

    let (manager, signaling) = create_test_manager(RoomConfig::default());
    let room_a = room("A");
    let room_b = room("B");

    let a1 = PeerId::new();
    let a2 = PeerId::new();
    let b1 = PeerId::new();
    let b2 = PeerId::new();

    join(&manager, &room_a, a1, 1).await;
    join(&manager, &room_b, b1, 2).await;
    join(&manager, &room_a, a2, 3).await;
    join(&manager, &room_b, b2, 4).await;

    let offer = SignalMessage::Offer {
        sender_id: a1,
        room_id: room_a.clone(),
        target_id: None,
        description: SessionDescription::offer("v=0 A"),
    };
    manager
        .dispatch(&room_a, RoomCommand::Relay { from: a1, message: offer })
        .await;

    assert!(
        signaling
            .wait_for(&a2, 1, 2000, |m| matches!(m, SignalMessage::Offer { .. }))
            .await
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    for outsider in [b1, b2] {
        let received = signaling.messages_for(&outsider).await;
        assert!(!received.iter().any(|m| matches!(m, SignalMessage::Offer { .. })));

        let welcomes = signaling.welcomes_for(&outsider).await;
        assert!(welcomes.iter().all(|p| *p == b1 || *p == b2), "no stray welcomes");
        assert_eq!(welcomes.len(), 2);
    }
    assert_eq!(manager.room_count(), 2);
}
