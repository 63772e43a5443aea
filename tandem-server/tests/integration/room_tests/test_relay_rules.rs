use std::time::Duration;

use tandem_core::{ErrorCode, IceCandidate, PeerId, RoomId, SessionDescription, SignalMessage};
use tandem_server::{RoomCommand, RoomConfig, RoomManager};

use crate::integration::{create_test_manager, init_tracing, join, room};
use crate::utils::MockSignalingOutput;

fn is_error(msg: &SignalMessage) -> bool {
    matches!(msg, SignalMessage::Error { .. })
}

fn offer(sender: PeerId, r: &RoomId, target: Option<PeerId>) -> SignalMessage {
    SignalMessage::Offer {
        sender_id: sender,
        room_id: r.clone(),
        target_id: target,
        description: SessionDescription::offer("v=0 A"),
    }
}

async fn relay(manager: &RoomManager, r: &RoomId, from: PeerId, message: SignalMessage) {
    manager
        .dispatch(r, RoomCommand::Relay { from, message })
        .await;
}

async fn three_member_room() -> (RoomManager, MockSignalingOutput, RoomId, [PeerId; 3]) {
    let (manager, signaling) = create_test_manager(RoomConfig::default());
    let r = room("r1");
    let peers = [PeerId::new(), PeerId::new(), PeerId::new()];
    for (i, p) in peers.iter().enumerate() {
        join(&manager, &r, *p, i as u64).await;
    }
    (manager, signaling, r, peers)
}

#[tokio::test]
async fn test_broadcast_relay_never_echoes_sender() {
    init_tracing();
    let (manager, signaling, r, [a, b, c]) = three_member_room().await;

    relay(&manager, &r, a, offer(a, &r, None)).await;

    for peer in [b, c] {
        assert!(
            signaling
                .wait_for(&peer, 1, 2000, |m| matches!(m, SignalMessage::Offer { .. }))
                .await
        );
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    let to_a = signaling.messages_for(&a).await;
    assert!(!to_a.iter().any(|m| matches!(m, SignalMessage::Offer { .. })));
}

#[tokio::test]
async fn test_targeted_relay_reaches_only_target() {
    init_tracing();
    let (manager, signaling, r, [a, b, c]) = three_member_room().await;

    let candidate = SignalMessage::Candidate {
        sender_id: a,
        room_id: r.clone(),
        target_id: Some(b),
        candidate: IceCandidate::new("candidate:1 1 udp 1 10.0.0.1 9 typ host"),
    };
    relay(&manager, &r, a, candidate.clone()).await;

    assert!(
        signaling
            .wait_for(&b, 1, 2000, |m| matches!(m, SignalMessage::Candidate { .. }))
            .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let to_b: Vec<_> = signaling
        .messages_for(&b)
        .await
        .into_iter()
        .filter(|m| matches!(m, SignalMessage::Candidate { .. }))
        .collect();
    assert_eq!(to_b, vec![candidate]);
    assert!(
        !signaling
            .messages_for(&c)
            .await
            .iter()
            .any(|m| matches!(m, SignalMessage::Candidate { .. }))
    );
}

#[tokio::test]
async fn test_non_member_gets_not_in_room() {
    init_tracing();
    let (manager, signaling, r, [_, b, _]) = three_member_room().await;
    let outsider = PeerId::new();

    relay(&manager, &r, outsider, offer(outsider, &r, Some(b))).await;

    assert!(signaling.wait_for(&outsider, 1, 2000, is_error).await);
    assert_eq!(signaling.errors_for(&outsider).await, vec![ErrorCode::NotInRoom]);
    assert!(
        !signaling
            .messages_for(&b)
            .await
            .iter()
            .any(|m| matches!(m, SignalMessage::Offer { .. }))
    );
}

#[tokio::test]
async fn test_relay_into_missing_room_reports_error() {
    init_tracing();
    let (manager, signaling) = create_test_manager(RoomConfig::default());
    let r = room("nobody-here");
    let lonely = PeerId::new();

    relay(&manager, &r, lonely, offer(lonely, &r, None)).await;

    assert!(signaling.wait_for(&lonely, 1, 2000, is_error).await);
    assert_eq!(signaling.errors_for(&lonely).await, vec![ErrorCode::NotInRoom]);
}

#[tokio::test]
async fn test_unknown_target_and_self_target_are_rejected() {
    init_tracing();
    let (manager, signaling, r, [a, _, _]) = three_member_room().await;

    relay(&manager, &r, a, offer(a, &r, Some(PeerId::new()))).await;
    relay(&manager, &r, a, offer(a, &r, Some(a))).await;

    assert!(signaling.wait_for(&a, 2, 2000, is_error).await);
    assert_eq!(
        signaling.errors_for(&a).await,
        vec![ErrorCode::UnknownPeer, ErrorCode::UnknownPeer]
    );
}

#[tokio::test]
async fn test_spoofed_sender_is_rejected() {
    init_tracing();
    let (manager, signaling, r, [a, b, c]) = three_member_room().await;

    relay(&manager, &r, a, offer(b, &r, Some(c))).await;

    assert!(signaling.wait_for(&a, 1, 2000, is_error).await);
    assert_eq!(signaling.errors_for(&a).await, vec![ErrorCode::SenderMismatch]);
}
