use tandem_client::NegotiationState;
use tandem_core::{IceCandidate, SdpType, SessionDescription};

use crate::integration::{Harness, init_tracing};
use crate::utils::{AdapterCall, MockConfig};

fn candidate(n: u32) -> IceCandidate {
    IceCandidate::new(format!("candidate:{} 1 udp 1 10.0.0.{} 9 typ host", n, n))
}

#[tokio::test]
async fn test_early_candidates_flush_in_arrival_order_for_answerer() {
    init_tracing();
    let mut h = Harness::new(MockConfig::default());

    for n in 1..=3 {
        h.negotiation
            .handle_remote_candidate(candidate(n))
            .await
            .unwrap();
    }
    assert_eq!(h.negotiation.pending_candidates(), 3);
    assert!(h.adapter.calls().is_empty());

    h.negotiation
        .handle_offer(SessionDescription::offer("v=0 remote"))
        .await
        .unwrap();
    h.negotiation
        .handle_remote_candidate(candidate(4))
        .await
        .unwrap();

    assert_eq!(h.negotiation.pending_candidates(), 0);
    assert_eq!(h.negotiation.state(), NegotiationState::Answering);
    assert_eq!(
        h.adapter.calls(),
        vec![
            AdapterCall::SetRemote(SdpType::Offer),
            AdapterCall::AddCandidate(candidate(1).candidate),
            AdapterCall::AddCandidate(candidate(2).candidate),
            AdapterCall::AddCandidate(candidate(3).candidate),
            AdapterCall::CreateAnswer,
            AdapterCall::SetLocal(SdpType::Answer),
            AdapterCall::AddCandidate(candidate(4).candidate),
        ]
    );
}

#[tokio::test]
async fn test_candidates_before_answer_are_buffered_for_offerer() {
    init_tracing();
    let mut h = Harness::new(MockConfig::default());

    h.negotiation.start_offer().await.unwrap();
    h.negotiation
        .handle_remote_candidate(candidate(1))
        .await
        .unwrap();
    h.negotiation
        .handle_remote_candidate(candidate(2))
        .await
        .unwrap();
    assert_eq!(h.adapter.count(&AdapterCall::AddCandidate(candidate(1).candidate)), 0);

    h.negotiation
        .handle_answer(SessionDescription::answer("v=0 remote"))
        .await
        .unwrap();

    let calls = h.adapter.calls();
    let tail = &calls[calls.len() - 3..];
    assert_eq!(
        tail,
        &[
            AdapterCall::SetRemote(SdpType::Answer),
            AdapterCall::AddCandidate(candidate(1).candidate),
            AdapterCall::AddCandidate(candidate(2).candidate),
        ]
    );
}
