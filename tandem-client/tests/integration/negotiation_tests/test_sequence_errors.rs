use tandem_client::{NegotiationError, NegotiationState};
use tandem_core::{SdpType, SessionDescription};

use crate::integration::{Harness, init_tracing};
use crate::utils::{AdapterCall, MockConfig};

fn is_out_of_sequence(result: Result<(), NegotiationError>) -> bool {
    matches!(result, Err(NegotiationError::OutOfSequence { .. }))
}

#[tokio::test]
async fn test_answer_without_offer_is_discarded() {
    init_tracing();
    let mut h = Harness::new(MockConfig::default());

    let result = h
        .negotiation
        .handle_answer(SessionDescription::answer("v=0 stray"))
        .await;

    assert!(is_out_of_sequence(result));
    assert_eq!(h.negotiation.state(), NegotiationState::Idle);
    assert!(h.adapter.calls().is_empty());
}

#[tokio::test]
async fn test_second_answer_is_discarded() {
    init_tracing();
    let mut h = Harness::new(MockConfig::default());

    h.negotiation.start_offer().await.unwrap();
    h.negotiation
        .handle_answer(SessionDescription::answer("v=0 first"))
        .await
        .unwrap();
    let result = h
        .negotiation
        .handle_answer(SessionDescription::answer("v=0 second"))
        .await;

    assert!(is_out_of_sequence(result));
    assert_eq!(h.adapter.count(&AdapterCall::SetRemote(SdpType::Answer)), 1);
    assert_eq!(h.negotiation.state(), NegotiationState::OfferSent);
}

#[tokio::test]
async fn test_offer_while_not_idle_is_discarded() {
    init_tracing();
    let mut h = Harness::new(MockConfig::default());

    h.negotiation.start_offer().await.unwrap();
    let result = h
        .negotiation
        .handle_offer(SessionDescription::offer("v=0 glare"))
        .await;

    assert!(is_out_of_sequence(result));
    assert_eq!(h.negotiation.state(), NegotiationState::OfferSent);
    assert_eq!(h.adapter.count(&AdapterCall::SetRemote(SdpType::Offer)), 0);
}

#[tokio::test]
async fn test_offer_cue_while_answering_is_discarded() {
    init_tracing();
    let mut h = Harness::new(MockConfig::default());

    h.negotiation
        .handle_offer(SessionDescription::offer("v=0 remote"))
        .await
        .unwrap();
    let result = h.negotiation.start_offer().await;

    assert!(is_out_of_sequence(result));
    assert_eq!(h.adapter.count(&AdapterCall::CreateOffer), 0);
}
