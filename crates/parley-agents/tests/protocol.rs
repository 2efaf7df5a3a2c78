//! Offer protocol across consecutive turns

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use parley_agents::{
    Actor, NegotiationAgent, Negotiator, OfferValidator, StructuredAnalyst, StructuredMessage,
    Verdict,
};
use parley_llm::{LLMRouter, RetryPolicy, ScriptedProvider};
use parley_types::{ActorDescription, Role, Transcript};

fn scripted(responses: Vec<String>) -> Arc<LLMRouter> {
    Arc::new(LLMRouter::new(Arc::new(ScriptedProvider::new(responses))).with_retry(RetryPolicy::none()))
}

#[test]
fn test_accepted_buyer_offers_strictly_increase() {
    let mut validator = OfferValidator::new(Role::Buyer);
    let offers = [10.0, 30.0, 20.0, 30.0, 45.0, 44.0, 60.0, 120.0, 70.0];
    let mut accepted = Vec::new();
    for offer in offers {
        if validator.evaluate(&StructuredMessage::counter_offer(offer, 100.0)) == Verdict::Valid {
            accepted.push(offer);
        }
    }
    assert_eq!(accepted, vec![10.0, 30.0, 45.0, 60.0, 70.0]);
    assert!(accepted.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_accepted_seller_offers_strictly_decrease() {
    let mut validator = OfferValidator::new(Role::Seller);
    let offers = [100.0, 100.0, 95.0, 97.0, 80.0, 20.0, 79.5];
    let mut accepted = Vec::new();
    for offer in offers {
        if validator.evaluate(&StructuredMessage::counter_offer(50.0, offer)) == Verdict::Valid {
            accepted.push(offer);
        }
    }
    assert_eq!(accepted, vec![100.0, 95.0, 80.0, 79.5]);
}

#[tokio::test]
async fn test_turns_share_one_running_offer() {
    let analyses = [
        r#"{"MessageType": "counter-offer", "buyer": 40, "seller": 100}"#,
        r#"{"MessageType": "counter-offer", "buyer": 50, "seller": 100}"#,
        r#"{"MessageType": "counter-offer", "buyer": 45, "seller": 100}"#,
    ];
    let actor_texts = ["I offer 40.", "I offer 50.", "I offer 45.", "I offer 55."];

    // The retry on the third turn consumes the fourth text and sees the hint
    let hints = Arc::new(Mutex::new(Vec::new()));
    let seen = hints.clone();
    let calls = AtomicUsize::new(0);
    let actor_provider = ScriptedProvider::from_fn(move |request| {
        if let Some(last) = request.messages.last() {
            if last.content.starts_with("Propose") {
                seen.lock().unwrap().push(last.content.clone());
            }
        }
        let n = calls.fetch_add(1, Ordering::SeqCst);
        Ok(actor_texts[n.min(actor_texts.len() - 1)].to_string())
    });

    let actor = Actor::new(
        ActorDescription::new("b", "Buyer", "You buy."),
        Arc::new(LLMRouter::new(Arc::new(actor_provider)).with_retry(RetryPolicy::none())),
    );
    let analyst = StructuredAnalyst::new(
        ActorDescription::new("", "", "Classify.").with_kind("Buyer"),
        scripted(analyses.iter().map(|s| s.to_string()).collect()),
    );
    let mut agent = Negotiator::new(actor, analyst).unwrap();
    let mut transcript = Transcript::new("A bike for sale.");

    for _ in 0..3 {
        let message = agent.take_turn(&transcript).await.unwrap();
        transcript.push(message);
    }

    let texts: Vec<_> = transcript.history().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["Buyer : I offer 40.", "Buyer : I offer 50.", "Buyer : I offer 55."]
    );
    assert_eq!(transcript.history()[2].retry_count, 1);
    assert_eq!(agent.validator().best_offer(), 50.0);
    assert_eq!(
        *hints.lock().unwrap(),
        vec!["Propose a new offer that is higher than 50.0.".to_string()]
    );
}
