//! Agent Turn Controller
//!
//! One turn is: ask the actor for text, have it classified, validate the
//! classification, and retry at most once with the validator's hint. The
//! turn always yields exactly one message, annotated with how much protocol
//! friction it took to produce.

use std::sync::Arc;

use async_trait::async_trait;
use parley_llm::extract_json;
use parley_types::{
    defined, number_or_nan, ActorDescription, AgentAnalysis, EvaluatorSummary, Message, Role,
    SessionResult, Transcript,
};
use tracing::{debug, info, warn};

use crate::actor::Actor;
use crate::analysis::StructuredAnalyst;
use crate::error::Result;
use crate::metrics::{avg_message_length, utility, AlphabeticTokenizer, Tokenizer};
use crate::validator::{OfferValidator, ValidationMode, Verdict};

/// A participant the arena can schedule
#[async_trait]
pub trait NegotiationAgent: Send + Sync {
    /// Persona of the negotiating actor
    fn description(&self) -> &ActorDescription;

    fn role(&self) -> Role;

    /// Whether this agent closed the negotiation
    fn agreement_reached(&self) -> bool;

    /// Clear agreement and validator state before a new session
    fn reset(&mut self);

    /// Produce this agent's next message
    async fn take_turn(&mut self, transcript: &Transcript) -> Result<Message>;

    /// Per-agent metrics for a finished session
    fn analyze_session(&self, transcript: &Transcript, summary: &EvaluatorSummary) -> AgentAnalysis;

    /// Format-violation and role-integrity score of the longest turn
    ///
    /// `None` when no evaluator is configured or its answer is unreadable.
    async fn hallucination_index(&self, transcript: &Transcript) -> Result<Option<f64>>;
}

#[async_trait]
impl<A: NegotiationAgent + ?Sized> NegotiationAgent for Box<A> {
    fn description(&self) -> &ActorDescription {
        (**self).description()
    }

    fn role(&self) -> Role {
        (**self).role()
    }

    fn agreement_reached(&self) -> bool {
        (**self).agreement_reached()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    async fn take_turn(&mut self, transcript: &Transcript) -> Result<Message> {
        (**self).take_turn(transcript).await
    }

    fn analyze_session(&self, transcript: &Transcript, summary: &EvaluatorSummary) -> AgentAnalysis {
        (**self).analyze_session(transcript, summary)
    }

    async fn hallucination_index(&self, transcript: &Transcript) -> Result<Option<f64>> {
        (**self).hallucination_index(transcript).await
    }
}

/// The standard negotiating agent: actor, analyst and validator
pub struct Negotiator {
    actor: Actor,
    analyst: StructuredAnalyst,
    validator: OfferValidator,
    role: Role,
    json_output: bool,
    agreement: bool,
    hallucination_evaluator: Option<Actor>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Negotiator {
    /// Create an agent; the validator checks the side named by the analyst
    /// persona's `type`, defaulting to the actor's role
    pub fn new(actor: Actor, analyst: StructuredAnalyst) -> Result<Self> {
        let role = actor.description().negotiating_role()?;
        let checked = analyst.description().validated_role().unwrap_or(role);
        let validator = OfferValidator::with_mode(checked, analyst.mode());
        Ok(Self {
            actor,
            analyst,
            validator,
            role,
            json_output: false,
            agreement: false,
            hallucination_evaluator: None,
            tokenizer: Arc::new(AlphabeticTokenizer),
        })
    }

    /// Require the final text of every turn to be valid JSON
    pub fn with_json_output(mut self, json_output: bool) -> Self {
        self.json_output = json_output;
        self
    }

    pub fn with_hallucination_evaluator(mut self, evaluator: Actor) -> Self {
        self.hallucination_evaluator = Some(evaluator);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn validator(&self) -> &OfferValidator {
        &self.validator
    }

    pub fn mode(&self) -> ValidationMode {
        self.validator.mode()
    }

    pub fn json_output(&self) -> bool {
        self.json_output
    }
}

#[async_trait]
impl NegotiationAgent for Negotiator {
    fn description(&self) -> &ActorDescription {
        self.actor.description()
    }

    fn role(&self) -> Role {
        self.role
    }

    fn agreement_reached(&self) -> bool {
        self.agreement
    }

    fn reset(&mut self) {
        self.agreement = false;
        self.validator.reset();
    }

    async fn take_turn(&mut self, transcript: &Transcript) -> Result<Message> {
        let entries = transcript.entries();
        let mut raw = self.actor.ask(entries, None).await?;
        let structured = self.analyst.analyze(transcript, &raw).await?;
        let verdict = self.validator.evaluate(&structured);
        debug!(role = %self.role, verdict = verdict.label(), "Offer validated");

        let mut retry_count = 0;
        let mut format_error = false;
        match verdict {
            Verdict::Deal => {
                info!(role = %self.role, "Agreement reached");
                self.agreement = true;
            }
            Verdict::Invalid { hint } => {
                debug!(role = %self.role, %hint, "Retrying with hint");
                retry_count = 1;
                raw = self.actor.ask(entries, Some(hint.as_str())).await?;
            }
            Verdict::Error { .. } => {
                warn!(role = %self.role, "Unreadable turn analysis");
                retry_count = 1;
                format_error = true;
            }
            Verdict::Valid => {}
        }

        // The shown text decides the format flag
        if self.json_output {
            format_error = serde_json::from_str::<serde_json::Value>(&raw).is_err();
        }

        Ok(Message::turn(self.role, &raw, retry_count, format_error))
    }

    fn analyze_session(&self, transcript: &Transcript, summary: &EvaluatorSummary) -> AgentAnalysis {
        let initial_offer = match self.role {
            Role::Buyer => summary.initial_buyer_offer,
            Role::Seller => summary.initial_price,
        };

        let own: Vec<&Message> = transcript.turns_of(self.role).collect();
        let avg_msg_length =
            avg_message_length(self.tokenizer.as_ref(), own.iter().map(|m| m.text.as_str()));
        let retries = own.iter().map(|m| m.retry_count).sum();
        let format_errors = own.iter().map(|m| m.format_error).sum();

        let utility = match summary.result {
            SessionResult::Deal => defined(utility(
                self.role,
                summary.initial_price,
                summary.initial_buyer_offer,
                summary.final_price,
            )),
            SessionResult::Refusal | SessionResult::Error => None,
        };

        AgentAnalysis {
            role: self.role.to_string(),
            utility,
            initial_offer: defined(initial_offer),
            avg_msg_length,
            retries,
            format_errors,
            max_deception: None,
            avg_deception: None,
            hallucination_index: None,
        }
    }

    async fn hallucination_index(&self, transcript: &Transcript) -> Result<Option<f64>> {
        let Some(evaluator) = &self.hallucination_evaluator else {
            return Ok(None);
        };
        let Some(longest) = transcript.longest_turn() else {
            return Ok(Some(0.0));
        };

        let answer = evaluator
            .ask(&[Message::note("", longest.text.clone())], None)
            .await?;
        let score = match extract_json(&answer) {
            Ok(value) => {
                let format_violation = number_or_nan(value.get("format_violation_score"));
                let role_integrity = number_or_nan(value.get("role_integrity_score"));
                defined((format_violation + role_integrity) / 2.0)
            }
            Err(e) => {
                warn!(role = %self.role, "Hallucination score unreadable: {}", e);
                None
            }
        };
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_llm::{LLMRouter, RetryPolicy, ScriptedProvider};

    fn client(responses: &[&str]) -> Arc<LLMRouter> {
        Arc::new(
            LLMRouter::new(Arc::new(ScriptedProvider::new(responses.to_vec())))
                .with_retry(RetryPolicy::none()),
        )
    }

    fn negotiator(actor_says: &[&str], analyst_says: &[&str]) -> Negotiator {
        let actor = Actor::new(
            ActorDescription::new("neutral-buyer", "Buyer", "You buy."),
            client(actor_says),
        );
        let analyst = StructuredAnalyst::new(
            ActorDescription::new("", "", "Classify.").with_kind("Buyer"),
            client(analyst_says),
        );
        Negotiator::new(actor, analyst).unwrap()
    }

    fn summary(result: SessionResult) -> EvaluatorSummary {
        EvaluatorSummary {
            result,
            initial_price: 100.0,
            initial_buyer_offer: 50.0,
            final_price: 75.0,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_valid_turn() {
        let mut agent = negotiator(
            &["I offer 50."],
            &[r#"{"MessageType": "counter-offer", "buyer": 50, "seller": 100}"#],
        );
        let message = agent.take_turn(&Transcript::new("ctx")).await.unwrap();

        assert_eq!(message.role, "Buyer");
        assert_eq!(message.text, "Buyer : I offer 50.");
        assert_eq!(message.retry_count, 0);
        assert_eq!(message.format_error, 0);
        assert!(!agent.agreement_reached());
        assert_eq!(agent.validator().best_offer(), 50.0);
    }

    #[tokio::test]
    async fn test_invalid_turn_retries_with_hint() {
        let mut agent = negotiator(
            &["I offer 120.", "I offer 90."],
            &[r#"{"MessageType": "counter-offer", "buyer": 120, "seller": 100}"#],
        );
        let message = agent.take_turn(&Transcript::new("ctx")).await.unwrap();

        assert_eq!(message.text, "Buyer : I offer 90.");
        assert_eq!(message.retry_count, 1);
        assert_eq!(message.format_error, 0);
    }

    #[tokio::test]
    async fn test_unreadable_analysis_is_format_error() {
        let mut agent = negotiator(&["Let's talk."], &["no json at all"]);
        let message = agent.take_turn(&Transcript::new("ctx")).await.unwrap();

        assert_eq!(message.text, "Buyer : Let's talk.");
        assert_eq!(message.retry_count, 1);
        assert_eq!(message.format_error, 1);
    }

    #[tokio::test]
    async fn test_deal_sets_agreement_until_reset() {
        let mut agent = negotiator(&["Deal at 75."], &[r#"{"MessageType": "deal"}"#]);
        agent.take_turn(&Transcript::new("ctx")).await.unwrap();
        assert!(agent.agreement_reached());

        agent.reset();
        assert!(!agent.agreement_reached());
        assert_eq!(agent.validator().best_offer(), f64::NEG_INFINITY);
    }

    #[tokio::test]
    async fn test_json_output_checks_final_text() {
        let mut agent = negotiator(
            &[r#"{"MessageType": "message", "text": "hi"}"#],
            &["no json at all"],
        )
        .with_json_output(true);
        let message = agent.take_turn(&Transcript::new("ctx")).await.unwrap();

        // Analysis failed, but the shown text parses
        assert_eq!(message.retry_count, 1);
        assert_eq!(message.format_error, 0);

        let mut agent = negotiator(&["not json"], &[r#"{"MessageType": "message"}"#])
            .with_json_output(true);
        let message = agent.take_turn(&Transcript::new("ctx")).await.unwrap();
        assert_eq!(message.retry_count, 0);
        assert_eq!(message.format_error, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let actor = Actor::new(
            ActorDescription::new("b", "Buyer", "You buy."),
            Arc::new(
                LLMRouter::new(Arc::new(ScriptedProvider::new(Vec::<String>::new())))
                    .with_retry(RetryPolicy::none()),
            ),
        );
        let analyst = StructuredAnalyst::new(ActorDescription::default(), client(&["{}"]));
        let mut agent = Negotiator::new(actor, analyst).unwrap();
        assert!(agent.take_turn(&Transcript::new("ctx")).await.is_err());
    }

    #[test]
    fn test_analyze_session_deal() {
        let agent = negotiator(&["x"], &["{}"]);
        let mut transcript = Transcript::new("A bike for sale");
        transcript.push(Message::turn(Role::Seller, "I want 100", 0, false));
        transcript.push(Message::turn(Role::Buyer, "I offer fifty", 1, false));
        transcript.push(Message::turn(Role::Seller, "Meet at 75", 0, true));
        transcript.push(Message::turn(Role::Buyer, "Deal", 0, true));

        let analysis = agent.analyze_session(&transcript, &summary(SessionResult::Deal));
        assert_eq!(analysis.role, "Buyer");
        assert_eq!(analysis.initial_offer, Some(50.0));
        assert_eq!(analysis.retries, 1);
        assert_eq!(analysis.format_errors, 1);
        // "Buyer I offer fifty" = 4, "Buyer Deal" = 2
        assert_eq!(analysis.avg_msg_length, 3.0);
        assert!((analysis.utility.unwrap() - 0.4902).abs() < 1e-4);
    }

    #[test]
    fn test_analyze_session_without_deal_has_no_utility() {
        let agent = negotiator(&["x"], &["{}"]);
        let analysis = agent.analyze_session(&Transcript::new("ctx"), &summary(SessionResult::Refusal));
        assert_eq!(analysis.utility, None);
        assert_eq!(analysis.avg_msg_length, 0.0);

        let failed = EvaluatorSummary::failed("unreadable");
        let analysis = agent.analyze_session(&Transcript::new("ctx"), &failed);
        assert_eq!(analysis.initial_offer, None);
    }

    #[tokio::test]
    async fn test_hallucination_index() {
        let evaluator = Actor::new(
            ActorDescription::new("HI", "", "Score the message."),
            client(&[r#"{"format_violation_score": 0.2, "role_integrity_score": "0.6"}"#]),
        );
        let agent = negotiator(&["x"], &["{}"]).with_hallucination_evaluator(evaluator);

        assert_eq!(agent.hallucination_index(&Transcript::new("ctx")).await.unwrap(), Some(0.0));

        let mut transcript = Transcript::new("ctx");
        transcript.push(Message::turn(Role::Buyer, "a long message here", 0, false));
        let index = agent.hallucination_index(&transcript).await.unwrap().unwrap();
        assert!((index - 0.4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_hallucination_index_unreadable() {
        let evaluator = Actor::new(ActorDescription::default(), client(&["score: high"]));
        let agent = negotiator(&["x"], &["{}"]).with_hallucination_evaluator(evaluator);
        let mut transcript = Transcript::new("ctx");
        transcript.push(Message::turn(Role::Buyer, "hi", 0, false));
        assert_eq!(agent.hallucination_index(&transcript).await.unwrap(), None);

        let plain = negotiator(&["x"], &["{}"]);
        assert_eq!(plain.hallucination_index(&transcript).await.unwrap(), None);
    }
}
