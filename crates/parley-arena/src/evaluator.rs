//! End-of-session evaluation

use std::sync::Arc;

use parley_agents::{Actor, NegotiationAgent};
use parley_llm::{extract_json, LLMRouter};
use parley_types::{defined, ActorDescription, Evaluation, EvaluatorSummary, Transcript};
use tracing::{debug, warn};

use crate::error::Result;

/// Reads prices and the outcome off a finished transcript and collects
/// every agent's analysis
pub struct SessionEvaluator {
    actor: Actor,
}

impl SessionEvaluator {
    pub fn new(description: ActorDescription, client: Arc<LLMRouter>) -> Self {
        Self {
            actor: Actor::new(description, client),
        }
    }

    /// Ask the evaluator persona for `{Result, initial_price,
    /// initial_buyer_offer, final_price}`
    pub async fn summarize(&self, transcript: &Transcript) -> Result<EvaluatorSummary> {
        let answer = self.actor.ask(transcript.entries(), None).await?;
        Ok(match extract_json(&answer) {
            Ok(value) => EvaluatorSummary::from_value(&value),
            Err(e) => {
                warn!("Evaluator answer unreadable: {}", e);
                EvaluatorSummary::failed(e.to_string())
            }
        })
    }

    pub async fn evaluate(
        &self,
        transcript: &Transcript,
        agents: &[Box<dyn NegotiationAgent>],
        rounds: u32,
        hallucination_index: bool,
    ) -> Result<Evaluation> {
        let summary = self.summarize(transcript).await?;
        debug!(result = %summary.result, "Session summarized");

        let mut analysis = Vec::with_capacity(agents.len());
        for agent in agents {
            let mut agent_analysis = agent.analyze_session(transcript, &summary);
            if hallucination_index {
                agent_analysis.hallucination_index = agent.hallucination_index(transcript).await?;
            }
            analysis.push(agent_analysis);
        }

        Ok(Evaluation {
            result: summary.result,
            analysis,
            rounds,
            final_price: defined(summary.final_price),
        })
    }
}
