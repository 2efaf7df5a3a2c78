//! Negotiate command - Run one buyer/seller session and save it

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::Args;
use colored::*;
use tracing::info;

use parley_agents::{
    AgentClients, AgentFactory, AgentOptions, AgentPool, NegotiationAgent, RulesCatalog,
    ScenarioConfig, ValidationMode,
};
use parley_arena::{Arena, ArenaConfig, SessionEvaluator, DEFAULT_MAX_ROUNDS};
use parley_llm::{ApiKeys, LLMRouter, ProviderKind};

use crate::display;

#[derive(Args, Debug)]
pub struct NegotiateArgs {
    /// Scenario file with the buyer and seller personas
    #[arg(long)]
    pub scenario: PathBuf,

    /// Rules catalog (validators, evaluators, JSON rules)
    #[arg(long)]
    pub rules: PathBuf,

    /// Buyer persona name
    #[arg(long)]
    pub buyer: String,

    /// Seller persona name
    #[arg(long)]
    pub seller: String,

    /// Scenario file to take the seller persona and hidden info from;
    /// makes the seller deceptive
    #[arg(long)]
    pub seller_scenario: Option<PathBuf>,

    /// Score the seller's turns against the scenario's hidden info
    #[arg(long)]
    pub deceptive: bool,

    /// Extra instruction appended to the seller's rules
    #[arg(long)]
    pub instructions: Option<String>,

    /// Ask both agents to answer in JSON
    #[arg(long)]
    pub json: bool,

    /// Trust the agents' own JSON instead of a model analysis
    #[arg(long)]
    pub non_reflexive: bool,

    /// Maximum number of rounds
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    pub max_rounds: u32,

    /// Session store (defaults to the scenario file)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// LLM provider for the negotiating agents (groq, gemini)
    #[arg(long, env = "PARLEY_LLM_PROVIDER", default_value = "groq")]
    pub provider: String,

    /// Model override for the negotiating agents
    #[arg(long)]
    pub model: Option<String>,

    /// JSON file with GROQ_KEY / GENAI_KEY
    #[arg(long)]
    pub api_keys: Option<PathBuf>,

    /// Compute the hallucination index of every agent
    #[arg(long)]
    pub hallucination_index: bool,
}

impl NegotiateArgs {
    fn options(&self, extra_instructions: Option<String>) -> AgentOptions {
        AgentOptions {
            json_output: self.json,
            mode: if self.non_reflexive {
                ValidationMode::NonReflexive
            } else {
                ValidationMode::Reflexive
            },
            extra_instructions,
        }
    }
}

/// Run a negotiation
pub async fn run_negotiation(args: NegotiateArgs) -> anyhow::Result<()> {
    let kind = ProviderKind::from_str(&args.provider)
        .filter(|k| *k != ProviderKind::Scripted)
        .ok_or_else(|| anyhow!("unknown provider '{}' (expected groq or gemini)", args.provider))?;

    let keys = match &args.api_keys {
        Some(path) => ApiKeys::from_file(path)?,
        None => ApiKeys::from_env(),
    };
    let actor_client = Arc::new(LLMRouter::with_keys(kind, &keys, args.model.as_deref())?);
    let evaluator_client = Arc::new(LLMRouter::evaluator(&keys)?);

    let scenario = ScenarioConfig::load(&args.scenario)?;
    let factory = AgentFactory::new(
        RulesCatalog::load(&args.rules)?,
        AgentClients {
            actor: actor_client,
            evaluator: evaluator_client.clone(),
        },
    );

    let buyer = factory.negotiator(&scenario, AgentPool::Buyers, &args.buyer, &args.options(None))?;

    let seller_options = args.options(args.instructions.clone());
    let seller: Box<dyn NegotiationAgent> = match &args.seller_scenario {
        Some(path) => {
            let seller_scenario = ScenarioConfig::load(path)?;
            Box::new(factory.deceptive(&seller_scenario, AgentPool::Sellers, &args.seller, &seller_options)?)
        }
        None if args.deceptive => {
            Box::new(factory.deceptive(&scenario, AgentPool::Sellers, &args.seller, &seller_options)?)
        }
        None => Box::new(factory.negotiator(&scenario, AgentPool::Sellers, &args.seller, &seller_options)?),
    };

    let evaluator = SessionEvaluator::new(factory.rules().evaluator()?.clone(), evaluator_client);
    let mut arena = Arena::load_session(&args.scenario, evaluator)?
        .with_config(ArenaConfig {
            max_rounds: args.max_rounds,
            hallucination_index: args.hallucination_index,
        })
        .register(buyer)
        .register_boxed(seller);
    if let Some(out) = &args.out {
        arena = arena.with_save_path(out);
    }

    display::section("Negotiation");
    display::labeled("Scenario", &args.scenario.display().to_string());
    display::labeled("Buyer", &args.buyer);
    display::labeled("Seller", &args.seller);
    display::labeled("Provider", &kind.to_string());
    display::labeled("Session", &arena.session_id().to_string());
    println!();

    info!(provider = %kind, max_rounds = args.max_rounds, "Starting negotiation");
    let record = arena.run().await?;

    for message in &record.history {
        display::message(message);
    }

    display::section("Evaluation");
    match &record.evaluation {
        Some(evaluation) => display::evaluation(evaluation),
        None => display::warning("Session could not be evaluated"),
    }
    println!();
    display::success(&format!(
        "Session {} saved to {}",
        record.id.to_string().bright_yellow(),
        arena.save_path().display()
    ));

    Ok(())
}
