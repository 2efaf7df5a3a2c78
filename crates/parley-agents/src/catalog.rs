//! Scenario files, the rules catalog and agent construction
//!
//! A scenario file holds the seed text and pools of candidate personas:
//!
//! ```json
//! { "scenario": "...", "buyers": [...], "sellers": [...], "hidden_info": "..." }
//! ```
//!
//! The rules catalog maps persona keys to descriptions: validators under
//! `Buyer`/`Seller`, JSON-output rules under `JsonBuyer`/`JsonSeller`, and
//! the `Evaluator`, `DI_Evaluator` and `HI_Evaluator_{Role}_{JSON|NA}`
//! evaluators.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parley_llm::LLMRouter;
use parley_types::{ActorDescription, Role};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actor::Actor;
use crate::agent::Negotiator;
use crate::analysis::StructuredAnalyst;
use crate::deceptive::DeceptiveAgent;
use crate::error::{AgentError, Result};
use crate::validator::ValidationMode;

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| AgentError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| AgentError::InvalidConfig {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Which persona list of a scenario to pick from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPool {
    Buyers,
    Sellers,
}

impl AgentPool {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Buyer => Self::Buyers,
            Role::Seller => Self::Sellers,
        }
    }
}

impl fmt::Display for AgentPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buyers => f.write_str("buyers"),
            Self::Sellers => f.write_str("sellers"),
        }
    }
}

/// Contents of a scenario file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub scenario: String,
    #[serde(default)]
    pub buyers: Vec<ActorDescription>,
    #[serde(default)]
    pub sellers: Vec<ActorDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_info: Option<String>,
}

impl ScenarioConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path.as_ref())
    }

    pub fn pool(&self, pool: AgentPool) -> &[ActorDescription] {
        match pool {
            AgentPool::Buyers => &self.buyers,
            AgentPool::Sellers => &self.sellers,
        }
    }

    /// Persona called `name` in the given pool
    pub fn find(&self, pool: AgentPool, name: &str) -> Result<&ActorDescription> {
        self.pool(pool)
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| AgentError::AgentNotFound {
                name: name.to_string(),
                pool: pool.to_string(),
            })
    }
}

/// Persona descriptions keyed by identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RulesCatalog {
    personas: HashMap<String, ActorDescription>,
}

impl RulesCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path.as_ref())
    }

    pub fn insert(&mut self, key: impl Into<String>, description: ActorDescription) {
        self.personas.insert(key.into(), description);
    }

    pub fn get(&self, key: &str) -> Result<&ActorDescription> {
        self.personas
            .get(key)
            .ok_or_else(|| AgentError::PersonaNotFound {
                key: key.to_string(),
            })
    }

    /// Validator persona for a side
    pub fn validator(&self, role: Role) -> Result<&ActorDescription> {
        self.get(role.as_str())
    }

    /// Extra rules for agents that must answer in JSON
    pub fn json_rules(&self, role: Role) -> Result<&[String]> {
        Ok(&self.get(&format!("Json{}", role))?.rules)
    }

    /// End-of-session evaluator persona
    pub fn evaluator(&self) -> Result<&ActorDescription> {
        self.get("Evaluator")
    }

    pub fn deception_evaluator(&self) -> Result<&ActorDescription> {
        self.get("DI_Evaluator")
    }

    pub fn hallucination_evaluator(&self, role: Role, json_output: bool) -> Option<&ActorDescription> {
        let format = if json_output { "JSON" } else { "NA" };
        self.personas.get(&format!("HI_Evaluator_{}_{}", role, format))
    }
}

/// Model clients handed to every agent
#[derive(Clone)]
pub struct AgentClients {
    /// Generates the negotiating text
    pub actor: Arc<LLMRouter>,
    /// Structured analysis and scoring calls
    pub evaluator: Arc<LLMRouter>,
}

/// How an agent is assembled from its persona
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    pub json_output: bool,
    pub mode: ValidationMode,
    /// Appended to the persona rules
    pub extra_instructions: Option<String>,
}

/// Builds agents from scenario personas and the rules catalog
pub struct AgentFactory {
    rules: RulesCatalog,
    clients: AgentClients,
}

impl AgentFactory {
    pub fn new(rules: RulesCatalog, clients: AgentClients) -> Self {
        Self { rules, clients }
    }

    pub fn rules(&self) -> &RulesCatalog {
        &self.rules
    }

    pub fn clients(&self) -> &AgentClients {
        &self.clients
    }

    /// The persona as the actor will see it, with any extra and JSON rules
    pub fn persona(
        &self,
        scenario: &ScenarioConfig,
        pool: AgentPool,
        name: &str,
        options: &AgentOptions,
    ) -> Result<ActorDescription> {
        let mut description = scenario.find(pool, name)?.clone();
        if let Some(extra) = options.extra_instructions.as_ref().filter(|s| !s.is_empty()) {
            description.rules.push(extra.clone());
        }
        if options.json_output {
            let role = description.negotiating_role()?;
            description
                .rules
                .extend(self.rules.json_rules(role)?.iter().cloned());
        }
        Ok(description)
    }

    /// A standard negotiating agent
    pub fn negotiator(
        &self,
        scenario: &ScenarioConfig,
        pool: AgentPool,
        name: &str,
        options: &AgentOptions,
    ) -> Result<Negotiator> {
        let description = self.persona(scenario, pool, name, options)?;
        let role = description.negotiating_role()?;
        debug!(name, %role, json = options.json_output, "Building negotiator");

        let validator = self.rules.validator(role)?.clone();
        let analyst = StructuredAnalyst::new(validator, self.clients.evaluator.clone())
            .with_mode(options.mode);
        let actor = Actor::new(description, self.clients.actor.clone());

        let mut agent = Negotiator::new(actor, analyst)?.with_json_output(options.json_output);
        if let Some(hi) = self.rules.hallucination_evaluator(role, options.json_output) {
            agent = agent.with_hallucination_evaluator(Actor::new(
                hi.clone(),
                self.clients.evaluator.clone(),
            ));
        }
        Ok(agent)
    }

    /// A negotiator whose turns are scored against the scenario's hidden info
    pub fn deceptive(
        &self,
        scenario: &ScenarioConfig,
        pool: AgentPool,
        name: &str,
        options: &AgentOptions,
    ) -> Result<DeceptiveAgent<Negotiator>> {
        let hidden_info = scenario
            .hidden_info
            .clone()
            .ok_or(AgentError::MissingHiddenInfo)?;
        let inner = self.negotiator(scenario, pool, name, options)?;
        let evaluator = Actor::new(
            self.rules.deception_evaluator()?.clone(),
            self.clients.evaluator.clone(),
        );
        Ok(DeceptiveAgent::new(inner, hidden_info, evaluator))
    }
}
