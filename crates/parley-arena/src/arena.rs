//! Session Scheduler
//!
//! Agents speak in registration order, one turn each per round. The
//! session ends the moment an agent reaches agreement, or when the round
//! budget runs out. Either way the transcript is evaluated and saved.

use std::path::{Path, PathBuf};

use parley_agents::{NegotiationAgent, ScenarioConfig};
use parley_types::{SessionId, SessionRecord, Transcript};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{ArenaError, Result};
use crate::evaluator::SessionEvaluator;
use crate::store::SessionStore;

/// Default round budget
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

/// Arena configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    pub max_rounds: u32,
    /// Score every agent's longest turn for hallucinations when saving
    pub hallucination_index: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            hallucination_index: false,
        }
    }
}

/// Session identifier for a set of `(name, role)` participants
///
/// The concatenated names separate the roles, so the id depends on both
/// and on their order. The id is the SHA-256 digest modulo 2^64.
pub fn session_id<'a, I>(participants: I) -> SessionId
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let (names, roles): (Vec<&str>, Vec<&str>) = participants.into_iter().unzip();
    let key = roles.join(&names.concat());

    let digest = Sha256::digest(key.as_bytes());
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[24..]);
    SessionId(u64::from_be_bytes(low))
}

/// A negotiation arena over one scenario
pub struct Arena {
    scenario: String,
    agents: Vec<Box<dyn NegotiationAgent>>,
    transcript: Transcript,
    evaluator: SessionEvaluator,
    save_path: PathBuf,
    config: ArenaConfig,
    rounds: u32,
}

impl Arena {
    pub fn new(
        scenario: impl Into<String>,
        evaluator: SessionEvaluator,
        save_path: impl Into<PathBuf>,
    ) -> Self {
        let scenario = scenario.into();
        Self {
            transcript: Transcript::new(scenario.clone()),
            scenario,
            agents: Vec::new(),
            evaluator,
            save_path: save_path.into(),
            config: ArenaConfig::default(),
            rounds: 0,
        }
    }

    /// Arena over a scenario file, saving back into that same file by default
    pub fn load_session(scenario_path: impl AsRef<Path>, evaluator: SessionEvaluator) -> Result<Self> {
        let path = scenario_path.as_ref();
        let scenario = ScenarioConfig::load(path)?;
        Ok(Self::new(scenario.scenario, evaluator, path))
    }

    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = path.into();
        self
    }

    pub fn with_config(mut self, config: ArenaConfig) -> Self {
        self.config = config;
        self
    }

    /// Add an agent after the ones already registered, resetting its state
    pub fn register<A: NegotiationAgent + 'static>(self, agent: A) -> Self {
        self.register_boxed(Box::new(agent))
    }

    pub fn register_boxed(mut self, mut agent: Box<dyn NegotiationAgent>) -> Self {
        agent.reset();
        debug!(name = %agent.description().name, role = %agent.role(), "Agent registered");
        self.agents.push(agent);
        self
    }

    pub fn agents(&self) -> &[Box<dyn NegotiationAgent>] {
        &self.agents
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Rounds started in the last session
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn session_id(&self) -> SessionId {
        session_id(
            self.agents
                .iter()
                .map(|a| (a.description().name.as_str(), a.description().role.as_str())),
        )
    }

    /// Run a session with the configured round budget
    pub async fn run(&mut self) -> Result<SessionRecord> {
        self.negotiate(self.config.max_rounds).await
    }

    /// Run a session of at most `max_rounds` rounds, then evaluate and save it
    ///
    /// Each call starts from the scenario seed with freshly reset agents.
    /// A transport failure during a turn aborts the session unsaved.
    pub async fn negotiate(&mut self, max_rounds: u32) -> Result<SessionRecord> {
        if self.agents.is_empty() {
            return Err(ArenaError::NoAgents);
        }

        self.transcript = Transcript::new(self.scenario.clone());
        self.rounds = 0;
        for agent in &mut self.agents {
            agent.reset();
        }

        info!(id = %self.session_id(), max_rounds, agents = self.agents.len(), "Negotiation started");

        'session: for round in 1..=max_rounds {
            self.rounds = round;
            debug!(round, "Round started");

            for agent in &mut self.agents {
                let message = agent.take_turn(&self.transcript).await?;
                self.transcript.push(message);
                if agent.agreement_reached() {
                    info!(round, role = %agent.role(), "Agreement reached, session over");
                    break 'session;
                }
            }

            if self.agents.iter().any(|a| a.agreement_reached()) {
                break;
            }
        }

        self.save().await
    }

    async fn save(&self) -> Result<SessionRecord> {
        let evaluation = match self
            .evaluator
            .evaluate(
                &self.transcript,
                &self.agents,
                self.rounds,
                self.config.hallucination_index,
            )
            .await
        {
            Ok(evaluation) => Some(evaluation),
            Err(e) => {
                warn!("Error during evaluation: {}", e);
                None
            }
        };

        let record = SessionRecord {
            id: self.session_id(),
            agents: self
                .agents
                .iter()
                .map(|a| a.description().without_rules())
                .collect(),
            history: self.transcript.history().to_vec(),
            evaluation,
        };

        let store = SessionStore::open(&self.save_path)?;
        store.upsert(&self.scenario, &record)?;
        info!(
            id = %record.id,
            path = %self.save_path.display(),
            messages = record.history.len(),
            "Session saved"
        );
        Ok(record)
    }
}
