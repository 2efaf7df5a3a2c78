//! Persisted session records

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::evaluation::Evaluation;
use crate::persona::ActorDescription;
use crate::transcript::Message;

/// Deterministic identifier of a negotiation setup
///
/// Derived from the agent names and roles, so rerunning the same pairing
/// yields the same id and replaces the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One negotiation as written to the session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    /// Agent descriptions without their rules
    pub agents: Vec<ActorDescription>,
    /// Transcript entries after the scenario seed
    pub history: Vec<Message>,
    /// Stored as `{}` when the session was never evaluated
    #[serde(default, with = "empty_object")]
    pub evaluation: Option<Evaluation>,
}

impl SessionRecord {
    /// Read a stored session; `None` when it does not have this shape
    pub fn from_stored(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

/// Id of a stored session, whatever else the record holds
pub fn stored_id(value: &Value) -> Option<SessionId> {
    value.get("id").and_then(Value::as_u64).map(SessionId)
}

/// Top-level document of a session store file
///
/// Sessions stay raw JSON so records written by other tools or older
/// versions are rewritten exactly as they were read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub sessions: Vec<Value>,
    /// Other top-level keys, kept when the store is the scenario file itself
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionDocument {
    /// Stored sessions that read as records, in store order
    pub fn records(&self) -> impl Iterator<Item = SessionRecord> + '_ {
        self.sessions.iter().filter_map(SessionRecord::from_stored)
    }

    pub fn find(&self, id: SessionId) -> Option<SessionRecord> {
        self.sessions
            .iter()
            .find(|s| stored_id(s) == Some(id))
            .and_then(SessionRecord::from_stored)
    }

    /// Append `session`, dropping any stored session with the same id;
    /// returns whether one was replaced
    pub fn upsert(&mut self, id: SessionId, session: Value) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| stored_id(s) != Some(id));
        let replaced = self.sessions.len() != before;
        self.sessions.push(session);
        replaced
    }
}

mod empty_object {
    use serde::de::Deserializer;
    use serde::ser::{SerializeMap, Serializer};
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use crate::evaluation::Evaluation;

    pub fn serialize<S>(value: &Option<Evaluation>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(evaluation) => evaluation.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Evaluation>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match &value {
            Value::Null => Ok(None),
            Value::Object(map) if map.is_empty() => Ok(None),
            _ => serde_json::from_value(value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
