//! JSON messages exchanged with the coordinator.
//!
//! | Direction            | Request      | Response      |
//! |----------------------|--------------|---------------|
//! | agent → coordinator  | `StatusMsg`  | `StatusReply` |
//! | coordinator → agent  | `Command`    | `StatusReply` |

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Timestamp in the coordinator's RFC 822 layout, e.g. `02 Jan 06 15:04 UTC`.
pub fn timestamp() -> String {
    Utc::now().format("%d %b %y %H:%M UTC").to_string()
}

/// Phase-change notice pushed to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusMsg {
    pub state: String,
    pub inst_name: String,
    #[serde(rename = "UID")]
    pub uid: String,
    pub tstamp: String,
    #[serde(default, rename = "KV", skip_serializing_if = "Option::is_none")]
    pub kv: Option<KvBundle>,
}

/// Named key/value list attached to an extended status (test results).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KvBundle {
    pub name: String,
    #[serde(default, rename = "KVs")]
    pub kvs: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValue {
    pub key: String,
    pub val: String,
}

/// Coordinator's verdict on a status push or a command. A missing reply code
/// reads as OK.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusReply {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reply_code: ReplyCode,
    #[serde(default)]
    pub timestamp: String,
}

/// Reply codes shared by both directions of the protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ReplyCode {
    #[default]
    Ok,
    NoSuchInstance,
    InvalidState,
    BadCommand,
    InvalidStateVariant,
    /// A code this agent does not know about.
    Other(i64),
}

/// Command pushed by the coordinator to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Command {
    pub command: String,
    #[serde(default)]
    pub cmd_code: i64,
    #[serde(default)]
    pub timestamp: String,
}

impl StatusMsg {
    pub fn new(state: &str, inst_name: &str, uid: &str) -> Self {
        Self {
            state: state.to_string(),
            inst_name: inst_name.to_string(),
            uid: uid.to_string(),
            tstamp: timestamp(),
            kv: None,
        }
    }

    /// Attach a bundle. An empty bundle leaves the message un-extended.
    pub fn with_bundle(mut self, bundle: Option<KvBundle>) -> Self {
        self.kv = bundle.filter(|b| !b.name.is_empty() && !b.kvs.is_empty());
        self
    }
}

impl KvBundle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kvs: Vec::new(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.kvs.push(KeyValue {
            key: key.into(),
            val: val.into(),
        });
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.kvs.iter().find(|kv| kv.key == key).map(|kv| kv.val.as_str())
    }
}

impl StatusReply {
    pub fn new(status: impl Into<String>, reply_code: ReplyCode) -> Self {
        Self {
            status: status.into(),
            reply_code,
            timestamp: timestamp(),
        }
    }

    pub fn ok() -> Self {
        Self::new("OK", ReplyCode::Ok)
    }
}

impl From<i64> for ReplyCode {
    fn from(code: i64) -> Self {
        match code {
            0 => ReplyCode::Ok,
            1 => ReplyCode::NoSuchInstance,
            2 => ReplyCode::InvalidState,
            3 => ReplyCode::BadCommand,
            4 => ReplyCode::InvalidStateVariant,
            other => ReplyCode::Other(other),
        }
    }
}

impl From<ReplyCode> for i64 {
    fn from(code: ReplyCode) -> Self {
        match code {
            ReplyCode::Ok => 0,
            ReplyCode::NoSuchInstance => 1,
            ReplyCode::InvalidState => 2,
            ReplyCode::BadCommand => 3,
            ReplyCode::InvalidStateVariant => 4,
            ReplyCode::Other(other) => other,
        }
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplyCode::Ok => write!(f, "ok"),
            ReplyCode::NoSuchInstance => write!(f, "no such instance"),
            ReplyCode::InvalidState => write!(f, "invalid state"),
            ReplyCode::BadCommand => write!(f, "bad command"),
            ReplyCode::InvalidStateVariant => write!(f, "invalid state variant"),
            ReplyCode::Other(code) => write!(f, "unknown reply code {}", code),
        }
    }
}

impl Command {
    /// The only command with defined semantics: begin testing.
    pub const TESTNOW: &'static str = "TESTNOW";
    pub const TESTNOW_CODE: i64 = 0;

    pub fn testnow() -> Self {
        Self {
            command: Self::TESTNOW.to_string(),
            cmd_code: Self::TESTNOW_CODE,
            timestamp: timestamp(),
        }
    }
}
