//! Environment snapshot: the topology the coordinator hands to every agent.
//!
//! The JSON form uses the coordinator's PascalCase names:
//!
//! ```json
//! {
//!   "EnvName": "accord-test",
//!   "UhuraURL": "http://coordinator:8100/",
//!   "UhuraPort": 8100,
//!   "ThisInst": 0,
//!   "Instances": [
//!     {
//!       "InstName": "main", "OS": "Linux", "HostName": "main.example.com",
//!       "Apps": [
//!         { "UID": "tgo", "Name": "tgo", "Repo": "ext-tools/tgo", "UPort": 8101, "IsTest": false, "RunCmd": "" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::phase::Phase;

/// Parsed environment snapshot.
///
/// Everything except each app's [`Phase`] is immutable input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvSnapshot {
    #[serde(default)]
    pub env_name: String,
    #[serde(default, rename = "UhuraURL")]
    pub coordinator_url: String,
    #[serde(default, rename = "UhuraPort")]
    pub coordinator_port: u16,
    /// Index of the instance this agent runs on.
    #[serde(default)]
    pub this_inst: usize,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// A host-level group of co-located apps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instance {
    pub inst_name: String,
    #[serde(default, rename = "OS")]
    pub os: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub apps: Vec<App>,
}

/// A managed app within an instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct App {
    #[serde(rename = "UID")]
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default, rename = "UPort")]
    pub port: u16,
    #[serde(default)]
    pub is_test: bool,
    /// Command template launched instead of the activation script for the
    /// app's role action. Empty means "use the activation script".
    #[serde(default)]
    pub run_cmd: String,
    /// Optional resource preparation run before the app is started.
    #[serde(default, rename = "AppRes", skip_serializing_if = "Option::is_none")]
    pub resources: Option<AppResources>,
    /// Run state; never part of the coordinator's input.
    #[serde(skip)]
    pub phase: Phase,
}

/// Resources an app needs prepared before it can start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppResources {
    #[serde(default)]
    pub cmd: String,
}

impl EnvSnapshot {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// The instance this agent manages, if `ThisInst` is in range.
    pub fn current(&self) -> Option<&Instance> {
        self.instances.get(self.this_inst)
    }

    pub fn current_mut(&mut self) -> Option<&mut Instance> {
        self.instances.get_mut(self.this_inst)
    }

    pub fn instance_named(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.inst_name == name)
    }
}

impl Instance {
    pub fn app_by_uid(&self, uid: &str) -> Option<&App> {
        self.apps.iter().find(|a| a.uid == uid)
    }

    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.apps.iter().position(|a| a.name == name)
    }
}

impl App {
    pub fn has_run_cmd(&self) -> bool {
        !self.run_cmd.trim().is_empty()
    }

    pub fn resource_cmd(&self) -> Option<&str> {
        self.resources
            .as_ref()
            .map(|r| r.cmd.trim())
            .filter(|c| !c.is_empty())
    }
}
