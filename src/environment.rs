//! Loading the environment snapshot and working out who this agent is.

use anyhow::{Context, Result, bail};
use std::path::Path;
use tgo_common::{App, EnvSnapshot, Instance, Phase};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_COORDINATOR_URL;

/// Read the snapshot file.
///
/// A missing file is not an error: the agent runs in test mode against a
/// local coordinator with nothing to manage. A file that exists but cannot be
/// parsed is.
pub fn load_snapshot(path: &Path) -> Result<EnvSnapshot> {
    if !path.exists() {
        warn!(path = %path.display(), "no such file or directory");
        info!(url = DEFAULT_COORDINATOR_URL, "assuming test mode");
        return Ok(EnvSnapshot {
            coordinator_url: DEFAULT_COORDINATOR_URL.to_string(),
            ..Default::default()
        });
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read environment snapshot: {}", path.display()))?;
    debug!("{}", content);

    EnvSnapshot::from_json(&content)
        .with_context(|| format!("Failed to parse environment snapshot: {}", path.display()))
}

/// The managed instance plus the position of this agent's own app in it.
///
/// This is the only handle to the run state. It is moved into whichever phase
/// unit is active and handed back when the unit completes, so at most one
/// piece of code can change an app's phase at any time.
#[derive(Debug, Clone)]
pub struct Fleet {
    env: EnvSnapshot,
    this_app: Option<usize>,
    agent_name: String,
}

impl Fleet {
    /// Locate the current instance and, within it, the app named `agent_name`.
    ///
    /// An out-of-range instance index is fatal. In test mode (no instances at
    /// all) an empty instance is synthesized. If the agent's own app is not
    /// listed it runs degraded.
    pub fn identify(mut env: EnvSnapshot, agent_name: &str) -> Result<Self> {
        if env.instances.is_empty() {
            env.instances.push(Instance {
                inst_name: "localhost".to_string(),
                ..Default::default()
            });
            env.this_inst = 0;
        }
        let Some(inst) = env.current() else {
            bail!(
                "Snapshot names instance {} but only {} are defined",
                env.this_inst,
                env.instances.len()
            );
        };

        let this_app = inst.position_by_name(agent_name);
        match this_app {
            Some(i) => info!(
                instance = env.this_inst,
                name = %inst.inst_name,
                app_index = i,
                "identified self"
            ),
            None => warn!(
                instance = env.this_inst,
                "*** NOTICE *** did not find {} in the environment snapshot", agent_name
            ),
        }

        Ok(Self {
            env,
            this_app,
            agent_name: agent_name.to_string(),
        })
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    pub fn instance(&self) -> &Instance {
        &self.env.instances[self.env.this_inst]
    }

    pub fn apps(&self) -> &[App] {
        &self.instance().apps
    }

    pub fn app(&self, index: usize) -> &App {
        &self.instance().apps[index]
    }

    /// Move an app's phase forward. Returns false, leaving the app untouched,
    /// if it is already at or past `phase`.
    pub fn advance(&mut self, index: usize, phase: Phase) -> bool {
        let Some(app) = self
            .env
            .current_mut()
            .and_then(|inst| inst.apps.get_mut(index))
        else {
            return false;
        };
        if phase > app.phase {
            app.phase = phase;
            true
        } else {
            false
        }
    }

    /// Indices of every app except this agent's own, in snapshot order.
    pub fn peers(&self) -> Vec<usize> {
        (0..self.apps().len())
            .filter(|&i| Some(i) != self.this_app)
            .collect()
    }

    /// UID used for this agent's own status pushes.
    pub fn self_uid(&self) -> &str {
        match self.this_app {
            Some(i) => &self.app(i).uid,
            None => &self.agent_name,
        }
    }

    /// Port the command listener binds to, if the snapshot assigns one.
    pub fn self_port(&self) -> Option<u16> {
        self.this_app
            .map(|i| self.app(i).port)
            .filter(|&port| port != 0)
    }

    /// Move this agent's own phase forward. Never moves it back.
    pub fn advance_self(&mut self, phase: Phase) {
        if let Some(i) = self.this_app {
            self.advance(i, phase);
        }
    }
}
