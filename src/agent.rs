//! Wiring: from a loaded [`Config`] to a running lifecycle.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::activation::{ActivationChannel, ScriptActivator};
use crate::config::Config;
use crate::environment::{Fleet, load_snapshot};
use crate::errors::{OrchestratorError, StatusError};
use crate::functest;
use crate::lifecycle::{Orchestrator, PhaseContext};
use crate::receiver::{CommandInbox, CommandReceiver, rendezvous};
use crate::status::StatusReporter;

pub struct Agent {
    config: Config,
    fleet: Fleet,
    reporter: Arc<StatusReporter>,
    activator: Arc<dyn ActivationChannel>,
    receiver: Option<(CommandReceiver, CommandInbox)>,
}

impl Agent {
    /// Load the snapshot, find ourselves in it and pick the coordinator.
    pub fn prepare(config: Config) -> Result<Self> {
        let env = load_snapshot(&config.env_file)?;
        let url = config.resolve_coordinator_url(&env.coordinator_url);
        info!(coordinator = %url, "coordinator url");

        let fleet = Fleet::identify(env, &config.agent_name)?;
        let reporter = StatusReporter::new(&url).with_retry(config.retry);
        let activator = Arc::new(ScriptActivator::new(&config.app_root));

        Ok(Self {
            config,
            fleet,
            reporter: Arc::new(reporter),
            activator,
            receiver: None,
        })
    }

    /// Replace the activation channel.
    pub fn with_activator(mut self, activator: Arc<dyn ActivationChannel>) -> Self {
        self.activator = activator;
        self
    }

    /// Port the command listener uses: our own app's, else the configured one.
    pub fn listen_port(&self) -> u16 {
        self.fleet.self_port().unwrap_or(self.config.listen_port)
    }

    /// Start the command listener. Idempotent.
    pub async fn listen(&mut self) -> Result<SocketAddr, OrchestratorError> {
        if let Some((receiver, _)) = &self.receiver {
            return Ok(receiver.addr());
        }
        let (sender, inbox) = rendezvous();
        let receiver = CommandReceiver::start(self.listen_port(), sender).await?;
        let addr = receiver.addr();
        self.receiver = Some((receiver, inbox));
        Ok(addr)
    }

    /// Run the lifecycle to completion.
    pub async fn run(mut self) -> Result<Fleet, OrchestratorError> {
        self.listen().await?;
        let Some((_receiver, inbox)) = self.receiver.take() else {
            return Err(OrchestratorError::CommandChannelClosed);
        };
        let ctx = PhaseContext::new(self.activator, self.reporter, self.config.timing);
        Orchestrator::new(ctx, inbox).run(self.fleet).await
    }

    /// Run the status table instead of the lifecycle. Returns the number of
    /// failed cases.
    pub async fn functional_test(self) -> Result<usize, StatusError> {
        functest::run(&self.fleet, &self.reporter).await
    }
}
