//! Sequencing the phases and talking to the coordinator at their boundaries.

use tgo_common::{Command, Phase};
use tracing::{error, info, warn};

use super::{PhaseContext, PhaseUnit};
use crate::environment::Fleet;
use crate::errors::OrchestratorError;
use crate::receiver::CommandInbox;

pub struct Orchestrator {
    ctx: PhaseContext,
    inbox: CommandInbox,
}

impl Orchestrator {
    pub fn new(ctx: PhaseContext, inbox: CommandInbox) -> Self {
        Self { ctx, inbox }
    }

    /// Drive the whole lifecycle. Returns the final fleet once every app is
    /// done; any error means the run cannot continue.
    pub async fn run(mut self, mut fleet: Fleet) -> Result<Fleet, OrchestratorError> {
        fleet.advance_self(Phase::Initializing);
        self.ctx
            .reporter
            .report_self(&fleet, Phase::Initializing.label())
            .await?;

        fleet = self.run_phase(Phase::Uninitialized, fleet).await?;
        fleet = self.run_phase(Phase::Initializing, fleet).await?;
        fleet = self.run_phase(Phase::Ready, fleet).await?;

        self.ctx
            .reporter
            .report_self(&fleet, Phase::Ready.label())
            .await?;

        info!("waiting for the coordinator to start testing");
        self.await_command().await?;

        fleet.advance_self(Phase::Testing);
        self.ctx
            .reporter
            .report_self(&fleet, Phase::Testing.label())
            .await?;

        fleet = self.run_phase(Phase::Testing, fleet).await?;

        self.ctx
            .reporter
            .report_self(&fleet, Phase::Done.label())
            .await?;

        // Apps are never told to exit; the coordinator tears the fleet down.
        info!("all phases complete, terminate is left to the coordinator");
        Ok(fleet)
    }

    async fn run_phase(&self, phase: Phase, fleet: Fleet) -> Result<Fleet, OrchestratorError> {
        let unit = PhaseUnit::spawn(phase, fleet, self.ctx.clone());
        unit.await_completion(self.ctx.timing.deadline(phase)).await
    }

    /// Block until the command listener hands over a command, then release it.
    async fn await_command(&mut self) -> Result<(), OrchestratorError> {
        let limit = self.ctx.timing.command_timeout;
        match tokio::time::timeout(limit, self.inbox.recv()).await {
            Ok(Some(handoff)) => {
                if handoff.code == Command::TESTNOW_CODE {
                    info!(code = handoff.code, "coordinator sent TESTNOW, proceeding to test");
                } else {
                    warn!(code = handoff.code, "unexpected command code, proceeding anyway");
                }
                handoff.acknowledge();
                Ok(())
            }
            Ok(None) => Err(OrchestratorError::CommandChannelClosed),
            Err(_) => {
                error!(
                    "We have not heard from the coordinator in {}s. Giving up!",
                    limit.as_secs()
                );
                Err(OrchestratorError::CommandTimeout { after: limit })
            }
        }
    }
}
