//! A phase unit: one phase worked on its own task.
//!
//! Completion is a two-step handshake. The unit sends the fleet back, then
//! waits for the orchestrator's acknowledgement before it retires; the
//! orchestrator does not start the next phase until the unit has retired.

use std::time::Duration;
use tgo_common::Phase;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{PhaseContext, work};
use crate::environment::Fleet;
use crate::errors::OrchestratorError;

enum Outcome {
    Completed {
        fleet: Fleet,
        ack: oneshot::Sender<()>,
    },
    Failed(OrchestratorError),
}

pub struct PhaseUnit {
    phase: Phase,
    done: oneshot::Receiver<Outcome>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PhaseUnit {
    /// Start working `phase`, taking ownership of the fleet.
    pub fn spawn(phase: Phase, mut fleet: Fleet, ctx: PhaseContext) -> Self {
        let (done_tx, done) = oneshot::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            info!(%phase, "entering phase");
            match work::run(phase, &mut fleet, &ctx, &token).await {
                Ok(()) => {
                    let (ack, acked) = oneshot::channel();
                    if done_tx.send(Outcome::Completed { fleet, ack }).is_err() {
                        debug!(%phase, "nobody waiting for phase completion");
                        return;
                    }
                    let _ = acked.await;
                    debug!(%phase, "phase unit exiting");
                }
                Err(e) => {
                    let _ = done_tx.send(Outcome::Failed(e));
                }
            }
        });

        Self {
            phase,
            done,
            cancel,
            task,
        }
    }

    /// Wait up to `limit` for the unit to finish and take the fleet back.
    ///
    /// On timeout the unit is told to stop at its next opportunity and
    /// abandoned.
    pub async fn await_completion(self, limit: Duration) -> Result<Fleet, OrchestratorError> {
        let phase = self.phase;
        match tokio::time::timeout(limit, self.done).await {
            Ok(Ok(Outcome::Completed { fleet, ack })) => {
                info!(%phase, "phase completed");
                let _ = ack.send(());
                let _ = self.task.await;
                Ok(fleet)
            }
            Ok(Ok(Outcome::Failed(e))) => Err(e),
            Ok(Err(_)) => Err(OrchestratorError::UnitVanished { phase }),
            Err(_) => {
                error!(
                    %phase,
                    "phase has not responded in {}s. Giving up!",
                    limit.as_secs()
                );
                self.cancel.cancel();
                Err(OrchestratorError::PhaseTimeout {
                    phase,
                    after: limit,
                })
            }
        }
    }
}
