//! What each phase unit actually does.

use std::time::Duration;
use tgo_common::Phase;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::PhaseContext;
use crate::activation::{Action, Reply, Signal};
use crate::environment::Fleet;
use crate::errors::OrchestratorError;
use crate::quorum::{Sweep, drive_all_to};

/// Work the unit for `phase` to completion.
pub(crate) async fn run(
    phase: Phase,
    fleet: &mut Fleet,
    ctx: &PhaseContext,
    cancel: &CancellationToken,
) -> Result<(), OrchestratorError> {
    match phase {
        Phase::Uninitialized => start_apps(fleet, ctx).await,
        Phase::Initializing => {
            let sweep = Sweep::new(Phase::Initializing, Action::Ready, Signal::Ok);
            poll_until_quorum(phase, fleet, &sweep, ctx, ctx.timing.init_poll, cancel).await
        }
        Phase::Ready => {
            let sweep = Sweep::new(Phase::Ready, Action::Ready, Signal::Ok);
            poll_until_quorum(phase, fleet, &sweep, ctx, ctx.timing.init_poll, cancel).await
        }
        Phase::Testing => run_tests(fleet, ctx, cancel).await,
        Phase::Done | Phase::Terminate => Ok(()),
    }
}

/// Sweep until every eligible app is at the target, pausing `interval`
/// between sweeps.
async fn poll_until_quorum(
    phase: Phase,
    fleet: &mut Fleet,
    sweep: &Sweep,
    ctx: &PhaseContext,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<(), OrchestratorError> {
    loop {
        let q = drive_all_to(fleet, sweep, ctx.activator.as_ref(), &ctx.reporter).await?;
        if q.reached() {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled { phase }),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Single pass: prepare and start every peer not yet initializing.
async fn start_apps(fleet: &mut Fleet, ctx: &PhaseContext) -> Result<(), OrchestratorError> {
    info!("Starting all apps");
    for i in fleet.peers() {
        if fleet.app(i).phase >= Phase::Initializing {
            continue;
        }
        let name = fleet.app(i).name.clone();

        if let Reply::Error(detail) = Reply::parse(&ctx.activator.prepare(fleet, i).await) {
            warn!(app = %name, %detail, "resource preparation failed");
        }

        let raw = ctx.activator.activate(fleet, i, Action::Start).await;
        match Reply::parse(&raw) {
            Reply::Signal(Signal::Ok) => {
                info!(app = %name, "start returns ok");
                fleet.advance(i, Phase::Initializing);
                ctx.reporter
                    .report(fleet, i, Phase::Initializing.label(), None)
                    .await?;
            }
            Reply::Error(detail) => warn!(app = %name, %detail, "start returns error"),
            _ => error!(app = %name, reply = %raw.trim_end(), "*** ERROR: unexpected reply to start"),
        }
    }
    // Nothing to start for ourselves.
    fleet.advance_self(Phase::Ready);
    Ok(())
}

/// Kick off the test apps, wait for them to finish, then retire everyone.
async fn run_tests(
    fleet: &mut Fleet,
    ctx: &PhaseContext,
    cancel: &CancellationToken,
) -> Result<(), OrchestratorError> {
    for i in fleet.peers() {
        let app = fleet.app(i);
        if app.phase >= Phase::Testing {
            continue;
        }
        let (name, is_test) = (app.name.clone(), app.is_test);

        if is_test {
            let raw = ctx.activator.activate(fleet, i, Action::Test).await;
            match Reply::parse(&raw) {
                Reply::Signal(Signal::Ok) => info!(app = %name, "test returns ok"),
                Reply::Error(detail) => warn!(app = %name, %detail, "test returns error"),
                _ => error!(app = %name, reply = %raw.trim_end(), "*** ERROR: unexpected reply to test"),
            }
        }
        fleet.advance(i, Phase::Testing);
        ctx.reporter
            .report(fleet, i, Phase::Testing.label(), None)
            .await?;
    }

    fleet.advance_self(Phase::Done);

    let sweep = Sweep::new(Phase::Done, Action::TestStatus, Signal::Done)
        .tests_only()
        .collect_results();
    poll_until_quorum(Phase::Testing, fleet, &sweep, ctx, ctx.timing.test_poll, cancel).await?;

    for i in fleet.peers() {
        if fleet.app(i).is_test {
            continue;
        }
        if fleet.advance(i, Phase::Done) {
            debug!(app = %fleet.app(i).name, "retiring non-test app");
            ctx.reporter
                .report(fleet, i, Phase::Done.label(), None)
                .await?;
        }
    }
    Ok(())
}
