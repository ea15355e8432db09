//! Quorum polling: drive every peer app towards a phase and count how many got
//! there.
//!
//! The agent's own app is never activated. It is always credited as having
//! reached the target, on both sides of the count; peer agents on other hosts
//! count the same way.

use tgo_common::{KvBundle, Phase};
use tracing::{debug, error, info, warn};

use crate::activation::{Action, ActivationChannel, Reply, Signal, results_bundle};
use crate::environment::Fleet;
use crate::errors::StatusError;
use crate::status::StatusReporter;

/// Outcome of a count: `count` of `possible` apps are at or past the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quorum {
    pub count: usize,
    pub possible: usize,
}

impl Quorum {
    pub fn reached(&self) -> bool {
        self.count == self.possible
    }
}

impl std::fmt::Display for Quorum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {}", self.count, self.possible)
    }
}

/// Count the apps at or beyond `target`. With `tests_only`, non-test peers
/// are left out of both numbers.
pub fn quorum(fleet: &Fleet, target: Phase, tests_only: bool) -> Quorum {
    let mut q = Quorum {
        count: 1,
        possible: 1,
    };
    for i in fleet.peers() {
        let app = fleet.app(i);
        if tests_only && !app.is_test {
            continue;
        }
        q.possible += 1;
        if app.phase >= target {
            q.count += 1;
        }
    }
    q
}

/// One kind of sweep over the peers.
#[derive(Debug, Clone)]
pub struct Sweep {
    pub target: Phase,
    pub action: Action,
    /// Reply that moves an app to `target`
    pub expected: Signal,
    /// Status label pushed for each app that advances
    pub label: &'static str,
    pub tests_only: bool,
    /// Fetch `testresults` from an app that advances and attach them
    pub collect_results: bool,
}

impl Sweep {
    pub fn new(target: Phase, action: Action, expected: Signal) -> Self {
        Self {
            target,
            action,
            expected,
            label: target.label(),
            tests_only: false,
            collect_results: false,
        }
    }

    pub fn tests_only(mut self) -> Self {
        self.tests_only = true;
        self
    }

    pub fn collect_results(mut self) -> Self {
        self.collect_results = true;
        self
    }

    /// Whether `reply` means "not yet" rather than an anomaly. Only a
    /// `teststatus` poll may answer `testing`.
    pub fn is_pending(&self, reply: &Reply) -> bool {
        self.action == Action::TestStatus && matches!(reply, Reply::Signal(Signal::Testing))
    }
}

/// Make one pass over the peers, then count.
///
/// Apps already at or past the target are left alone. An app that answers
/// with the expected signal is advanced and its status pushed before the next
/// app is looked at. Error and unexpected replies leave it where it was, to
/// be retried on the next pass. A failed push ends the pass.
pub async fn drive_all_to(
    fleet: &mut Fleet,
    sweep: &Sweep,
    activator: &dyn ActivationChannel,
    reporter: &StatusReporter,
) -> Result<Quorum, StatusError> {
    for i in fleet.peers() {
        let app = fleet.app(i);
        if sweep.tests_only && !app.is_test {
            continue;
        }
        if app.phase >= sweep.target {
            continue;
        }
        let name = app.name.clone();

        let raw = activator.activate(fleet, i, sweep.action).await;
        match Reply::parse(&raw) {
            reply if reply.is(sweep.expected) => {
                debug!(app = %name, action = %sweep.action, reply = sweep.expected.as_str(), "app advanced");
                let bundle = if sweep.collect_results {
                    fetch_results(fleet, i, activator).await
                } else {
                    None
                };
                fleet.advance(i, sweep.target);
                reporter.report(fleet, i, sweep.label, bundle).await?;
            }
            reply if sweep.is_pending(&reply) => {
                debug!(app = %name, "still testing");
            }
            Reply::Error(detail) => {
                warn!(app = %name, action = %sweep.action, %detail, "activation returned error");
            }
            Reply::Signal(other) => {
                error!(app = %name, action = %sweep.action, reply = other.as_str(), "*** ERROR: unexpected reply");
            }
            Reply::Unexpected(text) => {
                error!(app = %name, action = %sweep.action, reply = %text, "*** ERROR: unexpected reply");
            }
        }
    }

    let q = quorum(fleet, sweep.target, sweep.tests_only);
    info!(phase = %sweep.target, "{} apps at or beyond {}", q, sweep.label);
    Ok(q)
}

async fn fetch_results(
    fleet: &Fleet,
    index: usize,
    activator: &dyn ActivationChannel,
) -> Option<KvBundle> {
    let raw = activator.activate(fleet, index, Action::TestResults).await;
    if let Reply::Error(detail) = Reply::parse(&raw) {
        warn!(app = %fleet.app(index).name, %detail, "cannot fetch test results");
        return None;
    }
    Some(results_bundle(&raw))
}
