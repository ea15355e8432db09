//! Activation channel: how the agent tells an app to do something.
//!
//! Every app understands a fixed vocabulary of [`Action`]s and answers each
//! with one line of text (see [`reply`]). The production channel is
//! [`ScriptActivator`]; tests substitute scripted channels.

pub mod reply;
pub mod script;

use async_trait::async_trait;

use crate::environment::Fleet;

pub use reply::{Reply, Signal, results_bundle};
pub use script::ScriptActivator;

/// Actions an app can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    Ready,
    Test,
    TestStatus,
    TestResults,
    Stop,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Ready => "ready",
            Action::Test => "test",
            Action::TestStatus => "teststatus",
            Action::TestResults => "testresults",
            Action::Stop => "stop",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invokes actions on the apps of a fleet.
///
/// Implementations never fail: problems are reported in-band as an
/// `error <reason>` reply so the caller can retry on its next sweep.
#[async_trait]
pub trait ActivationChannel: Send + Sync {
    /// Ask app `index` to perform `action` and return its raw reply.
    async fn activate(&self, fleet: &Fleet, index: usize, action: Action) -> String;

    /// Prepare whatever app `index` needs before it is started.
    async fn prepare(&self, _fleet: &Fleet, _index: usize) -> String {
        "ok".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_match_the_protocol() {
        let names: Vec<_> = [
            Action::Start,
            Action::Ready,
            Action::Test,
            Action::TestStatus,
            Action::TestResults,
            Action::Stop,
        ]
        .into_iter()
        .map(Action::as_str)
        .collect();
        assert_eq!(
            names,
            vec!["start", "ready", "test", "teststatus", "testresults", "stop"]
        );
    }
}
