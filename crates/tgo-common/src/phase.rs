use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle phase of a managed app.
///
/// Phases are totally ordered; an app's phase only ever moves forward during a
/// run. `Terminate` exists so the ordering is complete but nothing transitions
/// into it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Phase {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Testing,
    Done,
    Terminate,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown phase label '{0}'")]
pub struct UnknownPhase(pub String);

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Uninitialized,
        Phase::Initializing,
        Phase::Ready,
        Phase::Testing,
        Phase::Done,
        Phase::Terminate,
    ];

    /// Label carried in the `State` field of a status message.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Uninitialized => "UNKNOWN",
            Phase::Initializing => "INIT",
            Phase::Ready => "READY",
            Phase::Testing => "TEST",
            Phase::Done => "DONE",
            Phase::Terminate => "TERM",
        }
    }

    /// Labels the coordinator accepts in a status push.
    pub fn reportable() -> impl Iterator<Item = Phase> {
        [Phase::Initializing, Phase::Ready, Phase::Testing, Phase::Done].into_iter()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initializing => "initializing",
            Phase::Ready => "ready",
            Phase::Testing => "testing",
            Phase::Done => "done",
            Phase::Terminate => "terminate",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_totally_ordered() {
        for pair in Phase::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should precede {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn labels_parse_back() {
        for phase in Phase::ALL {
            assert_eq!(phase.label().parse::<Phase>().unwrap(), phase);
        }
        assert_eq!("ready".parse::<Phase>().unwrap(), Phase::Ready);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "YACK".parse::<Phase>().unwrap_err();
        assert_eq!(err, UnknownPhase("YACK".to_string()));
    }

    #[test]
    fn reportable_labels() {
        let labels: Vec<_> = Phase::reportable().map(Phase::label).collect();
        assert_eq!(labels, vec!["INIT", "READY", "TEST", "DONE"]);
    }
}
