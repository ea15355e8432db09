//! The phase state machine and the orchestrator sequencing it.
//!
//! ```text
//! Uninitialized ─start─▶ Initializing ─ready─▶ Ready ══TESTNOW══▶ Testing ─teststatus─▶ Done
//! ```
//!
//! Each phase is worked by a [`PhaseUnit`] running on its own task. The unit
//! owns the [`Fleet`](crate::environment::Fleet) while it runs and hands it
//! back with its completion signal, so only the active unit can change phases.

pub mod orchestrator;
pub mod unit;
mod work;

use std::sync::Arc;

use crate::activation::ActivationChannel;
use crate::config::Timing;
use crate::status::StatusReporter;

pub use orchestrator::Orchestrator;
pub use unit::PhaseUnit;

/// Collaborators every phase unit needs.
#[derive(Clone)]
pub struct PhaseContext {
    pub activator: Arc<dyn ActivationChannel>,
    pub reporter: Arc<StatusReporter>,
    pub timing: Timing,
}

impl PhaseContext {
    pub fn new(
        activator: Arc<dyn ActivationChannel>,
        reporter: Arc<StatusReporter>,
        timing: Timing,
    ) -> Self {
        Self {
            activator,
            reporter,
            timing,
        }
    }
}
