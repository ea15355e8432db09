//! Domain types shared by the tgo agent and anything that talks to it.
//!
//! - [`phase`]: the fixed lifecycle every managed app moves through
//! - [`snapshot`]: the environment snapshot handed to the agent at start-up
//! - [`wire`]: JSON messages exchanged with the coordinator

pub mod phase;
pub mod snapshot;
pub mod wire;

pub use phase::{Phase, UnknownPhase};
pub use snapshot::{App, AppResources, EnvSnapshot, Instance};
pub use wire::{Command, KeyValue, KvBundle, ReplyCode, StatusMsg, StatusReply, timestamp};
