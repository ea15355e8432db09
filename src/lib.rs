pub mod activation;
pub mod agent;
pub mod config;
pub mod environment;
pub mod errors;
pub mod exit_codes;
pub mod functest;
pub mod lifecycle;
pub mod logging;
pub mod quorum;
pub mod receiver;
pub mod resolver;
pub mod status;

// Lets the shared fixtures under tests/common name this crate as `tgo`.
#[cfg(test)]
extern crate self as tgo;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
pub(crate) mod test_support;
