//! Stable process exit codes. Each fatal failure class has its own code so a
//! supervisor can tell them apart without reading the log.

/// Run completed.
pub const OK: i32 = 0;
/// A phase, or the wait for the coordinator's command, exceeded its deadline.
pub const TIMEOUT: i32 = 1;
/// A status message could not be serialized.
pub const MARSHAL: i32 = 2;
/// The coordinator answered a status push with a non-200 HTTP status.
pub const BAD_HTTP_STATUS: i32 = 3;
/// The coordinator rejected a status push, or its reply was unreadable.
pub const REJECTED: i32 = 4;
/// The coordinator could not be reached.
pub const TRANSPORT: i32 = 5;
/// Configuration, snapshot or listener failure before the state machine ran.
pub const STARTUP: i32 = 6;
