//! Stable exit codes for the coder binary.

use crate::core::tools::ProtocolError;
use crate::start::StartupError;

/// Input ended normally.
pub const OK: i32 = 0;
/// Startup rejected the root, ignore patterns, config or API key.
pub const INVALID: i32 = 1;
/// A tool, the model backend or the tool round limit ended the run.
pub const FAILED: i32 = 2;
/// The model sent a tool call that does not match the registry.
pub const PROTOCOL: i32 = 3;

/// Exit code for an error that ended the run.
pub fn for_error(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<StartupError>().is_some() {
        INVALID
    } else if err.downcast_ref::<ProtocolError>().is_some() {
        PROTOCOL
    } else {
        FAILED
    }
}
