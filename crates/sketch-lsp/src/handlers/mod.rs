//! LSP request handlers.
//!
//! This module wires handler submodules together.

mod commands;
mod diagnostics;
mod features;
mod sync;
mod workspace;

pub use commands::{execute_command, CHECK_PROJECT_COMMAND, CLEAR_CACHE_COMMAND};
pub use features::{code_action, completion};
pub use sync::{did_change, did_close, did_open};
pub use workspace::{did_change_configuration, startup_check};
