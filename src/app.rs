//! CLI and logging submodule re-exports.

pub mod cli;
pub mod logging;
