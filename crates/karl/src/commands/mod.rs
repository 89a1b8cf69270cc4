//! Command dispatch: bridges CLI args -> config/core -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod simulate;
pub mod util;
