//! CLI subcommand implementations.

pub mod entries;
pub mod start;
pub mod status;
pub mod stop;
