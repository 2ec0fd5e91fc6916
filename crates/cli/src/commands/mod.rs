//! CLI subcommands

pub mod fetch;
pub mod predict;
pub mod registry;
pub mod train;
