//! CLI subcommands

pub mod negotiate;
pub mod sessions;
