//! The demo programs behind the CLI subcommands.

pub mod fetch;
pub mod sum;
