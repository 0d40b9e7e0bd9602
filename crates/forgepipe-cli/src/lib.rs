//! The `forgepipe` command line: `serve` assembles the full dependency
//! container and runs the Control API in-process; every other subcommand is
//! a thin HTTP client against a running `serve` instance.

mod args;
mod client;
mod commands;
mod run;
mod wiring;

pub use run::run;
