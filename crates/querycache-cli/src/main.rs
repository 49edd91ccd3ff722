//! Querycache demos.
//!
//! Runs small programs against the query cache to show resolutions being deduplicated and results
//! being served from the cache.

#![warn(missing_debug_implementations, clippy::all)]

mod cli;
mod config;
mod demos;
mod logging;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
