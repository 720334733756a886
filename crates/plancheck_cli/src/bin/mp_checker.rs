//! Compares only the single-partition versus multi-partition routing
//! verdict between the two planners. Plan-shape differences that do
//! not change routing are ignored here.

use std::process;

use clap::Parser;

use plancheck_cli::{init_tracing, run, Args, CheckerMode};

fn main() {
    init_tracing();
    let args = Args::parse();
    match run(CheckerMode::Routing, &args) {
        Ok(summary) => process::exit(if summary.found_divergence() { 1 } else { 0 }),
        Err(e) => {
            eprintln!("mp-checker: error: {:#}", e);
            process::exit(2);
        }
    }
}
