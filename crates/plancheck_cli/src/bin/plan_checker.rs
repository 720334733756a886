//! Compares full plan trees between the two planners. Prints nothing
//! when they agree; exits 1 when any checked statement diverges.

use std::process;

use clap::Parser;

use plancheck_cli::{init_tracing, run, Args, CheckerMode};

fn main() {
    init_tracing();
    let args = Args::parse();
    match run(CheckerMode::Plan, &args) {
        Ok(summary) => process::exit(if summary.found_divergence() { 1 } else { 0 }),
        Err(e) => {
            eprintln!("plan-checker: error: {:#}", e);
            process::exit(2);
        }
    }
}
