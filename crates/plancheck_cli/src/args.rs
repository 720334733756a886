use clap::Parser;

/// Command-line arguments shared by both checker binaries.
#[derive(Debug, Parser)]
#[command(
    about = "Compares plans from the rule-based planner against the legacy planner",
    version
)]
pub struct Args {
    /// Schema DDL file loaded before any statement is checked
    #[arg(short = 'd', long)]
    pub ddl: String,

    /// Batch file with one SQL statement per line
    #[arg(short = 'f', long)]
    pub file: Option<String>,

    /// Single SQL statement to check (takes precedence over --file)
    #[arg(short = 'q', long)]
    pub query: Option<String>,
}
