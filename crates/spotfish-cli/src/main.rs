mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spotfish", about = "FISH spot analysis pipeline")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge per-image detection CSVs into one spot table
    Combine(commands::combine::CombineArgs),
    /// Correct chromatic shift between channels
    Correct(commands::correct::CorrectArgs),
    /// Assign spots to segmented cells
    Cells(commands::cells::CellsArgs),
    /// Compute per-cell spot counts (sensitivity)
    Sensitivity(commands::sensitivity::SensitivityArgs),
    /// Pair spots across two channels by optimal assignment
    Pair(commands::pair::PairArgs),
    /// Refine spot centers by 3-D Gaussian fitting
    Refine(commands::refine::RefineArgs),
    /// Run the configured pipeline stages
    Run(commands::run::RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Combine(args) => commands::combine::run(args),
        Commands::Correct(args) => commands::correct::run(args),
        Commands::Cells(args) => commands::cells::run(args),
        Commands::Sensitivity(args) => commands::sensitivity::run(args),
        Commands::Pair(args) => commands::pair::run(args),
        Commands::Refine(args) => commands::refine::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
