use clap::{Parser, Subcommand};

use attio_clay_sync::config::DEFAULT_CONFIG_PATH;
use attio_clay_sync::enrichment::Phase;

#[derive(Parser)]
#[command(name = "attio-clay-sync")]
#[command(about = "Keeps Attio people records in step with Clay enrichment")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file (extension optional)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one reconciliation pass (default)
    Run {
        /// Log what would change without writing to Attio or Clay
        #[arg(long)]
        dry_run: bool,

        /// Only run the given phase; repeat to select several
        #[arg(long, value_enum)]
        phase: Vec<Phase>,

        /// Print the run report as JSON after the summary
        #[arg(long)]
        json: bool,
    },

    /// Show why each record would or would not be processed
    Scan {
        /// List every record instead of only the totals
        #[arg(short, long)]
        verbose: bool,

        /// Limit number of records fetched per status group
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Validate and print the configuration
    Init,
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run {
            dry_run: false,
            phase: Vec::new(),
            json: false,
        }
    }
}
