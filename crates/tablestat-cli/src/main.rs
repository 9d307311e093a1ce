//! CLI for tablestat: live load tables for a storage cluster.

mod commands;
mod tui;

use clap::{Parser, Subcommand};

use commands::SourceArgs;

#[derive(Parser)]
#[command(name = "tablestat")]
#[command(about = "tablestat: live per-server, per-table and per-region load, diffed and re-sortable")]
#[command(version = tablestat_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Live interactive load dashboard (TUI)
    Monitor {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Poll in the background and serve the table over HTTP
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8043")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Poll a fixed number of iterations and print the table as text
    Once {
        /// Iterations to run; diffs need at least 2
        #[arg(long, default_value = "1")]
        iterations: usize,

        /// Sort key: 1-9,0 by value, !@#$%^&*() by diff, ` for natural order
        #[arg(long)]
        sort: Option<String>,

        /// Show per-second rates instead of diffs
        #[arg(long)]
        rate: bool,

        /// Only print rows that changed in the last iteration
        #[arg(long)]
        changed_only: bool,

        /// Diff against the saved baseline at this index (see `tablestat saved`)
        #[arg(long)]
        baseline: Option<String>,

        /// Save the last iteration as a baseline before exiting
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// List saved baselines for a target, most recent first
    Saved {
        #[command(flatten)]
        source: SourceArgs,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor { source } => commands::monitor::run(&source),
        Commands::Serve { port, host, source } => commands::serve::run(&host, port, &source),
        Commands::Once {
            iterations,
            sort,
            rate,
            changed_only,
            baseline,
            save,
            source,
        } => commands::once::run(commands::once::OnceConfig {
            iterations,
            sort: sort.as_deref(),
            rate,
            changed_only,
            baseline: baseline.as_deref(),
            save,
            source: &source,
        }),
        Commands::Saved { source } => commands::saved::run(&source),
    }
}
