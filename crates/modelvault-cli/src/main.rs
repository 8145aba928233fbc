use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod batch;
mod commands;
mod config;

use commands::Outcome;
use config::load_config;

/// modelvault: manage model repositories as offline Git bundles
#[derive(Debug, Parser)]
#[command(name = "modelvault", version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// Path to a custom configuration file (TOML).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log format: "pretty" (default) or "json".
    #[arg(long, global = true, default_value = "pretty", value_name = "FORMAT")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download repositories into the bundle store.
    Download {
        /// Repository ids (`owner/name`). All of the configured author's
        /// repositories when omitted.
        repos: Vec<String>,

        /// Account to list repositories from instead of the configured one.
        #[arg(long)]
        author: Option<String>,

        /// Number of parallel download workers.
        #[arg(long, short = 'w')]
        workers: Option<usize>,

        /// Re-download even when a bundle already exists.
        #[arg(long)]
        force: bool,

        /// Skip fetching LFS content into the companion payload.
        #[arg(long)]
        skip_lfs: bool,

        /// Show what would be downloaded without touching the filesystem.
        #[arg(long)]
        dry_run: bool,
    },

    /// Verify stored bundles and report integrity per repository.
    Verify {
        /// Repository ids. All stored bundles when omitted.
        repos: Vec<String>,

        /// Number of parallel verification workers.
        #[arg(long, short = 'w')]
        workers: Option<usize>,

        /// Emit the verification reports as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Extract selected bundles into working trees.
    Extract {
        /// Repository ids to extract.
        repos: Vec<String>,

        /// Extract every stored bundle.
        #[arg(long)]
        all: bool,

        /// List extractable repositories and exit.
        #[arg(long)]
        list: bool,

        /// Replace an existing extraction.
        #[arg(long)]
        force: bool,

        /// Verify and plan without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Number of parallel extraction workers.
        #[arg(long, short = 'w')]
        workers: Option<usize>,
    },

    /// List bundles known to the store.
    List,

    /// Remove bundles and/or extracted trees.
    Clean {
        /// Repository ids to remove.
        repos: Vec<String>,

        /// Remove everything the store knows about.
        #[arg(long)]
        all: bool,

        /// Only remove extracted trees, keeping the bundles.
        #[arg(long)]
        extracted_only: bool,
    },

    /// Report hub-side storage usage per repository.
    Sizes {
        /// Account to report on instead of the configured one.
        #[arg(long)]
        author: Option<String>,

        /// Sort order for the size table.
        #[arg(long, value_enum, default_value_t = SortOrder::Asc)]
        sort: SortOrder,

        /// Show only the top N repositories (0 for all).
        #[arg(long, default_value_t = 0)]
        top: usize,
    },

    /// Mirror every repository from one hub account to another.
    Mirror {
        /// Source account.
        #[arg(long)]
        from: String,

        /// Target account.
        #[arg(long)]
        to: String,

        /// Delete every repository under the target account first.
        #[arg(long)]
        clean_target: bool,

        /// Confirm that --clean-target may delete remote repositories.
        #[arg(long)]
        yes_delete_remote: bool,

        /// Show the mirror plan without pushing anything.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(&cli.log_format);

    let cfg = match load_config(cli.config.as_ref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: failed to load configuration: {e}");
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Commands::Download { repos, author, workers, force, skip_lfs, dry_run } => {
            commands::download::run(&repos, author.as_deref(), workers, force, skip_lfs, dry_run, &cfg).await
        }
        Commands::Verify { repos, workers, json } => {
            commands::verify::run(&repos, workers, json, &cfg).await
        }
        Commands::Extract { repos, all, list, force, dry_run, workers } => {
            commands::extract::run(&repos, all, list, force, dry_run, workers, &cfg).await
        }
        Commands::List => commands::list::run(&cfg),
        Commands::Clean { repos, all, extracted_only } => {
            commands::clean::run(&repos, all, extracted_only, &cfg)
        }
        Commands::Sizes { author, sort, top } => {
            commands::sizes::run(author.as_deref(), sort, top, &cfg).await
        }
        Commands::Mirror { from, to, clean_target, yes_delete_remote, dry_run } => {
            commands::mirror::run(&from, &to, clean_target, yes_delete_remote, dry_run, &cfg).await
        }
    };

    // Exit status convention: 0 full success, 1 data failures in one or
    // more repositories, 2 operational error. Calling scripts rely on the
    // distinction.
    match result {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::DataFailure) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(log_format: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format == "json" {
        registry
            .with(fmt::layer().json())
            .init();
    } else {
        registry
            .with(fmt::layer().pretty())
            .init();
    }
}
