//! storyline CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use storyline::{
    commands::{
        cmd_cluster, cmd_history, cmd_import, cmd_init, cmd_merge, cmd_run, cmd_snapshot, cmd_status,
        cmd_sweep, cmd_timeline, cmd_topics, print_cluster_stats, print_history_stats, print_import_stats,
        print_init, print_merge, print_run_stats, print_snapshot, print_status, print_sweep_stats,
        print_timeline, print_topics, InitOptions,
    },
    config::Config,
    error::Result,
    store::NewsStore,
    Pipeline,
};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "storyline")]
#[command(version, about = "Cluster a news stream into evolving topics and track their history", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize storyline configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Queue articles from a JSON-lines file
    Import {
        /// File with one article object per line
        path: PathBuf,
    },

    /// Cluster pending articles into topics
    Cluster,

    /// Apply retention and advance topic states
    Sweep,

    /// Record history points for significantly changed topics
    History,

    /// Cluster, check history and sweep
    Run {
        /// Keep running on the configured schedule until interrupted
        #[arg(long)]
        watch: bool,

        /// Minutes between runs (overrides the config)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show system status
    Status,

    /// List topics
    Topics {
        /// Only topics of this category
        #[arg(long)]
        category: Option<String>,

        /// Only topics in this state (active, stale, archived)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show the history timeline of a topic
    Timeline {
        /// Topic ID
        topic_id: String,

        /// Maximum number of points
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Record a manual history point
    Snapshot {
        /// Topic ID
        topic_id: String,
    },

    /// Merge one topic into another
    Merge {
        /// Topic that survives
        keep: String,

        /// Topic folded into it and deleted
        remove: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    // Init doesn't need an existing config
    if matches!(cli.command, Commands::Init { .. }) {
        return handle_init(cli).await;
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "storyline", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Import { path } => {
            let store = NewsStore::connect(&config).await?;
            let stats = cmd_import(&store, &path, config.embedding.dimension).await?;
            output(json, &stats, print_import_stats)?;
        }

        Commands::Cluster => {
            let pipeline = Pipeline::from_config(&config).await?;
            let stats = cmd_cluster(&pipeline).await?;
            output(json, &stats, print_cluster_stats)?;
        }

        Commands::Sweep => {
            let pipeline = Pipeline::from_config(&config).await?;
            let stats = cmd_sweep(&pipeline).await?;
            output(json, &stats, print_sweep_stats)?;
        }

        Commands::History => {
            let pipeline = Pipeline::from_config(&config).await?;
            let stats = cmd_history(&pipeline).await?;
            output(json, &stats, print_history_stats)?;
        }

        Commands::Run { watch, interval } => {
            let pipeline = Pipeline::from_config(&config).await?;
            let minutes = interval.unwrap_or(config.schedule.interval_minutes).max(1);
            cmd_run(&pipeline, watch, Duration::from_secs(minutes * 60), |stats| {
                if let Err(e) = output(json, stats, print_run_stats) {
                    error!("Failed to print run stats: {}", e);
                }
            })
            .await?;
        }

        Commands::Status => {
            let store = NewsStore::connect(&config).await?;
            let status = cmd_status(&config, &store).await?;
            output(json, &status, print_status)?;
        }

        Commands::Topics { category, status } => {
            let store = NewsStore::connect(&config).await?;
            let topics = cmd_topics(&store, category.as_deref(), status.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&topics)?);
            } else {
                print_topics(&topics);
            }
        }

        Commands::Timeline { topic_id, limit } => {
            let pipeline = Pipeline::from_config(&config).await?;
            let points = cmd_timeline(&pipeline, &topic_id, limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&points)?);
            } else {
                print_timeline(&topic_id, &points);
            }
        }

        Commands::Snapshot { topic_id } => {
            let pipeline = Pipeline::from_config(&config).await?;
            let point = cmd_snapshot(&pipeline, &topic_id).await?;
            output(json, &point, print_snapshot)?;
        }

        Commands::Merge { keep, remove } => {
            let pipeline = Pipeline::from_config(&config).await?;
            let outcome = cmd_merge(&pipeline, &keep, &remove).await?;
            output(json, &outcome, print_merge)?;
        }
    }

    Ok(())
}

/// Print `value` as pretty JSON or through its console printer
fn output<T: Serialize>(json: bool, value: &T, print: impl Fn(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

async fn handle_init(cli: Cli) -> Result<()> {
    let Commands::Init { force } = cli.command else {
        unreachable!()
    };

    // A config path names either the file itself or its directory
    let (base_dir, config_path) = if let Some(path) = cli.config {
        if path.extension().is_some_and(|e| e == "toml") {
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            (base, path)
        } else {
            (path.clone(), path.join("config.toml"))
        }
    } else {
        let base = Config::default_base_dir();
        (base.clone(), base.join("config.toml"))
    };

    let report = cmd_init(InitOptions {
        base_dir,
        config_path,
        force,
    })
    .await?;

    output(cli.json, &report, print_init)
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'storyline init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}
