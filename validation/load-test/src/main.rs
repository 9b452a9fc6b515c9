//! Load test CLI for the product API.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use load_test::{LoadRunner, ResultsReport, RunSummary, TestConfig};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "load-test")]
#[command(about = "Virtual-user load generator for the product API", long_about = None)]
struct Cli {
    /// Log level or filter directives, e.g. `info` or `loadgen_core=debug`
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test from a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override target concurrency of every user class
        #[arg(short, long)]
        users: Option<usize>,

        /// Override test duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Override the target base URL
        #[arg(long, env = "LOAD_TEST_BASE_URL")]
        base_url: Option<String>,

        /// Override the RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// Write every action record to this JSONL file
        #[arg(long)]
        log_outcomes: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Run a quick smoke test with the default product mix
    Quick {
        /// Base URL
        #[arg(long, env = "LOAD_TEST_BASE_URL", default_value = "http://localhost:8080")]
        url: String,

        /// Users per class
        #[arg(short, long, default_value = "2")]
        users: usize,

        /// Duration in seconds
        #[arg(short, long, default_value = "15")]
        duration: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },

    /// Validate a scenario file without running it
    Check {
        /// Path to scenario YAML file
        scenario: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Run {
            scenario,
            users,
            duration,
            base_url,
            seed,
            log_outcomes,
            no_progress,
            output,
        } => {
            let mut config = TestConfig::from_file(&scenario)?;

            // Apply overrides
            if let Some(users) = users {
                for class in &mut config.user_classes {
                    class.target_concurrency = users;
                }
            }
            if let Some(d) = duration {
                config.duration_secs = d;
            }
            if let Some(url) = base_url {
                config.base_url = url;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            config.validate()?;
            if matches!(output, OutputFormat::Table) {
                println!("Loading scenario: {}", scenario.display());
                print_config(&config);
            }

            let mut runner = LoadRunner::new(config).with_progress(!no_progress);
            if let Some(path) = log_outcomes {
                runner = runner.with_outcome_log(path);
            }
            let summary = runner.run().await?;
            print_summary(&summary, output)
        }
        Commands::Quick {
            url,
            users,
            duration,
            output,
        } => {
            let config = TestConfig::quick(url, duration, users);
            config.validate()?;
            if matches!(output, OutputFormat::Table) {
                print_config(&config);
            }

            let summary = LoadRunner::new(config).run().await?;
            print_summary(&summary, output)
        }
        Commands::List { dir } => {
            list_scenarios(&dir);
            Ok(())
        }
        Commands::Check { scenario } => {
            let config = TestConfig::from_file(&scenario)?;
            config.validate()?;
            // Building the catalogs catches weight errors the file format allows.
            let profile = load_test::ProductProfile::from_config(&config);
            for class in &config.user_classes {
                profile.catalog(class)?;
            }
            println!("✓ {} is valid", scenario.display());
            print_config(&config);
            Ok(())
        }
    }
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    // RUST_LOG wins over --log-level.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => log_filter(log_level)?,
    };
    let directives = filter.to_string();

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.with_thread_ids(true).json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    info!(filter = %directives, "Logging initialized");
    Ok(())
}

fn log_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(log_level).with_context(|| format!("invalid log level '{}'", log_level))
}

fn print_config(config: &TestConfig) {
    println!("✓ Configuration loaded successfully");
    println!("  Name: {}", config.name);
    println!("  Description: {}", config.description);
    println!("  Target: {}", config.base_url);
    println!("  Duration: {}s", config.duration_secs);
    println!(
        "  Think time: {:.1}-{:.1}s",
        config.min_think_secs, config.max_think_secs
    );
    for class in &config.user_classes {
        println!(
            "  Class {}: {} users at {:.1}/s",
            class.name, class.target_concurrency, class.spawn_rate_per_second
        );
    }
    println!(
        "  Weights: get {} / create {} / invalid {}",
        config.weights.get_products,
        config.weights.create_valid_product,
        config.weights.create_invalid_or_duplicate_product
    );
    println!();
}

fn print_summary(summary: &RunSummary, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", ResultsReport::format_json(summary)?),
        OutputFormat::Table => println!("{}", ResultsReport::format_table(summary)),
    }
    Ok(())
}

fn list_scenarios(dir: &Path) {
    println!("Available scenarios in {}:", dir.display());
    println!();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error reading directory: {}", e);
            eprintln!("Make sure the directory exists and is readable");
            return;
        }
    };

    let mut scenarios = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !matches!(path.extension().and_then(|s| s.to_str()), Some("yaml" | "yml")) {
            continue;
        }
        // Try to load the config to get name and description
        if let Ok(config) = TestConfig::from_file(&path) {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            scenarios.push((filename, config.name, config.description));
        }
    }

    scenarios.sort_by(|a, b| a.0.cmp(&b.0));

    if scenarios.is_empty() {
        println!("No scenario files found");
        return;
    }
    for (filename, name, desc) in scenarios {
        println!("  {} - {}", filename, name);
        println!("    {}", desc);
        println!();
    }
}
