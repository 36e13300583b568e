//! bimetrics main entry point

use anyhow::Context;
use bimetrics_api::start_server;
use bimetrics_config::Config;
use bimetrics_core::MetricsEngine;
use bimetrics_ingest::JsonFileSource;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "bimetrics")]
#[command(author = "bimetrics Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Derived metrics engine for BI dashboard reports", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the JSON HTTP API
    Serve,
    /// Build one report from a saved query API response
    Report {
        /// Report name from the configuration
        name: String,
        /// JSON file holding the response envelope or a bare row array
        #[arg(short, long)]
        input: PathBuf,
        /// Roll rows up along the report's hierarchy
        #[arg(long)]
        tree: bool,
        /// Sort rows by the report's period field before running totals
        #[arg(long)]
        order: bool,
        /// Compact currency display
        #[arg(long)]
        dense: bool,
        /// Dataset label recorded in the output
        #[arg(long)]
        dataset: Option<String>,
    },
    /// Print the default configuration
    InitConfig {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (config, missing) = if args.config.exists() {
        (Config::load(args.config.clone()).context("Failed to load configuration")?, false)
    } else {
        (Config::default(), true)
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.logging.level.as_str()))
        .init();
    if missing {
        log::warn!(
            "Config file {} not found, using built-in defaults",
            args.config.display()
        );
    }

    match args.command {
        Command::Serve => {
            let rt = Runtime::new()?;
            rt.block_on(start_server(config))
        }
        Command::Report { name, input, tree, order, dense, dataset } => {
            let engine = MetricsEngine::new(config);
            let mut ctx = engine.context();
            if let Some(dataset) = dataset {
                ctx.dataset = dataset;
            }
            ctx.dense = ctx.dense || dense;
            ctx.order_by_period = order;

            let rt = Runtime::new()?;
            let source = JsonFileSource::default();
            let rows = rt
                .block_on(engine.rows_from_source(&source, &input.to_string_lossy(), &ctx))
                .with_context(|| format!("Failed to read {}", input.display()))?;

            let output = if tree {
                serde_json::to_string_pretty(&engine.tree_report(&name, &rows, &ctx)?)?
            } else {
                serde_json::to_string_pretty(&engine.report(&name, &rows, &ctx)?)?
            };
            println!("{}", output);
            Ok(())
        }
        Command::InitConfig { output } => {
            let template = Config::generate_default();
            match output {
                Some(path) => {
                    std::fs::write(&path, template)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    log::info!("Wrote default configuration to {}", path.display());
                }
                None => print!("{}", template),
            }
            Ok(())
        }
    }
}
