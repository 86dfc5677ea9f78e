//! Tutorlink demo: talk to a capability server from the command line.
//!
//! Configuration comes from `--config`, then `TUTORLINK_*` variables, then
//! the flags below. Results are printed as JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;
use tutorlink_client::{ClientConfig, SearchCategory, ToolClient, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "tutorlink-demo", version, about = "Query a Tutorlink capability server")]
struct Cli {
    /// Configuration file (.toml, .yaml or .json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Server base URL, overriding the configuration
    #[arg(long, global = true, env = "TUTORLINK_BASE_URL")]
    base_url: Option<String>,

    /// Learner the calls are made for
    #[arg(long, short = 'l', global = true, default_value = "demo-learner")]
    learner: String,

    /// Log JSON lines instead of text
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the server's tools
    Tools,
    /// Search the learner's records
    Search {
        /// Free-text query
        query: String,
        /// all, assignments, grades, lessons, worksheets, materials or subjects
        #[arg(long, default_value = "all")]
        category: SearchCategory,
    },
    /// Show one question of a material with its instruction
    Question {
        /// Material identifier or title
        material: String,
        /// Question number
        number: u32,
    },
    /// Check whether the learner may open a material
    Access {
        /// Material identifier or title
        material: String,
    },
    /// Dashboard summary for the learner
    Context,
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::from_env().context("reading TUTORLINK_* variables")?,
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.logging)?;

    info!(base_url = %config.base_url, learner = %cli.learner, "Connecting");
    let client = ToolClient::new(&config)?;
    let learner = cli.learner.as_str();

    let output: Value = match cli.command {
        Command::Tools => serde_json::to_value(client.list_tools().await)?,
        Command::Search { query, category } => {
            serde_json::to_value(client.search(learner, &query, category).await)?
        }
        Command::Question { material, number } => {
            serde_json::to_value(client.get_specific_question(learner, &material, number).await)?
        }
        Command::Access { material } => {
            serde_json::to_value(client.check_material_access(learner, &material).await)?
        }
        Command::Context => serde_json::to_value(client.get_learning_context(learner).await)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    client.disconnect();
    Ok(())
}
