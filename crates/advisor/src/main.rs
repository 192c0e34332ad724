//! Alert advisor CLI
//!
//! Runs the Alertmanager webhook receiver, or handles a single payload from a
//! file or stdin and prints the recommendation as JSON.

use advisor::config::{
    AdvisorConfig, ClusterConfig, CompletionConfig, DEFAULT_CA_PATH, DEFAULT_COMPLETION_URL,
    DEFAULT_DB_PATH, DEFAULT_K8S_API, DEFAULT_MODEL, DEFAULT_RETRIEVAL_MAX_CHARS,
    DEFAULT_RUNBOOKS_PATH, DEFAULT_TOKEN_PATH,
};
use advisor::{server, Advisor};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Alert advisor - troubleshooting recommendations for Alertmanager alerts
#[derive(Parser)]
#[command(name = "advisor")]
#[command(about = "Alert advisor - troubleshooting recommendations for Alertmanager alerts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database for recommendation history
    #[arg(long, env = "DB_PATH", default_value = DEFAULT_DB_PATH, global = true)]
    db_path: PathBuf,

    /// Runbook corpus (passages separated by blank lines)
    #[arg(long, env = "RUNBOOKS_PATH", default_value = DEFAULT_RUNBOOKS_PATH, global = true)]
    runbooks_path: PathBuf,

    /// Maximum characters of runbook context in the prompt
    #[arg(
        long,
        env = "RETRIEVAL_MAX_CHARS",
        default_value_t = DEFAULT_RETRIEVAL_MAX_CHARS,
        global = true
    )]
    retrieval_max_chars: usize,

    /// Kubernetes API base URL
    #[arg(long, env = "K8S_API", default_value = DEFAULT_K8S_API, global = true)]
    k8s_api: String,

    /// Service-account token file
    #[arg(long, env = "K8S_TOKEN_PATH", default_value = DEFAULT_TOKEN_PATH, global = true)]
    k8s_token_path: PathBuf,

    /// Cluster CA bundle
    #[arg(long, env = "K8S_CA_PATH", default_value = DEFAULT_CA_PATH, global = true)]
    k8s_ca_path: PathBuf,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_COMPLETION_URL, global = true)]
    openai_base_url: String,

    /// Completion model
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL, global = true)]
    model: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook receiver
    Serve {
        /// Address to listen on
        #[arg(long, env = "ADVISOR_ADDR", default_value = "0.0.0.0:8080")]
        addr: String,
    },
    /// Produce a recommendation for one payload and print it
    Recommend {
        /// Alertmanager payload file, or `-` for stdin
        #[arg(long, default_value = "-")]
        payload: String,
    },
}

impl Cli {
    fn advisor_config(&self) -> AdvisorConfig {
        AdvisorConfig {
            db_path: self.db_path.clone(),
            runbooks_path: self.runbooks_path.clone(),
            retrieval_max_chars: self.retrieval_max_chars,
            cluster: ClusterConfig {
                api_url: self.k8s_api.clone(),
                token_path: self.k8s_token_path.clone(),
                ca_path: self.k8s_ca_path.clone(),
                ..ClusterConfig::default()
            },
            completion: CompletionConfig {
                base_url: self.openai_base_url.clone(),
                api_key: self.openai_api_key.clone(),
                model: self.model.clone(),
                ..CompletionConfig::default()
            },
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("advisor=debug,info")
        } else {
            EnvFilter::new("advisor=info,warn")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn read_payload(source: &str) -> Result<serde_json::Value> {
    let raw = if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read payload from {source}"))?
    };

    Ok(serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = cli.advisor_config();
    let advisor = Advisor::from_config(&config).context("Failed to initialize advisor")?;

    match cli.command {
        Commands::Serve { addr } => {
            info!(
                db = %config.db_path.display(),
                runbooks = %config.runbooks_path.display(),
                k8s_api = %config.cluster.api_url,
                model = %config.completion.model,
                "Starting alert advisor"
            );
            server::run_server(Arc::new(advisor), &addr).await?;
        }
        Commands::Recommend { payload } => {
            let payload = read_payload(&payload).await?;
            let recommendation = advisor.recommend(&payload).await?;
            println!("{}", serde_json::to_string_pretty(&recommendation)?);
        }
    }

    Ok(())
}
