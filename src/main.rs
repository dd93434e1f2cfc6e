use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scribe_gemini::{GeminiClient, GeminiConfig, ModelInfo};
use scribe_server::config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TRANSCRIPT_PATH};
use scribe_server::{AppState, GeminiPipelineFactory, ServerConfig};

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Ask questions about a transcript over HTTP", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve(ServeArgs),
    /// List Gemini models that support generateContent for the configured key
    Models,
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Interface to bind
    #[arg(long, env = "SCRIBE_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Transcript file indexed on the first chat request
    #[arg(long, env = "SCRIBE_TRANSCRIPT", default_value = DEFAULT_TRANSCRIPT_PATH)]
    transcript: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Models) => list_models().await,
        Some(Commands::Serve(args)) => serve(args).await,
        None => serve(cli.serve).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    // A missing key is not fatal here; chat requests answer 503 until it is fixed.
    let gemini = match GeminiConfig::from_env() {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(error = %e, "Gemini is not configured, chat requests will fail until it is");
            None
        }
    };

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        transcript_path: args.transcript,
    };

    let factory = GeminiPipelineFactory::new(gemini, config.transcript_path.clone());
    let state = AppState::new(Arc::new(factory));

    info!(addr = %config.addr(), "starting scribe");
    scribe_server::start_server(&config, state)
        .await
        .with_context(|| format!("server on {} exited with an error", config.addr()))
}

async fn list_models() -> Result<()> {
    let client = GeminiClient::from_env().context("failed to configure the Gemini client")?;
    let models = client.list_models().await.context("failed to list Gemini models")?;

    print!("{}", model_report(&models));
    Ok(())
}

/// The "nothing found" line only appears when the API returned no models at all.
fn model_report(models: &[ModelInfo]) -> String {
    if models.is_empty() {
        return "No models were found for this API key.\n".to_string();
    }

    let mut report = String::from("Models that support generateContent:\n");
    for model in models.iter().filter(|m| m.supports_generate_content()) {
        report.push_str(&format!("  {}\n", model.name));
    }
    report
}
