use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod app;
mod commands;
mod render;

#[derive(Parser)]
#[command(name = "neuma")]
#[command(about = "neuma - conversational assistant for the terminal")]
#[command(version)]
struct Cli {
    /// Answer a single prompt and exit
    #[arg(short, long)]
    input: Option<String>,

    /// Response mode (normal, table, code, csv, or any mode from the config)
    #[arg(long)]
    mode: Option<String>,

    /// Persona to start with
    #[arg(short, long)]
    persona: Option<String>,

    /// Answer from this vector store instead of directly
    #[arg(long)]
    db: Option<String>,

    /// LLM model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => neuma_core::config::Settings::load_from(path)?,
        None => neuma_core::config::Settings::load(),
    };

    let default_level = if settings.debug.logging { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(ref model) = cli.model {
        settings.openai.model = model.clone();
    }

    let options = app::StartupOptions {
        mode: cli.mode,
        persona: cli.persona,
        store: cli.db,
    };

    if let Some(input) = cli.input {
        app::run_single_prompt(&settings, &options, &input).await?;
    } else {
        app::run_repl(settings, options).await?;
    }

    Ok(())
}
