mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use hookboard::cache::QueryError;
use hookboard::client::ApiError;
use hookboard::config::Config;
use hookboard::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    tracing::debug!(base_url = %config.api.base_url, "Configuration loaded");

    let state = AppState::connect(config)?;
    let result = commands::run(cli.command, &state).await;

    tracing::debug!(metrics = ?state.metrics.snapshot(), "Command finished");

    if let Err(err) = result {
        eprintln!("error: {}", user_message(err.as_ref()));
        std::process::exit(1);
    }
    Ok(())
}

fn user_message(err: &(dyn std::error::Error + Send + Sync + 'static)) -> String {
    if let Some(api) = err.downcast_ref::<ApiError>() {
        return api.user_message();
    }
    if let Some(QueryError::Request(api)) = err.downcast_ref::<QueryError>() {
        return api.user_message();
    }
    err.to_string()
}
