pub mod commands;
pub mod config;
pub mod db;
pub mod doc_processor;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod repl;
pub mod session;
pub mod speech;
pub mod state;

#[cfg(test)]
mod test_support;

use config::AppConfig;
use state::AppState;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging);

    let state = AppState::initialize(&config)?;
    repl::run(&state).await?;
    Ok(())
}
