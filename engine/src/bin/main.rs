//! Process entry point: loads configuration, initializes logging, builds the system, starts
//! every configured provider, and runs until Ctrl-C triggers a graceful shutdown.

use engine::{EngineBuilder, EngineConfig};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("ENGINE_LOG_FORMAT").as_deref() == Ok("json") {
        engine::logging::init_json_logging();
    } else {
        engine::logging::init_logging();
    }

    let config = load_config()?;
    tracing::info!(providers = config.providers.len(), "starting market data engine");

    let system = EngineBuilder::new(config).build()?;
    let shutdown = system.shutdown.clone();

    system.start().await?;
    tracing::info!("every configured provider connected and subscribed");

    shutdown.trigger_on_ctrl_c().await;
    system.stop();
    tracing::info!("shutdown complete");

    Ok(())
}

/// Reads `ENGINE_CONFIG_PATH` if set, otherwise falls back to `engine.toml` in the working
/// directory, otherwise to [`EngineConfig::default`] (no providers — the engine stays idle
/// until reconfigured).
fn load_config() -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let path = std::env::var("ENGINE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("engine.toml"));

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(EngineConfig::from_toml_str(&contents)?),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "no config file found, using defaults");
            Ok(EngineConfig::default())
        }
        Err(error) => Err(error.into()),
    }
}
