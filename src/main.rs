//! Standalone host for the agent: keeps a backend session open until Ctrl+C.

use appsec_agent::{config::AgentConfig, logging::StructuredLogger, Agent};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let config_path = std::env::var("APPSEC_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = AgentConfig::load(&config_path).with_env_overrides();

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = %config_path.display(), url = %config.backend.url, "appsec agent starting");

    let stop = CancellationToken::new();
    let on_signal = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || on_signal.cancel()) {
        warn!(error = %e, "could not install the Ctrl+C handler");
    }

    let agent = Agent::new(config);
    agent.start();
    if agent.is_disabled() {
        info!("agent disabled by configuration");
        return;
    }

    let mut state = agent.subscribe();
    tokio::select! {
        _ = stop.cancelled() => info!("stop requested"),
        _ = state.wait_for(|s| s.is_terminal()) => {}
    }
    agent.graceful_stop().await;
    info!(state = %agent.state(), "appsec agent exiting");
}
