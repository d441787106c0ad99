//! `rpgforge serve`: Start the MCP/HTTP server.

use std::path::Path;
use tracing::{info, warn};

pub async fn run(
    config_path: &Path,
    port_override: Option<u16>,
    host_override: Option<String>,
    ephemeral: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }
    config.validate()?;

    println!("rpgforge MCP server");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    if ephemeral {
        println!("   Storage:    in-memory (ephemeral)");
    } else {
        println!("   Storage:    {}", config.storage.root_dir().display());
    }
    if config.has_llm_credentials() {
        println!("   Deployment: {}", config.llm.deployment);
    } else {
        println!("   Deployment: not configured (generative tools disabled)");
        warn!("No backend credentials; generative tools will report an error");
    }

    info!(
        host = %config.gateway.host,
        port = config.gateway.port,
        ephemeral,
        "Starting rpgforge server"
    );

    rpgforge_gateway::start(config, ephemeral).await?;

    Ok(())
}
