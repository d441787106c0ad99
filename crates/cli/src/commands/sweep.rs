//! `rpgforge sweep`: Remove expired artifacts once.

use rpgforge_core::ArtifactStore;
use rpgforge_store::FileArtifactStore;
use std::path::Path;
use tracing::info;

pub async fn run(config_path: &Path, days: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let retention_days = days.unwrap_or(config.storage.artifact_retention_days);
    if retention_days == 0 {
        println!("Retention is disabled (0 days), nothing to do");
        return Ok(());
    }

    let store = FileArtifactStore::new(&config.storage.root_dir());
    let removed = rpgforge_gateway::sweep_artifacts(&store, retention_days).await?;
    store.flush().await?;
    info!(removed, retention_days, "Artifact sweep finished");

    println!("Removed {removed} artifact(s) older than {retention_days} day(s)");
    Ok(())
}
