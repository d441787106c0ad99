//! `rpgforge status`: Show configuration and storage status.

use rpgforge_core::{ArtifactStore, DocumentStore};
use rpgforge_store::{FileArtifactStore, FileDocumentStore};
use std::path::Path;

pub async fn run(config_path: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let root = config.storage.root_dir();

    let documents = FileDocumentStore::new(&root).count().await?;
    let artifacts = FileArtifactStore::new(&root).count().await?;

    if json {
        let status = serde_json::json!({
            "config_file": config_path,
            "config_file_exists": config_path.exists(),
            "storage_dir": root,
            "documents": documents,
            "artifacts": artifacts,
            "deployment": config.llm.deployment,
            "backend_configured": config.has_llm_credentials(),
            "gateway": format!("{}:{}", config.gateway.host, config.gateway.port),
            "context_ceiling_tokens": config.context.ceiling_tokens,
            "max_response_tokens": config.llm.max_response_tokens,
            "artifact_retention_days": config.storage.artifact_retention_days,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("rpgforge Status");
    println!("===============");
    println!("  Config file:  {}", config_path.display());
    println!("  Storage dir:  {}", root.display());
    println!("  Documents:    {documents}");
    println!("  Artifacts:    {artifacts}");
    println!("  Deployment:   {}", config.llm.deployment);
    println!(
        "  Backend:      {}",
        if config.has_llm_credentials() { "configured" } else { "not configured" }
    );
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "  Context:      {} tokens ({} reserved for answers)",
        config.context.ceiling_tokens, config.llm.max_response_tokens
    );
    println!("  Retention:    {} days", config.storage.artifact_retention_days);

    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, using defaults (run `rpgforge config init`)");
    }

    Ok(())
}
