//! `rpgforge config`: Configuration management commands.

use rpgforge_config::AppConfig;
use std::path::Path;

const REDACTED: &str = "***";

pub fn validate(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load_with_env(config_path) {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_llm_credentials() {
                warnings.push("No backend credentials (AZURE_OPENAI_API_KEY / AZURE_OPENAI_ENDPOINT)");
            }
            if config.storage.artifact_retention_days == 0 {
                warnings.push("artifact_retention_days = 0 disables the retention sweep");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Deployment:  {}", config.llm.deployment);
            println!("   Gateway:     {}:{}", config.gateway.host, config.gateway.port);
            println!("   Storage:     {}", config.storage.root_dir().display());
            println!("   Prompt room: {} tokens", config.prompt_budget_tokens());
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    println!("{}", render_redacted(&config)?);
    Ok(())
}

fn render_redacted(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut config = config.clone();
    if config.llm.api_key.is_some() {
        config.llm.api_key = Some(REDACTED.into());
    }
    toml::to_string_pretty(&config)
}

pub fn path(config_path: &Path) {
    println!("{}", config_path.display());
}

pub fn init(config_path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        )
        .into());
    }
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, AppConfig::default_toml())?;
    println!("Wrote {}", config_path.display());
    Ok(())
}
