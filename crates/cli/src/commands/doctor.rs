//! `rpgforge doctor`: Diagnose configuration, storage and backend.

use rpgforge_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("rpgforge Doctor");
    println!("===============\n");

    let mut issues = 0;

    // Config
    let config = if config_path.exists() {
        match AppConfig::load_with_env(config_path) {
            Ok(config) => {
                println!("  [ok]   Config file valid ({})", config_path.display());
                config
            }
            Err(e) => {
                println!("  [fail] Config file invalid: {e}");
                println!("\n  1 issue found. Fix the config file before running other checks.");
                return Ok(());
            }
        }
    } else {
        println!("  [warn] No config file, using defaults (run `rpgforge config init`)");
        issues += 1;
        super::load_config(config_path)?
    };

    // Completion backend
    if config.has_llm_credentials() {
        match rpgforge_providers::build_from_config(&config) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  [ok]   Backend configured ({})", config.llm.deployment),
                Ok(false) => {
                    println!("  [warn] Backend reports unhealthy");
                    issues += 1;
                }
                Err(e) => {
                    println!("  [fail] Backend check failed: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  [fail] Backend could not be built: {e}");
                issues += 1;
            }
        }
    } else {
        println!(
            "  [warn] No backend credentials, set AZURE_OPENAI_API_KEY and AZURE_OPENAI_ENDPOINT"
        );
        issues += 1;
    }

    // Storage
    let root = config.storage.root_dir();
    match std::fs::create_dir_all(&root).and_then(|_| {
        let probe = root.join(".doctor-probe");
        std::fs::write(&probe, b"ok")?;
        std::fs::remove_file(probe)
    }) {
        Ok(()) => println!("  [ok]   Storage directory writable ({})", root.display()),
        Err(e) => {
            println!("  [fail] Storage directory not writable ({}): {e}", root.display());
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
