//! Validate config command implementation
//!
//! This module implements the `validate-config` command. Besides the schema
//! checks it builds the service, so KEK material and the SID index are
//! loaded once.

use super::{build_service, EXIT_CONFIG};
use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates every section
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded and validated");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let service = match build_service(&config) {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        println!("✅ Pseudo service initialized");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Local File Logging: {}", config.logging.local_enabled);
        println!(
            "  Function Set Cache: {} entries",
            config.cache.pseudo_funcs_max_entries
        );
        println!(
            "  KEK Cache: {} entries, {}s TTL",
            config.cache.aead_max_entries, config.cache.aead_ttl_seconds
        );
        println!("  KEKs: {}", config.keks.len());
        for kek in &config.keks {
            println!("    - {}", kek.uri);
        }
        println!("  Named Secrets: {}", config.secrets.len());
        for secret in &config.secrets {
            println!("    - {}", secret.id);
        }
        match service.factory().sid_service() {
            Some(sid) => {
                let snapshots = sid.snapshots();
                println!("  SID Snapshots: {}", snapshots.len());
                if let Some(latest) = snapshots.last() {
                    println!("  Latest SID Snapshot: {latest}");
                }
            }
            None => println!("  SID Index: not configured"),
        }
        println!();
        Ok(0)
    }
}
