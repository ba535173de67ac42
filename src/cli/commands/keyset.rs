//! Generate keyset command implementation

use super::{build_service, load_checked_config, report_failure, write_json, EXIT_CONFIG};
use crate::domain::PseudoError;
use crate::kms::generate_keyset;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the generate-keyset command
#[derive(Args, Debug)]
pub struct GenerateKeysetArgs {
    /// KEK URI to wrap the keyset with (defaults to the only configured KEK)
    #[arg(long)]
    pub kek_uri: Option<String>,

    /// Keyset file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl GenerateKeysetArgs {
    /// Execute the generate-keyset command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_checked_config(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let kek_uri = match (&self.kek_uri, config.keks.as_slice()) {
            (Some(uri), _) => uri.clone(),
            (None, [kek]) => kek.uri.clone(),
            (None, keks) => {
                eprintln!(
                    "❌ --kek-uri is required when {} KEKs are configured",
                    keks.len()
                );
                return Ok(EXIT_CONFIG);
            }
        };

        let service = match build_service(&config) {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let kek = match service.factory().aead_cache().get(&kek_uri) {
            Ok(k) => k,
            Err(e) => return Ok(report_failure(&PseudoError::from(e), "Failed to resolve KEK")),
        };

        match generate_keyset(kek.as_ref(), &kek_uri) {
            Ok(keyset) => {
                tracing::info!(
                    kek_uri = %kek_uri,
                    primary_key_id = keyset.keyset_info.primary_key_id,
                    "Generated keyset"
                );
                write_json(&keyset, self.output.as_deref())?;
                Ok(0)
            }
            Err(e) => Ok(report_failure(&PseudoError::from(e), "Failed to generate keyset")),
        }
    }
}
