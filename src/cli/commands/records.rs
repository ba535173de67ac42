//! Record commands
//!
//! `pseudonymize-records` and `depseudonymize-records` stream NDJSON records
//! through layered configurations read from a JSON file:
//!
//! ```json
//! {"configs": [{"rules": [{"name": "fnr", "pattern": "**/fnr", "func": "redact"}], "keysets": []}]}
//! ```

use super::{load_service, read_json, report_failure, write_json};
use crate::domain::PseudoConfig;
use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Layered configurations applied to every record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordsRequest {
    #[serde(default)]
    pub configs: Vec<PseudoConfig>,
}

/// Arguments for the record commands
#[derive(Args, Debug)]
pub struct RecordsArgs {
    /// JSON file with the configurations
    #[arg(short, long)]
    pub request: PathBuf,

    /// NDJSON input records
    #[arg(short, long)]
    pub input: PathBuf,

    /// NDJSON output records (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write session metadata to this file
    #[arg(long)]
    pub metadata: Option<PathBuf>,
}

impl RecordsArgs {
    /// Execute `pseudonymize-records` or `depseudonymize-records`
    pub async fn execute(&self, config_path: &str, depseudonymize: bool) -> anyhow::Result<i32> {
        let request: RecordsRequest = read_json(&self.request)?;
        let records = read_ndjson(&self.input)?;
        tracing::info!(
            records = records.len(),
            configs = request.configs.len(),
            depseudonymize,
            "Processing records"
        );

        let service = match load_service(config_path) {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let response = tokio::task::spawn_blocking(move || {
            if depseudonymize {
                service.depseudonymize_records(&request.configs, records)
            } else {
                service.pseudonymize_records(&request.configs, records)
            }
        })
        .await?;

        let response = match response {
            Ok(r) => r,
            Err(e) => return Ok(report_failure(&e, "Record processing failed")),
        };

        write_ndjson(&response.data, self.output.as_deref())?;
        if let Some(ref path) = self.metadata {
            write_json(&response.metadata, Some(path))?;
        }
        tracing::info!(
            records = response.data.len(),
            correlation_id = %response.metadata.correlation_id,
            "Records processed"
        );
        Ok(0)
    }
}

fn read_ndjson(path: &Path) -> anyhow::Result<Vec<Value>> {
    let file = fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("Invalid JSON on line {} of {}", index + 1, path.display()))?;
        records.push(record);
    }
    Ok(records)
}

fn write_ndjson(records: &[Value], output: Option<&Path>) -> anyhow::Result<()> {
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
