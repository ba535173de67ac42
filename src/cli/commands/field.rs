//! Field commands
//!
//! `pseudonymize-field`, `depseudonymize-field` and `repseudonymize-field`
//! read a field request from a JSON file and write the response JSON.

use super::{load_service, read_json, report_failure, write_json};
use crate::core::service::{
    PseudoFieldRequest, PseudoFieldResponse, PseudoService, RepseudoFieldRequest,
};
use crate::domain::Result;
use clap::Args;
use std::path::PathBuf;

/// Request and response locations shared by the field commands
#[derive(Args, Debug, Clone)]
pub struct FieldIo {
    /// JSON request file
    #[arg(short, long)]
    pub request: PathBuf,

    /// Response file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the pseudonymize-field command
#[derive(Args, Debug)]
pub struct PseudonymizeFieldArgs {
    #[command(flatten)]
    pub io: FieldIo,

    /// Use the single field processor
    #[arg(long)]
    pub fast: bool,

    /// Skip per-value metrics and logs (requires --fast)
    #[arg(long, requires = "fast")]
    pub minimal_metrics: bool,
}

/// Arguments for the depseudonymize-field command
#[derive(Args, Debug)]
pub struct DepseudonymizeFieldArgs {
    #[command(flatten)]
    pub io: FieldIo,
}

/// Arguments for the repseudonymize-field command
#[derive(Args, Debug)]
pub struct RepseudonymizeFieldArgs {
    #[command(flatten)]
    pub io: FieldIo,
}

impl PseudonymizeFieldArgs {
    /// Execute the pseudonymize-field command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let request: PseudoFieldRequest = read_json(&self.io.request)?;
        let fast = self.fast;
        let minimal = self.minimal_metrics;
        run(config_path, &self.io, "Pseudonymization failed", move |service| {
            if fast {
                service.pseudonymize_field_fast(&request, minimal)
            } else {
                service.pseudonymize_field(&request)
            }
        })
        .await
    }
}

impl DepseudonymizeFieldArgs {
    /// Execute the depseudonymize-field command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let request: PseudoFieldRequest = read_json(&self.io.request)?;
        run(config_path, &self.io, "Depseudonymization failed", move |service| {
            service.depseudonymize_field(&request)
        })
        .await
    }
}

impl RepseudonymizeFieldArgs {
    /// Execute the repseudonymize-field command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let request: RepseudoFieldRequest = read_json(&self.io.request)?;
        run(config_path, &self.io, "Repseudonymization failed", move |service| {
            service.repseudonymize_field(&request)
        })
        .await
    }
}

async fn run<F>(config_path: &str, io: &FieldIo, failure: &str, op: F) -> anyhow::Result<i32>
where
    F: FnOnce(&PseudoService) -> Result<PseudoFieldResponse> + Send + 'static,
{
    let service = match load_service(config_path) {
        Ok(s) => s,
        Err(code) => return Ok(code),
    };

    let response = tokio::task::spawn_blocking(move || op(&service)).await?;

    match response {
        Ok(response) => {
            tracing::info!(
                values = response.data.len(),
                variables = response.metadata.datadoc_metadata.pseudo_variables.len(),
                "Field processed"
            );
            write_json(&response, io.output.as_deref())?;
            Ok(0)
        }
        Err(e) => Ok(report_failure(&e, failure)),
    }
}
