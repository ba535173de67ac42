//! Field level operations
//!
//! [`PseudoService`] is the entry point used by the CLI. A field request
//! names one field, a pattern, a function declaration and optionally a
//! keyset. The name is the field path; each value is processed as if found
//! at that path in a record.

use super::factory::PseudoFuncsFactory;
use super::metadata::PseudoMetadataPayload;
use super::record::RecordMapProcessor;
use crate::config::{decode_key_material, PseudoServiceConfig};
use crate::domain::{FieldDescriptor, PseudoConfig, PseudoError, PseudoFuncRule, PseudoKeyset, Result};
use crate::func::sid::{InMemorySidIndex, SidLookup, SidService};
use crate::kms::{AeadCache, DataKey, LocalKekClient};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Pattern used when a request does not give one
pub const DEFAULT_FIELD_PATTERN: &str = "**";

/// Pseudonymize or depseudonymize one field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PseudoFieldRequest {
    pub name: String,
    #[serde(default)]
    pub pattern: Option<String>,
    pub pseudo_func: String,
    #[serde(default)]
    pub keyset: Option<PseudoKeyset>,
    pub values: Vec<Option<String>>,
}

impl PseudoFieldRequest {
    fn config(&self) -> PseudoConfig {
        field_config(&self.name, self.pattern.as_deref(), &self.pseudo_func, self.keyset.as_ref())
    }
}

/// Move one field from a source to a target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepseudoFieldRequest {
    pub name: String,
    #[serde(default)]
    pub pattern: Option<String>,
    pub source_pseudo_func: String,
    pub target_pseudo_func: String,
    #[serde(default)]
    pub source_keyset: Option<PseudoKeyset>,
    #[serde(default)]
    pub target_keyset: Option<PseudoKeyset>,
    pub values: Vec<Option<String>>,
}

/// Transformed values plus session metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PseudoFieldResponse {
    pub data: Vec<Option<String>>,
    #[serde(flatten)]
    pub metadata: PseudoMetadataPayload,
}

/// Transformed records plus session metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PseudoRecordsResponse {
    pub data: Vec<Value>,
    #[serde(flatten)]
    pub metadata: PseudoMetadataPayload,
}

fn field_config(
    name: &str,
    pattern: Option<&str>,
    func: &str,
    keyset: Option<&PseudoKeyset>,
) -> PseudoConfig {
    let rule = PseudoFuncRule::new(name, pattern.unwrap_or(DEFAULT_FIELD_PATTERN), func);
    PseudoConfig::new(vec![rule], keyset.into_iter().cloned().collect())
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Pseudonymization operations over a shared factory
#[derive(Clone)]
pub struct PseudoService {
    factory: Arc<PseudoFuncsFactory>,
}

impl PseudoService {
    /// Wraps a factory
    pub fn new(factory: Arc<PseudoFuncsFactory>) -> Self {
        Self { factory }
    }

    /// Builds the KEK client, caches, named keys and SID index from configuration
    ///
    /// # Errors
    ///
    /// Configuration errors for undecodable key material or an unreadable
    /// SID index.
    pub fn from_config(config: &PseudoServiceConfig) -> Result<Self> {
        let mut client = LocalKekClient::new();
        for kek in &config.keks {
            let material = decode_key_material(&kek.material)
                .map_err(|e| PseudoError::Configuration(format!("KEK '{}': {e}", kek.uri)))?;
            client = client.with_kek(kek.uri.clone(), material.as_slice());
        }

        let aead_cache = AeadCache::new(
            Arc::new(client),
            config.cache.aead_max_entries,
            Duration::from_secs(config.cache.aead_ttl_seconds),
        );
        let mut factory = PseudoFuncsFactory::new(Arc::new(aead_cache))
            .with_max_entries(config.cache.pseudo_funcs_max_entries);

        for secret in &config.secrets {
            let material = decode_key_material(&secret.material)
                .map_err(|e| PseudoError::Configuration(format!("Secret '{}': {e}", secret.id)))?;
            let key = DataKey::from_bytes(&material)?;
            factory = factory.with_named_key(secret.id.clone(), key);
        }

        if let Some(path) = config.sid.as_ref().and_then(|s| s.index_path.as_ref()) {
            let index = InMemorySidIndex::from_file(path)?;
            info!(path = %path.display(), snapshots = index.snapshots().len(), "Loaded SID index");
            factory = factory.with_sid_service(Arc::new(index));
        }

        debug!(
            keks = config.keks.len(),
            secrets = config.secrets.len(),
            "Pseudo service initialized"
        );
        Ok(Self::new(Arc::new(factory)))
    }

    /// The function factory
    pub fn factory(&self) -> &Arc<PseudoFuncsFactory> {
        &self.factory
    }

    /// Pseudonymizes values through the record processor
    pub fn pseudonymize_field(&self, request: &PseudoFieldRequest) -> Result<PseudoFieldResponse> {
        let correlation_id = correlation_id();
        crate::log_session_start!("pseudonymize-field", &correlation_id, request.values.len());
        let processor = self
            .factory
            .new_pseudonymize_record_processor(&[request.config()], &correlation_id)?;
        let response = process_values(processor, &request.name, &request.values)?;
        crate::log_session_complete!("pseudonymize-field", &correlation_id, response.data.len());
        Ok(response)
    }

    /// Pseudonymizes values through the single field fast path
    pub fn pseudonymize_field_fast(
        &self,
        request: &PseudoFieldRequest,
        minimal_metrics: bool,
    ) -> Result<PseudoFieldResponse> {
        let correlation_id = correlation_id();
        crate::log_session_start!("pseudonymize-field-fast", &correlation_id, request.values.len());
        let mut processor = self.factory.new_pseudonymize_single_field_processor(
            &[request.config()],
            &request.name,
            &correlation_id,
            minimal_metrics,
        )?;
        let data = processor.pseudonymize_all(request.values.iter().map(Option::as_deref))?;
        crate::log_session_complete!("pseudonymize-field-fast", &correlation_id, data.len());
        Ok(PseudoFieldResponse {
            data,
            metadata: processor.into_payload(),
        })
    }

    /// Restores values
    pub fn depseudonymize_field(&self, request: &PseudoFieldRequest) -> Result<PseudoFieldResponse> {
        let correlation_id = correlation_id();
        crate::log_session_start!("depseudonymize-field", &correlation_id, request.values.len());
        let processor = self
            .factory
            .new_depseudonymize_record_processor(&[request.config()], &correlation_id)?;
        let response = process_values(processor, &request.name, &request.values)?;
        crate::log_session_complete!("depseudonymize-field", &correlation_id, response.data.len());
        Ok(response)
    }

    /// Restores with the source configuration and applies the target one
    pub fn repseudonymize_field(&self, request: &RepseudoFieldRequest) -> Result<PseudoFieldResponse> {
        let correlation_id = correlation_id();
        crate::log_session_start!("repseudonymize-field", &correlation_id, request.values.len());
        let pattern = request.pattern.as_deref();
        let source = field_config(
            &request.name,
            pattern,
            &request.source_pseudo_func,
            request.source_keyset.as_ref(),
        );
        let target = field_config(
            &request.name,
            pattern,
            &request.target_pseudo_func,
            request.target_keyset.as_ref(),
        );
        let processor = self
            .factory
            .new_repseudonymize_record_processor(&source, &target, &correlation_id)?;
        let response = process_values(processor, &request.name, &request.values)?;
        crate::log_session_complete!("repseudonymize-field", &correlation_id, response.data.len());
        Ok(response)
    }

    /// Pseudonymizes whole records with layered configurations
    pub fn pseudonymize_records(
        &self,
        configs: &[PseudoConfig],
        records: Vec<Value>,
    ) -> Result<PseudoRecordsResponse> {
        let correlation_id = correlation_id();
        let processor = self
            .factory
            .new_pseudonymize_record_processor(configs, &correlation_id)?;
        process_records("pseudonymize-records", processor, records)
    }

    /// Depseudonymizes whole records, undoing the last configuration first
    pub fn depseudonymize_records(
        &self,
        configs: &[PseudoConfig],
        records: Vec<Value>,
    ) -> Result<PseudoRecordsResponse> {
        let correlation_id = correlation_id();
        let processor = self
            .factory
            .new_depseudonymize_record_processor(configs, &correlation_id)?;
        process_records("depseudonymize-records", processor, records)
    }

    fn sid(&self) -> Result<&Arc<dyn SidService>> {
        self.factory
            .sid_service()
            .ok_or_else(|| PseudoError::Configuration("No SID index is configured".to_string()))
    }

    /// Maps an FNR to its SNR
    pub fn lookup_fnr(&self, fnr: &str, snapshot: Option<NaiveDate>) -> Result<SidLookup> {
        Ok(self.sid()?.lookup_fnr(fnr, snapshot)?)
    }

    /// Maps an SNR to its FNR
    pub fn lookup_snr(&self, snr: &str, snapshot: Option<NaiveDate>) -> Result<SidLookup> {
        Ok(self.sid()?.lookup_snr(snr, snapshot)?)
    }
}

fn process_values(
    mut processor: RecordMapProcessor,
    name: &str,
    values: &[Option<String>],
) -> Result<PseudoFieldResponse> {
    let field = FieldDescriptor::from(name);
    let data = values
        .iter()
        .map(|value| processor.process_field(&field, value.clone()))
        .collect::<Result<Vec<_>>>()?;
    Ok(PseudoFieldResponse {
        data,
        metadata: processor.into_payload(),
    })
}

fn process_records(
    operation: &str,
    mut processor: RecordMapProcessor,
    records: Vec<Value>,
) -> Result<PseudoRecordsResponse> {
    let correlation_id = processor.collector().correlation_id().to_string();
    crate::log_session_start!(operation, &correlation_id, records.len());
    let data = processor.process_all(records)?;
    crate::log_session_complete!(operation, &correlation_id, data.len());
    Ok(PseudoRecordsResponse {
        data,
        metadata: processor.into_payload(),
    })
}
