//! Provenance metadata and metrics for one session
//!
//! [`PseudoMetadataProcessor`] is append-only while a session runs and is
//! consumed once at the end to build a [`PseudoMetadataPayload`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Stable identifier type reported for SID mapped fields
pub const STABLE_IDENTIFIER_TYPE: &str = "FREG_SNR";

/// Counter tags recorded during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldMetric {
    /// A null value reached a non-SID function
    NullValue,
    /// A value was too short for FPE or SID mapping
    FpeLimitation,
    /// A SID mapping found no match
    MissingSid,
    /// A SID mapping succeeded
    MappedSid,
}

impl FieldMetric {
    /// Metric name
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldMetric::NullValue => "NULL_VALUE",
            FieldMetric::FpeLimitation => "FPE_LIMITATION",
            FieldMetric::MissingSid => "MISSING_SID",
            FieldMetric::MappedSid => "MAPPED_SID",
        }
    }
}

impl fmt::Display for FieldMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of one pseudonymized field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Leaf name of the field
    pub short_name: String,
    /// Normalized path, e.g. `persons.fnr`
    pub data_element_path: String,
    /// Pattern of the rule that matched
    pub data_element_pattern: String,
    /// Declaration string of the rule's function
    pub func: String,
    /// Algorithm name reported by the function
    pub encryption_algorithm: String,
    /// Key reference from the declaration
    pub encryption_key_reference: Option<String>,
    /// SID snapshot the values were mapped with
    pub stable_identifier_version: Option<String>,
    /// Whether the field is SID mapped
    pub stable_identifier: bool,
    /// Declaration arguments
    pub encryption_algorithm_parameters: BTreeMap<String, String>,
}

impl FieldMetadata {
    fn dedup_key(&self) -> (String, String, Option<String>) {
        (
            self.data_element_path.clone(),
            self.func.clone(),
            self.stable_identifier_version.clone(),
        )
    }

    /// Converts to the documentation variable shape
    pub fn to_variable(&self) -> PseudoVariable {
        PseudoVariable {
            short_name: self.short_name.clone(),
            data_element_path: self.data_element_path.clone(),
            data_element_pattern: self.data_element_pattern.clone(),
            encryption_algorithm: self.encryption_algorithm.clone(),
            encryption_key_reference: self.encryption_key_reference.clone(),
            stable_identifier_version: self.stable_identifier_version.clone(),
            stable_identifier_type: self
                .stable_identifier
                .then(|| STABLE_IDENTIFIER_TYPE.to_string()),
            encryption_algorithm_parameters: self
                .encryption_algorithm_parameters
                .iter()
                .map(|(k, v)| BTreeMap::from([(k.clone(), v.clone())]))
                .collect(),
        }
    }
}

/// Documentation variable for one pseudonymized field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudoVariable {
    pub short_name: String,
    pub data_element_path: String,
    pub data_element_pattern: String,
    pub encryption_algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_identifier_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_identifier_type: Option<String>,
    #[serde(default)]
    pub encryption_algorithm_parameters: Vec<BTreeMap<String, String>>,
}

/// Documentation section of a response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatadocMetadata {
    pub pseudo_variables: Vec<PseudoVariable>,
}

/// Everything a session reports besides the values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudoMetadataPayload {
    pub correlation_id: String,
    pub datadoc_metadata: DatadocMetadata,
    pub metrics: BTreeMap<FieldMetric, u64>,
    pub logs: Vec<String>,
}

impl PseudoMetadataPayload {
    /// Count for a metric, zero when never recorded
    pub fn metric(&self, metric: FieldMetric) -> u64 {
        self.metrics.get(&metric).copied().unwrap_or(0)
    }
}

/// Session collector for metadata, metrics and warnings
#[derive(Debug, Default)]
pub struct PseudoMetadataProcessor {
    correlation_id: String,
    metadata: Vec<FieldMetadata>,
    seen: HashSet<(String, String, Option<String>)>,
    metrics: BTreeMap<FieldMetric, u64>,
    logs: Vec<String>,
}

impl PseudoMetadataProcessor {
    /// Creates a collector for a session
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ..Default::default()
        }
    }

    /// Session correlation id
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Keeps the first record per (path, function, snapshot)
    ///
    /// Returns `false` when an equal key was already recorded.
    pub fn add_metadata(&mut self, metadata: FieldMetadata) -> bool {
        if !self.seen.insert(metadata.dedup_key()) {
            return false;
        }
        self.metadata.push(metadata);
        true
    }

    /// Increments a metric
    pub fn add_metric(&mut self, metric: FieldMetric) {
        *self.metrics.entry(metric).or_insert(0) += 1;
    }

    /// Appends a warning
    pub fn add_log(&mut self, message: impl Into<String>) {
        self.logs.push(message.into());
    }

    /// Recorded metadata in insertion order
    pub fn metadata(&self) -> &[FieldMetadata] {
        &self.metadata
    }

    /// Count for a metric
    pub fn metric(&self, metric: FieldMetric) -> u64 {
        self.metrics.get(&metric).copied().unwrap_or(0)
    }

    /// Recorded warnings
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Builds the response payload
    pub fn into_payload(self) -> PseudoMetadataPayload {
        PseudoMetadataPayload {
            correlation_id: self.correlation_id,
            datadoc_metadata: DatadocMetadata {
                pseudo_variables: self.metadata.iter().map(FieldMetadata::to_variable).collect(),
            },
            metrics: self.metrics,
            logs: self.logs,
        }
    }
}
