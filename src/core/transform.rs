//! Value transform pipeline
//!
//! Applies one matched function to one value:
//!
//! 1. `None` passes through and counts as `NULL_VALUE` (not for SID mappings,
//!    which are multi-stage and would count twice).
//! 2. Values shorter than [`MIN_VALUE_LENGTH`] skip FPE and SID functions;
//!    the failure strategy decides between the original value and `None`.
//! 3. Everything else goes through `apply` or `restore`.

use super::funcs::PseudoFuncRuleMatch;
use super::metadata::{FieldMetadata, FieldMetric, PseudoMetadataProcessor};
use crate::domain::{FieldDescriptor, FuncError, PseudoError, Result};
use crate::func::{MapFailureStrategy, PseudoFuncOutput, TransformDirection, MIN_VALUE_LENGTH};
use tracing::{trace, warn};

/// What happened to a value in one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Resulting value
    pub value: Option<String>,
    /// Whether the function itself was invoked
    pub invoked: bool,
    /// SID snapshot reported by the function
    pub snapshot_date: Option<String>,
}

impl StepOutcome {
    fn skipped(value: Option<String>) -> Self {
        Self {
            value,
            invoked: false,
            snapshot_date: None,
        }
    }
}

/// A matched function with its value policies resolved up front
#[derive(Debug, Clone)]
pub struct TransformStep {
    rule_match: PseudoFuncRuleMatch,
    sid_mapping: bool,
    short_value_limited: bool,
    failure_strategy: MapFailureStrategy,
}

impl TransformStep {
    /// Resolves the policies of a match
    pub fn new(rule_match: PseudoFuncRuleMatch) -> Self {
        let name = rule_match.declaration().name();
        // Declarations validate their strategy when parsed
        let failure_strategy = rule_match
            .declaration()
            .failure_strategy()
            .unwrap_or_default();
        Self {
            sid_mapping: name.is_sid_mapping(),
            short_value_limited: name.is_short_value_limited(),
            failure_strategy,
            rule_match,
        }
    }

    /// The underlying match
    pub fn rule_match(&self) -> &PseudoFuncRuleMatch {
        &self.rule_match
    }

    /// Whether the step maps through the SID index
    pub fn is_sid_mapping(&self) -> bool {
        self.sid_mapping
    }

    /// Whether short values bypass the function
    pub fn is_short_value_limited(&self) -> bool {
        self.short_value_limited
    }

    /// Strategy for short values
    pub fn failure_strategy(&self) -> MapFailureStrategy {
        self.failure_strategy
    }

    fn is_too_short(&self, value: &str) -> bool {
        self.short_value_limited && value.chars().count() < MIN_VALUE_LENGTH
    }

    fn wrap_error(
        &self,
        direction: TransformDirection,
        field: &FieldDescriptor,
        value: &str,
        source: FuncError,
    ) -> PseudoError {
        PseudoError::Transform {
            direction: direction.label(),
            path: field.path().to_string(),
            value: value.to_string(),
            func: self.rule_match.declaration().raw().to_string(),
            source,
        }
    }

    /// Runs `init` for stateful functions
    ///
    /// Nulls and values the function will never see are skipped.
    pub fn preprocess(
        &self,
        direction: TransformDirection,
        field: &FieldDescriptor,
        value: Option<&str>,
    ) -> Result<()> {
        let func = self.rule_match.func();
        if !func.is_stateful() {
            return Ok(());
        }
        match value {
            Some(v) if !self.is_too_short(v) => func
                .init(v, direction)
                .map_err(|e| self.wrap_error(direction, field, v, e)),
            _ => Ok(()),
        }
    }

    /// Transforms one value
    ///
    /// Without a collector, metrics and warnings are not recorded.
    pub fn transform(
        &self,
        direction: TransformDirection,
        field: &FieldDescriptor,
        value: Option<&str>,
        mut collector: Option<&mut PseudoMetadataProcessor>,
    ) -> Result<StepOutcome> {
        let Some(value) = value else {
            if !self.sid_mapping {
                if let Some(c) = collector.as_deref_mut() {
                    c.add_metric(FieldMetric::NullValue);
                }
            }
            return Ok(StepOutcome::skipped(None));
        };

        if self.is_too_short(value) {
            if let Some(c) = collector.as_deref_mut() {
                c.add_metric(FieldMetric::FpeLimitation);
            }
            trace!(field = %field, strategy = ?self.failure_strategy, "Value too short for function");
            let value = match self.failure_strategy {
                MapFailureStrategy::ReturnOriginal => Some(value.to_string()),
                MapFailureStrategy::Suppress => None,
            };
            return Ok(StepOutcome::skipped(value));
        }

        let func = self.rule_match.func();
        let output: PseudoFuncOutput = match direction {
            TransformDirection::Apply => func.apply(value),
            TransformDirection::Restore => func.restore(value),
        }
        .map_err(|e| self.wrap_error(direction, field, value, e))?;

        if let Some(c) = collector.as_deref_mut() {
            for warning in &output.warnings {
                warn!(field = %field, func = %self.rule_match.declaration(), "{warning}");
                c.add_log(warning.clone());
            }
            if self.sid_mapping {
                c.add_metric(if output.map_failed() {
                    FieldMetric::MissingSid
                } else {
                    FieldMetric::MappedSid
                });
            }
        }

        let snapshot_date = output.snapshot_date().map(str::to_string);
        Ok(StepOutcome {
            value: output.value,
            invoked: true,
            snapshot_date,
        })
    }

    /// Provenance record for `field` as transformed by this step
    pub fn field_metadata(&self, field: &FieldDescriptor, snapshot_date: Option<String>) -> FieldMetadata {
        let declaration = self.rule_match.declaration();
        FieldMetadata {
            short_name: field.name().to_string(),
            data_element_path: field.normalized_path(),
            data_element_pattern: self.rule_match.rule().pattern.clone(),
            func: declaration.raw().to_string(),
            encryption_algorithm: self.rule_match.func().algorithm().to_string(),
            encryption_key_reference: declaration.key_id().map(str::to_string),
            stable_identifier_version: snapshot_date,
            stable_identifier: self.sid_mapping,
            encryption_algorithm_parameters: declaration.args_map(),
        }
    }
}
