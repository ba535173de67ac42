//! Batch processing of a single field
//!
//! The fast path for a flat list of values that all belong to one field. The
//! rule match is resolved once per configuration instead of once per value.

use super::funcs::PseudoFuncs;
use super::metadata::{PseudoMetadataPayload, PseudoMetadataProcessor};
use super::transform::TransformStep;
use crate::domain::{FieldDescriptor, Result};
use crate::func::TransformDirection;
use std::sync::Arc;
use tracing::debug;

/// A matched configuration for the field
#[derive(Debug)]
pub struct SingleFieldStep {
    step: TransformStep,
    metadata_added: bool,
}

impl SingleFieldStep {
    fn new(step: TransformStep) -> Self {
        Self {
            step,
            metadata_added: false,
        }
    }

    /// The resolved transform
    pub fn step(&self) -> &TransformStep {
        &self.step
    }
}

/// Pseudonymizes batches of values for one field
#[derive(Debug)]
pub struct SingleFieldProcessor {
    field: FieldDescriptor,
    steps: Vec<SingleFieldStep>,
    collector: PseudoMetadataProcessor,
    minimal_metrics: bool,
}

impl SingleFieldProcessor {
    /// Resolves the field against each configuration
    ///
    /// Configurations without a matching rule are skipped.
    pub fn new(
        field: FieldDescriptor,
        funcs: &[Arc<PseudoFuncs>],
        correlation_id: impl Into<String>,
        minimal_metrics: bool,
    ) -> Self {
        let steps: Vec<_> = funcs
            .iter()
            .filter_map(|f| f.find_match(&field))
            .map(|found| SingleFieldStep::new(TransformStep::new(found)))
            .collect();
        debug!(field = %field, steps = steps.len(), minimal_metrics, "Single field processor ready");
        Self {
            field,
            steps,
            collector: PseudoMetadataProcessor::new(correlation_id),
            minimal_metrics,
        }
    }

    /// The field being processed
    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    /// Matched steps in configuration order
    pub fn steps(&self) -> &[SingleFieldStep] {
        &self.steps
    }

    /// Pseudonymizes one value through every step
    pub fn pseudonymize(&mut self, value: Option<&str>) -> Result<Option<String>> {
        let direction = TransformDirection::Apply;
        let mut current = value.map(str::to_string);
        for entry in self.steps.iter_mut() {
            entry.step.preprocess(direction, &self.field, current.as_deref())?;
            let collector = (!self.minimal_metrics).then_some(&mut self.collector);
            let outcome = entry
                .step
                .transform(direction, &self.field, current.as_deref(), collector)?;

            if !self.minimal_metrics && outcome.invoked {
                if entry.step.is_sid_mapping() {
                    // Deduplicated per snapshot by the collector
                    self.collector
                        .add_metadata(entry.step.field_metadata(&self.field, outcome.snapshot_date));
                } else if !entry.metadata_added {
                    self.collector
                        .add_metadata(entry.step.field_metadata(&self.field, None));
                    entry.metadata_added = true;
                }
            }
            current = outcome.value;
        }
        Ok(current)
    }

    /// Pseudonymizes a batch, stopping at the first error
    pub fn pseudonymize_all<'a, I>(&mut self, values: I) -> Result<Vec<Option<String>>>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        values.into_iter().map(|v| self.pseudonymize(v)).collect()
    }

    /// The session collector
    pub fn collector(&self) -> &PseudoMetadataProcessor {
        &self.collector
    }

    /// Builds the response metadata
    pub fn into_payload(self) -> PseudoMetadataPayload {
        self.collector.into_payload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::funcs::ResolvedRule;
    use crate::core::matcher::FieldPattern;
    use crate::core::metadata::FieldMetric;
    use crate::domain::PseudoFuncRule;
    use crate::func::redact::RedactFunc;
    use crate::func::PseudoFuncDeclaration;

    fn funcs(pattern: &str, func: &str) -> Arc<PseudoFuncs> {
        Arc::new(PseudoFuncs::new(vec![ResolvedRule {
            rule: PseudoFuncRule::new("r", pattern, func),
            pattern: FieldPattern::new(pattern).unwrap(),
            declaration: PseudoFuncDeclaration::parse(func).unwrap(),
            func: Arc::new(RedactFunc::new(None)),
        }]))
    }

    #[test]
    fn test_unmatched_configs_are_skipped() {
        let processor = SingleFieldProcessor::new(
            "fnr".into(),
            &[funcs("fnr", "redact"), funcs("other", "redact")],
            "c",
            false,
        );
        assert_eq!(processor.steps().len(), 1);
    }

    #[test]
    fn test_batch_metadata_added_once() {
        let mut processor = SingleFieldProcessor::new("fnr".into(), &[funcs("fnr", "redact")], "c", false);
        let values: Vec<String> = (0..100).map(|i| format!("value-{i}")).collect();
        let out = processor
            .pseudonymize_all(values.iter().map(|v| Some(v.as_str())))
            .unwrap();
        assert!(out.iter().all(|v| v.as_deref() == Some("***")));
        assert_eq!(processor.into_payload().datadoc_metadata.pseudo_variables.len(), 1);
    }

    #[test]
    fn test_minimal_metrics_records_nothing() {
        let mut processor = SingleFieldProcessor::new("fnr".into(), &[funcs("fnr", "redact")], "c", true);
        processor.pseudonymize_all([Some("abc"), None]).unwrap();
        let payload = processor.into_payload();
        assert!(payload.datadoc_metadata.pseudo_variables.is_empty());
        assert_eq!(payload.metric(FieldMetric::NullValue), 0);
    }

    #[test]
    fn test_no_match_passes_through() {
        let mut processor = SingleFieldProcessor::new("name".into(), &[funcs("fnr", "redact")], "c", false);
        assert_eq!(processor.pseudonymize(Some("Ola")).unwrap().as_deref(), Some("Ola"));
    }
}
