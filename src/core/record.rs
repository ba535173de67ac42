//! Record stream processing
//!
//! A [`RecordMapProcessor`] walks nested JSON records in document order and
//! runs every scalar through a chain of interceptor stages. Each stage belongs
//! to one configuration and one direction. Repseudonymization is simply two
//! stages: restore with the source configuration, then apply with the target.

use super::funcs::{FieldMatchCache, PseudoFuncs};
use super::metadata::{PseudoMetadataPayload, PseudoMetadataProcessor};
use crate::domain::{FieldDescriptor, Result};
use crate::func::TransformDirection;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// One link in the interceptor chain
pub trait ValueInterceptor: Send {
    /// Runs before [`ValueInterceptor::transform`] on the same value
    fn preprocess(&mut self, field: &FieldDescriptor, value: Option<&str>) -> Result<()>;

    /// Transforms a value, recording metadata and metrics in `collector`
    fn transform(
        &mut self,
        field: &FieldDescriptor,
        value: Option<String>,
        collector: &mut PseudoMetadataProcessor,
    ) -> Result<Option<String>>;
}

/// Interceptor applying the rules of one configuration in one direction
pub struct FuncStage {
    direction: TransformDirection,
    matches: FieldMatchCache,
}

impl FuncStage {
    /// Creates a stage over resolved functions
    pub fn new(direction: TransformDirection, funcs: Arc<PseudoFuncs>) -> Self {
        Self {
            direction,
            matches: FieldMatchCache::new(funcs),
        }
    }

    /// Direction of the stage
    pub fn direction(&self) -> TransformDirection {
        self.direction
    }

    /// Number of pattern evaluations so far
    pub fn evaluations(&self) -> usize {
        self.matches.evaluations()
    }
}

impl ValueInterceptor for FuncStage {
    fn preprocess(&mut self, field: &FieldDescriptor, value: Option<&str>) -> Result<()> {
        let direction = self.direction;
        match self.matches.get(field) {
            Some(step) => step.preprocess(direction, field, value),
            None => Ok(()),
        }
    }

    fn transform(
        &mut self,
        field: &FieldDescriptor,
        value: Option<String>,
        collector: &mut PseudoMetadataProcessor,
    ) -> Result<Option<String>> {
        let direction = self.direction;
        let Some(step) = self.matches.get(field) else {
            return Ok(value);
        };
        let outcome = step.transform(direction, field, value.as_deref(), Some(&mut *collector))?;
        if direction == TransformDirection::Apply && outcome.invoked {
            collector.add_metadata(step.field_metadata(field, outcome.snapshot_date));
        }
        Ok(outcome.value)
    }
}

/// Walks records through an interceptor chain
pub struct RecordMapProcessor {
    stages: Vec<Box<dyn ValueInterceptor>>,
    collector: PseudoMetadataProcessor,
    records: usize,
}

impl RecordMapProcessor {
    /// Creates a processor with an empty chain
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            stages: Vec::new(),
            collector: PseudoMetadataProcessor::new(correlation_id),
            records: 0,
        }
    }

    /// Appends a stage to the chain
    pub fn with_stage(mut self, stage: impl ValueInterceptor + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Number of records processed
    pub fn records(&self) -> usize {
        self.records
    }

    /// The session collector
    pub fn collector(&self) -> &PseudoMetadataProcessor {
        &self.collector
    }

    /// Processes one record
    pub fn process(&mut self, record: Value) -> Result<Value> {
        let out = self.visit("", record)?;
        self.records += 1;
        Ok(out)
    }

    /// Processes a single value found at `field`
    ///
    /// Counts as one record holding only that field.
    pub fn process_field(&mut self, field: &FieldDescriptor, value: Option<String>) -> Result<Option<String>> {
        let out = self.run_field(field, value)?;
        self.records += 1;
        Ok(out)
    }

    /// Processes records in order, stopping at the first error
    pub fn process_all<I>(&mut self, records: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = Value>,
    {
        records.into_iter().map(|r| self.process(r)).collect()
    }

    /// Builds the response metadata
    pub fn into_payload(self) -> PseudoMetadataPayload {
        debug!(
            correlation_id = %self.collector.correlation_id(),
            records = self.records,
            "Record session finished"
        );
        self.collector.into_payload()
    }

    fn visit(&mut self, path: &str, value: Value) -> Result<Value> {
        match value {
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, child) in map {
                    let child_path = format!("{path}/{key}");
                    let processed = self.visit(&child_path, child)?;
                    out.insert(key, processed);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| self.visit(&format!("{path}[{i}]"), item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Null => {
                let out = self.run_stages(path, None)?;
                Ok(out.map_or(Value::Null, Value::String))
            }
            Value::String(s) => {
                let out = self.run_stages(path, Some(s))?;
                Ok(out.map_or(Value::Null, Value::String))
            }
            scalar => {
                let original = scalar.to_string();
                match self.run_stages(path, Some(original.clone()))? {
                    Some(out) if out == original => Ok(scalar),
                    Some(out) => Ok(Value::String(out)),
                    None => Ok(Value::Null),
                }
            }
        }
    }

    fn run_stages(&mut self, path: &str, value: Option<String>) -> Result<Option<String>> {
        if self.stages.is_empty() {
            return Ok(value);
        }
        self.run_field(&FieldDescriptor::new(path), value)
    }

    fn run_field(&mut self, field: &FieldDescriptor, value: Option<String>) -> Result<Option<String>> {
        let mut current = value;
        for stage in self.stages.iter_mut() {
            stage.preprocess(field, current.as_deref())?;
            current = stage.transform(field, current, &mut self.collector)?;
        }
        Ok(current)
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
    use serde_json::json;

    fn redact(pattern: &str, placeholder: &str) -> Arc<PseudoFuncs> {
        let func = format!("redact(placeholder={placeholder})");
        Arc::new(PseudoFuncs::new(vec![ResolvedRule {
            rule: PseudoFuncRule::new("r", pattern, &func),
            pattern: FieldPattern::new(pattern).unwrap(),
            declaration: PseudoFuncDeclaration::parse(&func).unwrap(),
            func: Arc::new(RedactFunc::new(Some(placeholder))),
        }]))
    }

    #[test]
    fn test_nested_traversal() {
        let mut processor = RecordMapProcessor::new("c")
            .with_stage(FuncStage::new(TransformDirection::Apply, redact("fnr", "X")));
        let out = processor
            .process(json!({
                "fnr": "11854898347",
                "persons": [{"fnr": "1", "name": "a"}, {"fnr": null}],
                "count": 3
            }))
            .unwrap();
        assert_eq!(
            out,
            json!({
                "fnr": "X",
                "persons": [{"fnr": "X", "name": "a"}, {"fnr": null}],
                "count": 3
            })
        );
        assert_eq!(processor.records(), 1);

        let payload = processor.into_payload();
        assert_eq!(payload.metric(FieldMetric::NullValue), 1);
        let paths: Vec<_> = payload
            .datadoc_metadata
            .pseudo_variables
            .iter()
            .map(|v| v.data_element_path.as_str())
            .collect();
        assert_eq!(paths, vec!["fnr", "persons.fnr"]);
    }

    #[test]
    fn test_unchanged_scalars_keep_type() {
        let mut processor = RecordMapProcessor::new("c")
            .with_stage(FuncStage::new(TransformDirection::Apply, redact("age", "0")))
            .with_stage(FuncStage::new(TransformDirection::Apply, redact("flag", "yes")));
        let out = processor.process(json!({"age": 0, "flag": true})).unwrap();
        assert_eq!(out, json!({"age": 0, "flag": "yes"}));
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut processor = RecordMapProcessor::new("c")
            .with_stage(FuncStage::new(TransformDirection::Apply, redact("**", "first")))
            .with_stage(FuncStage::new(TransformDirection::Apply, redact("**", "second")));
        assert_eq!(processor.stage_count(), 2);
        let out = processor.process(json!({"a": "v"})).unwrap();
        assert_eq!(out, json!({"a": "second"}));
    }

    #[test]
    fn test_restore_records_no_metadata() {
        let mut processor = RecordMapProcessor::new("c")
            .with_stage(FuncStage::new(TransformDirection::Restore, redact("fnr", "X")));
        let out = processor.process(json!({"fnr": "X"})).unwrap();
        assert_eq!(out, json!({"fnr": "X"}));
        let payload = processor.into_payload();
        assert!(payload.datadoc_metadata.pseudo_variables.is_empty());
        assert_eq!(payload.logs.len(), 1);
    }

    #[test]
    fn test_document_order_is_kept() {
        let mut processor = RecordMapProcessor::new("c")
            .with_stage(FuncStage::new(TransformDirection::Apply, redact("**", "***")));
        let input: Value = serde_json::from_str(r#"{"zeta":"v","alpha":"v"}"#).unwrap();
        let out = processor.process(input).unwrap();
        assert_eq!(
            serde_json::to_string(&out).unwrap(),
            r#"{"zeta":"***","alpha":"***"}"#
        );

        let payload = processor.into_payload();
        let paths: Vec<_> = payload
            .datadoc_metadata
            .pseudo_variables
            .iter()
            .map(|v| v.data_element_path.as_str())
            .collect();
        assert_eq!(paths, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_process_field_uses_path_as_given() {
        let mut processor = RecordMapProcessor::new("c")
            .with_stage(FuncStage::new(TransformDirection::Apply, redact("/person/fnr", "X")));
        let field = FieldDescriptor::from("/person/fnr");
        let out = processor.process_field(&field, Some("11854898347".to_string())).unwrap();
        assert_eq!(out.as_deref(), Some("X"));
        assert_eq!(processor.records(), 1);
        assert_eq!(processor.collector().metadata()[0].data_element_path, "person.fnr");
    }

    #[test]
    fn test_stage_resolves_each_path_once() {
        let mut stage = FuncStage::new(TransformDirection::Apply, redact("fnr", "X"));
        let mut collector = PseudoMetadataProcessor::new("c");
        let field = FieldDescriptor::new("/fnr");
        for _ in 0..5 {
            stage.preprocess(&field, Some("1")).unwrap();
            let out = stage.transform(&field, Some("1".to_string()), &mut collector).unwrap();
            assert_eq!(out.as_deref(), Some("X"));
        }
        assert_eq!(stage.evaluations(), 1);
        assert_eq!(stage.direction(), TransformDirection::Apply);
    }

    #[test]
    fn test_process_all() {
        let mut processor = RecordMapProcessor::new("c")
            .with_stage(FuncStage::new(TransformDirection::Apply, redact("fnr", "X")));
        let out = processor
            .process_all(vec![json!({"fnr": "1"}), json!({"fnr": "2"})])
            .unwrap();
        assert_eq!(out, vec![json!({"fnr": "X"}), json!({"fnr": "X"})]);
        assert_eq!(processor.records(), 2);
        assert_eq!(processor.collector().metadata().len(), 1);
    }
}
