//! Function instance resolution
//!
//! [`PseudoFuncsFactory`] turns a [`PseudoConfig`] into [`PseudoFuncs`]. Sets
//! made only of stateless functions are cached and shared between sessions;
//! a set containing a stateful function is built fresh for every call.
//!
//! Keysets are unwrapped through the [`AeadCache`], which is the first cache
//! tier. This cache is the second.

use super::cache::BoundedCache;
use super::field::SingleFieldProcessor;
use super::funcs::{PseudoFuncs, ResolvedRule};
use super::matcher::FieldPattern;
use super::record::{FuncStage, RecordMapProcessor};
use crate::domain::{FieldDescriptor, KeyAccessError, PseudoConfig, PseudoError, Result};
use crate::func::declaration::{ARG_ALPHABET, ARG_PLACEHOLDER};
use crate::func::daead::DaeadFunc;
use crate::func::fpe::{Alphabet, FpeFunc, FpeVariant};
use crate::func::redact::RedactFunc;
use crate::func::sid::{MapSidFunc, SidService};
use crate::func::{FuncName, PseudoFunc, PseudoFuncDeclaration, TransformDirection};
use crate::kms::{AeadCache, DataKey, KeyRing};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default capacity of the function set cache
pub const DEFAULT_PSEUDO_FUNCS_MAX_ENTRIES: usize = 1000;

/// Rule patterns and declarations, then keyset signatures, in order
type FuncsCacheKey = (Vec<(String, String)>, Vec<String>);

/// Builds and caches function sets
pub struct PseudoFuncsFactory {
    aead_cache: Arc<AeadCache>,
    named_keys: HashMap<String, DataKey>,
    sid: Option<Arc<dyn SidService>>,
    cache: BoundedCache<FuncsCacheKey, Arc<PseudoFuncs>>,
    constructions: AtomicUsize,
}

impl PseudoFuncsFactory {
    /// Creates a factory unwrapping keysets through `aead_cache`
    pub fn new(aead_cache: Arc<AeadCache>) -> Self {
        Self {
            aead_cache,
            named_keys: HashMap::new(),
            sid: None,
            cache: BoundedCache::new(DEFAULT_PSEUDO_FUNCS_MAX_ENTRIES),
            constructions: AtomicUsize::new(0),
        }
    }

    /// Sets the capacity of the function set cache
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.cache = BoundedCache::new(max_entries);
        self
    }

    /// Registers a named key, resolvable as `keyId=<id>`
    pub fn with_named_key(mut self, id: impl Into<String>, key: DataKey) -> Self {
        self.named_keys.insert(id.into(), key);
        self
    }

    /// Sets the SID index used by `map-sid*` functions
    pub fn with_sid_service(mut self, sid: Arc<dyn SidService>) -> Self {
        self.sid = Some(sid);
        self
    }

    /// The KEK cache
    pub fn aead_cache(&self) -> &Arc<AeadCache> {
        &self.aead_cache
    }

    /// The SID index, if one is configured
    pub fn sid_service(&self) -> Option<&Arc<dyn SidService>> {
        self.sid.as_ref()
    }

    /// Number of function sets built so far
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::Relaxed)
    }

    /// Resolves the function set for a configuration
    ///
    /// # Errors
    ///
    /// Configuration errors for malformed patterns or declarations and
    /// unknown key references. Key access errors when a keyset cannot be
    /// unwrapped.
    pub fn resolve(&self, config: &PseudoConfig) -> Result<Arc<PseudoFuncs>> {
        let declarations = config
            .rules
            .iter()
            .map(|rule| PseudoFuncDeclaration::parse(&rule.func))
            .collect::<Result<Vec<_>>>()?;

        if declarations.iter().any(|d| d.name().is_stateful()) {
            debug!(rules = config.rules.len(), "Building stateful function set");
            return self.build(config, declarations).map(Arc::new);
        }

        let key: FuncsCacheKey = (
            config
                .rules
                .iter()
                .map(|rule| (rule.pattern.clone(), rule.func.clone()))
                .collect(),
            config.keysets.iter().map(|k| k.signature()).collect(),
        );
        self.cache
            .get_or_try_insert_with(key, || self.build(config, declarations).map(Arc::new))
    }

    fn build(
        &self,
        config: &PseudoConfig,
        declarations: Vec<PseudoFuncDeclaration>,
    ) -> Result<PseudoFuncs> {
        self.constructions.fetch_add(1, Ordering::Relaxed);
        let needs_keys = declarations.iter().any(|d| d.name() != FuncName::Redact);
        let keys = if needs_keys {
            KeyRing::unwrap_keysets(&config.keysets, &self.aead_cache)?
                .with_named_keys(&self.named_keys)
        } else {
            KeyRing::default()
        };

        let mut resolved = Vec::with_capacity(config.rules.len());
        for (rule, declaration) in config.rules.iter().zip(declarations) {
            let pattern = FieldPattern::new(&rule.pattern)?;
            let func = self.build_func(&declaration, &keys)?;
            resolved.push(ResolvedRule {
                rule: rule.clone(),
                pattern,
                declaration,
                func,
            });
        }
        debug!(rules = resolved.len(), keysets = config.keysets.len(), "Built function set");
        Ok(PseudoFuncs::new(resolved))
    }

    fn build_func(
        &self,
        declaration: &PseudoFuncDeclaration,
        keys: &KeyRing,
    ) -> Result<Arc<dyn PseudoFunc>> {
        let func: Arc<dyn PseudoFunc> = match declaration.name() {
            FuncName::Redact => Arc::new(RedactFunc::new(declaration.arg(ARG_PLACEHOLDER))),
            FuncName::Fpe => Arc::new(self.fpe(declaration, keys, FpeVariant::Ff1)?),
            FuncName::Ff31 => Arc::new(self.fpe(declaration, keys, FpeVariant::Ff31)?),
            FuncName::Daead => Arc::new(DaeadFunc::new(data_key(declaration, keys)?)?),
            FuncName::MapSid => {
                self.map_sid(declaration, Box::new(self.fpe(declaration, keys, FpeVariant::Ff1)?))?
            }
            FuncName::MapSidFf31 => {
                self.map_sid(declaration, Box::new(self.fpe(declaration, keys, FpeVariant::Ff31)?))?
            }
            FuncName::MapSidDaead => self.map_sid(
                declaration,
                Box::new(DaeadFunc::new(data_key(declaration, keys)?)?),
            )?,
        };
        Ok(func)
    }

    fn fpe(
        &self,
        declaration: &PseudoFuncDeclaration,
        keys: &KeyRing,
        variant: FpeVariant,
    ) -> Result<FpeFunc> {
        let alphabet = match declaration.arg(ARG_ALPHABET) {
            Some(raw) => raw.parse::<Alphabet>()?,
            None => Alphabet::default(),
        };
        FpeFunc::new(data_key(declaration, keys)?, alphabet, variant)
    }

    fn map_sid(
        &self,
        declaration: &PseudoFuncDeclaration,
        cipher: Box<dyn PseudoFunc>,
    ) -> Result<Arc<dyn PseudoFunc>> {
        let sid = self.sid.clone().ok_or_else(|| {
            PseudoError::Configuration(format!(
                "'{}' requires a SID index, but none is configured",
                declaration.raw()
            ))
        })?;
        let snapshot = declaration.snapshot_date()?;
        if let Some(requested) = snapshot {
            let resolved = sid.resolve_snapshot(Some(requested)).map_err(|e| {
                PseudoError::Configuration(format!(
                    "Invalid snapshotDate in '{}': {e}",
                    declaration.raw()
                ))
            })?;
            debug!(%requested, %resolved, "Resolved SID snapshot");
        }
        Ok(Arc::new(MapSidFunc::new(sid, cipher, snapshot)))
    }

    fn resolve_all(&self, configs: &[PseudoConfig]) -> Result<Vec<Arc<PseudoFuncs>>> {
        configs.iter().map(|c| self.resolve(c)).collect()
    }

    /// Record processor applying each configuration in order
    pub fn new_pseudonymize_record_processor(
        &self,
        configs: &[PseudoConfig],
        correlation_id: impl Into<String>,
    ) -> Result<RecordMapProcessor> {
        let processor = self
            .resolve_all(configs)?
            .into_iter()
            .fold(RecordMapProcessor::new(correlation_id), |p, funcs| {
                p.with_stage(FuncStage::new(TransformDirection::Apply, funcs))
            });
        Ok(processor)
    }

    /// Record processor restoring each configuration, last applied first
    pub fn new_depseudonymize_record_processor(
        &self,
        configs: &[PseudoConfig],
        correlation_id: impl Into<String>,
    ) -> Result<RecordMapProcessor> {
        let processor = self
            .resolve_all(configs)?
            .into_iter()
            .rev()
            .fold(RecordMapProcessor::new(correlation_id), |p, funcs| {
                p.with_stage(FuncStage::new(TransformDirection::Restore, funcs))
            });
        Ok(processor)
    }

    /// Record processor restoring with `source` then applying `target`
    pub fn new_repseudonymize_record_processor(
        &self,
        source: &PseudoConfig,
        target: &PseudoConfig,
        correlation_id: impl Into<String>,
    ) -> Result<RecordMapProcessor> {
        let source = self.resolve(source)?;
        let target = self.resolve(target)?;
        Ok(RecordMapProcessor::new(correlation_id)
            .with_stage(FuncStage::new(TransformDirection::Restore, source))
            .with_stage(FuncStage::new(TransformDirection::Apply, target)))
    }

    /// Batch processor for one field
    pub fn new_pseudonymize_single_field_processor(
        &self,
        configs: &[PseudoConfig],
        field_name: &str,
        correlation_id: impl Into<String>,
        minimal_metrics: bool,
    ) -> Result<SingleFieldProcessor> {
        let funcs = self.resolve_all(configs)?;
        Ok(SingleFieldProcessor::new(
            FieldDescriptor::from(field_name),
            &funcs,
            correlation_id,
            minimal_metrics,
        ))
    }
}

fn data_key<'a>(declaration: &PseudoFuncDeclaration, keys: &'a KeyRing) -> Result<&'a DataKey> {
    keys.get(declaration.key_id()).map_err(|e| match e {
        KeyAccessError::UnknownKeyId(id) => PseudoError::Configuration(format!(
            "Unknown key reference '{id}' in '{}'",
            declaration.raw()
        )),
        other => PseudoError::KeyAccess(other),
    })
}
