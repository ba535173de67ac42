//! Resolved function sets and per-session match memoization

use super::matcher::FieldPattern;
use super::transform::TransformStep;
use crate::domain::{FieldDescriptor, PseudoFuncRule};
use crate::func::{PseudoFunc, PseudoFuncDeclaration};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A rule with its compiled pattern, parsed declaration and function
pub(crate) struct ResolvedRule {
    pub(crate) rule: PseudoFuncRule,
    pub(crate) pattern: FieldPattern,
    pub(crate) declaration: PseudoFuncDeclaration,
    pub(crate) func: Arc<dyn PseudoFunc>,
}

/// The rule that won for a field
#[derive(Clone)]
pub struct PseudoFuncRuleMatch {
    resolved: Arc<ResolvedRule>,
}

impl PseudoFuncRuleMatch {
    /// The matching rule
    pub fn rule(&self) -> &PseudoFuncRule {
        &self.resolved.rule
    }

    /// The rule's parsed declaration
    pub fn declaration(&self) -> &PseudoFuncDeclaration {
        &self.resolved.declaration
    }

    /// The function instance
    pub fn func(&self) -> &Arc<dyn PseudoFunc> {
        &self.resolved.func
    }
}

impl fmt::Debug for PseudoFuncRuleMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PseudoFuncRuleMatch")
            .field("rule", &self.resolved.rule.name)
            .field("pattern", &self.resolved.pattern.as_str())
            .field("func", &self.resolved.declaration.raw())
            .finish()
    }
}

/// Functions for one configuration, in rule order
pub struct PseudoFuncs {
    rules: Vec<Arc<ResolvedRule>>,
}

impl PseudoFuncs {
    pub(crate) fn new(rules: Vec<ResolvedRule>) -> Self {
        Self {
            rules: rules.into_iter().map(Arc::new).collect(),
        }
    }

    /// Finds the first rule whose pattern matches `field`
    pub fn find_match(&self, field: &FieldDescriptor) -> Option<PseudoFuncRuleMatch> {
        self.rules
            .iter()
            .find(|resolved| resolved.pattern.matches(field))
            .map(|resolved| PseudoFuncRuleMatch {
                resolved: Arc::clone(resolved),
            })
    }

    /// Whether any function holds per-session state
    pub fn is_stateful(&self) -> bool {
        self.rules.iter().any(|resolved| resolved.func.is_stateful())
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for PseudoFuncs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.declaration.raw()))
            .finish()
    }
}

/// Memoizes matches by literal field path for one session
///
/// A match is kept as its [`TransformStep`], so value policies are resolved
/// once per path.
pub struct FieldMatchCache {
    funcs: Arc<PseudoFuncs>,
    matches: HashMap<String, Option<TransformStep>>,
    evaluations: usize,
}

impl FieldMatchCache {
    /// Creates an empty cache over `funcs`
    pub fn new(funcs: Arc<PseudoFuncs>) -> Self {
        Self {
            funcs,
            matches: HashMap::new(),
            evaluations: 0,
        }
    }

    /// Returns the step for `field`, evaluating patterns once per path
    pub fn get(&mut self, field: &FieldDescriptor) -> Option<&TransformStep> {
        if !self.matches.contains_key(field.path()) {
            self.evaluations += 1;
            let step = self.funcs.find_match(field).map(TransformStep::new);
            self.matches.insert(field.path().to_string(), step);
        }
        self.matches.get(field.path()).and_then(Option::as_ref)
    }

    /// Number of pattern evaluations performed
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// The underlying function set
    pub fn funcs(&self) -> &Arc<PseudoFuncs> {
        &self.funcs
    }
}
