//! Built-in rule engine.
//!
//! Compiles a YAML policy definition into an ordered rule list. Included rule
//! files are resolved against the policy root and evaluated before the
//! policy's own rules, in include order. First matching rule wins; otherwise the
//! policy default applies.

pub mod matcher;
pub mod schema;

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::engine::{Evaluable, PolicyEngine, PolicyHandle};
use crate::error::{PdpError, Result};
use crate::protocol::{DecisionRequest, DecisionResponse, Effect};

use matcher::{compile_rule, is_match, Rule};
use schema::{PolicyDoc, RuleDoc, RuleFileDoc};

/// Maximum include nesting.
pub const MAX_INCLUDE_DEPTH: usize = 8;

/// YAML rule engine.
#[derive(Debug, Default, Clone)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyEngine for RuleEngine {
    fn compile(&self, definition: &[u8], root: &Path) -> Result<PolicyHandle> {
        let policy = RulePolicy::compile(definition, root)?;
        Ok(Arc::new(policy))
    }
}

/// Compiled rule policy.
#[derive(Debug)]
pub struct RulePolicy {
    id: String,
    default: Effect,
    required: Vec<String>,
    rules: Vec<Rule>,
}

impl RulePolicy {
    pub fn compile(definition: &[u8], root: &Path) -> Result<Self> {
        let doc: PolicyDoc = serde_yaml::from_slice(definition)
            .map_err(|e| PdpError::InvalidPolicy(format!("invalid yaml: {e}")))?;

        let id = doc.id.trim().to_string();
        if id.is_empty() {
            return Err(PdpError::InvalidPolicy("policy id must not be empty".into()));
        }

        let mut raw_rules = Vec::new();
        let mut stack = Vec::new();
        for inc in &doc.include {
            load_include(root, inc, &mut stack, &mut raw_rules)?;
        }
        raw_rules.extend(doc.rules);

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(raw_rules.len());
        for raw in raw_rules {
            let rule = compile_rule(raw)?;
            if !seen.insert(rule.id.clone()) {
                return Err(PdpError::InvalidPolicy(format!(
                    "duplicate rule id: {}",
                    rule.id
                )));
            }
            rules.push(rule);
        }

        tracing::debug!(policy = %id, rules = rules.len(), "policy compiled");

        Ok(Self {
            id,
            default: doc.default,
            required: doc.required,
            rules,
        })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Evaluable for RulePolicy {
    fn id(&self) -> &str {
        &self.id
    }

    fn decide(&self, req: &DecisionRequest) -> Result<DecisionResponse> {
        if let Some(missing) = self.required.iter().find(|a| req.get(a).is_none()) {
            return Err(PdpError::Evaluation(format!(
                "missing required attribute: {missing}"
            )));
        }

        let hit = self.rules.iter().find(|r| is_match(r, req));
        Ok(DecisionResponse {
            effect: hit.map(|r| r.effect).unwrap_or(self.default),
            policy: self.id.clone(),
            rule: hit.map(|r| r.id.clone()),
        })
    }
}

/// Depth-first include expansion with cycle detection.
fn load_include(
    root: &Path,
    rel: &str,
    stack: &mut Vec<PathBuf>,
    out: &mut Vec<RuleDoc>,
) -> Result<()> {
    if stack.len() >= MAX_INCLUDE_DEPTH {
        return Err(PdpError::InvalidPolicy(format!(
            "include depth exceeds {MAX_INCLUDE_DEPTH} at {rel}"
        )));
    }

    let rel_path = Path::new(rel);
    if rel_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(PdpError::InvalidPolicy(format!(
            "include must be relative to the policy root: {rel}"
        )));
    }

    let full = root.join(rel_path);
    let canonical = fs::canonicalize(&full)
        .map_err(|e| PdpError::InvalidPolicy(format!("include {rel}: {e}")))?;
    if stack.contains(&canonical) {
        return Err(PdpError::InvalidPolicy(format!("include cycle at {rel}")));
    }

    let bytes = fs::read(&canonical)
        .map_err(|e| PdpError::InvalidPolicy(format!("include {rel}: {e}")))?;
    let doc: RuleFileDoc = serde_yaml::from_slice(&bytes)
        .map_err(|e| PdpError::InvalidPolicy(format!("include {rel}: invalid yaml: {e}")))?;

    stack.push(canonical);
    for inc in &doc.include {
        load_include(root, inc, stack, out)?;
    }
    stack.pop();

    out.extend(doc.rules);
    Ok(())
}
