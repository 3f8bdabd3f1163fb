//! YAML documents accepted by the rule engine (strict parsing).

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::protocol::Effect;

/// Top-level policy definition.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDoc {
    pub id: String,

    #[serde(default = "default_effect")]
    pub default: Effect,

    /// Attributes every request must carry.
    #[serde(default)]
    pub required: Vec<String>,

    /// Rule files, relative to the policy root.
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub rules: Vec<RuleDoc>,
}

/// Included rule file. May include further files.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFileDoc {
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub rules: Vec<RuleDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDoc {
    pub id: String,
    pub effect: Effect,

    /// attribute -> expected value(s). Empty map matches every request.
    #[serde(default, rename = "match")]
    pub conditions: BTreeMap<String, MatchValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MatchValue {
    One(Scalar),
    AnyOf(Vec<Scalar>),
}

/// Rule value as written in YAML. Matching is on the string form, the same
/// form request attributes are compared in (`3` and `"3"` are equal).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Scalar {
    pub fn into_match_string(self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Str(s) => s,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

fn default_effect() -> Effect {
    Effect::NotApplicable
}
