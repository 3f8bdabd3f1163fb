//! Rule compilation and matching utilities.
//!
//! Supports `*` as "attribute present" and lists as any-of. Integer and
//! boolean rule values match by their string form.

use crate::error::{PdpError, Result};
use crate::protocol::{DecisionRequest, Effect};

use super::schema::{MatchValue, RuleDoc, Scalar};

/// Compiled expectation for one attribute.
#[derive(Debug, Clone)]
pub enum Expect {
    Present,
    AnyOf(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub attr: String,
    pub expect: Expect,
}

/// Compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub effect: Effect,
    pub conditions: Vec<Condition>,
}

pub fn compile_rule(raw: RuleDoc) -> Result<Rule> {
    let id = raw.id.trim().to_string();
    if id.is_empty() {
        return Err(PdpError::InvalidPolicy("rule id must not be empty".into()));
    }

    let mut conditions = Vec::with_capacity(raw.conditions.len());
    for (attr, value) in raw.conditions {
        let values = match value {
            MatchValue::One(v) => vec![v.into_match_string()],
            MatchValue::AnyOf(vs) => vs.into_iter().map(Scalar::into_match_string).collect(),
        };
        if values.is_empty() {
            return Err(PdpError::InvalidPolicy(format!(
                "rule {id}: match on {attr} has no values"
            )));
        }
        let expect = if values.iter().any(|v| v == "*") {
            Expect::Present
        } else {
            Expect::AnyOf(values)
        };
        conditions.push(Condition { attr, expect });
    }

    Ok(Rule {
        id,
        effect: raw.effect,
        conditions,
    })
}

pub fn is_match(rule: &Rule, req: &DecisionRequest) -> bool {
    rule.conditions.iter().all(|c| {
        let Some(v) = req.get(&c.attr) else { return false; };
        match &c.expect {
            Expect::Present => true,
            Expect::AnyOf(vs) => {
                let v = v.as_match_str();
                vs.iter().any(|e| e.as_str() == &*v)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::BTreeMap;

    fn rule(conds: &[(&str, MatchValue)]) -> Rule {
        let mut m = BTreeMap::new();
        for (k, v) in conds {
            let v = match v {
                MatchValue::One(s) => MatchValue::One(s.clone()),
                MatchValue::AnyOf(vs) => MatchValue::AnyOf(vs.clone()),
            };
            m.insert(k.to_string(), v);
        }
        compile_rule(RuleDoc {
            id: "r".into(),
            effect: Effect::Permit,
            conditions: m,
        })
        .unwrap()
    }

    #[test]
    fn wildcard_requires_presence_only() {
        let r = rule(&[("action", MatchValue::One("*".into()))]);
        assert!(is_match(&r, &DecisionRequest::default().with("action", "read")));
        assert!(!is_match(&r, &DecisionRequest::default()));
    }

    #[test]
    fn any_of_compares_string_forms() {
        let r = rule(&[(
            "level",
            MatchValue::AnyOf(vec!["1".into(), "2".into()]),
        )]);
        let mut req = DecisionRequest::default();
        req.attributes
            .insert("level".into(), crate::protocol::AttributeValue::Int(2));
        assert!(is_match(&r, &req));
        assert!(!is_match(&r, &DecisionRequest::default().with("level", "3")));
    }

    #[test]
    fn non_string_rule_values_match_by_string_form() {
        let r = rule(&[
            ("level", MatchValue::One(Scalar::Int(3))),
            ("mfa", MatchValue::AnyOf(vec![Scalar::Bool(true)])),
        ]);
        assert!(is_match(
            &r,
            &DecisionRequest::default().with("level", "3").with("mfa", "true")
        ));
        assert!(!is_match(
            &r,
            &DecisionRequest::default().with("level", "3").with("mfa", "false")
        ));
    }

    #[test]
    fn empty_value_list_is_rejected() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), MatchValue::AnyOf(vec![]));
        let res = compile_rule(RuleDoc {
            id: "r".into(),
            effect: Effect::Deny,
            conditions: m,
        });
        assert!(res.is_err());
    }
}
