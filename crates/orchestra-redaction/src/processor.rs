//! Response Processor (C5): detects PII in structured step output and
//! redacts anything the calling user isn't permitted to see.

use std::collections::{BTreeMap, HashSet};

use orchestra_core::{Result, UserContext, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detector::{PiiCategory, PiiDetector};
use crate::strategy::{default_strategy, Redactor};

/// Side-channel summary of what a `ResponseProcessor::process` call did,
/// surfaced alongside the (possibly redacted) output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactionInfo {
    pub has_redactions: bool,
    pub count: usize,
    pub fields: Vec<String>,
}

impl RedactionInfo {
    fn record(&mut self, path: &str) {
        self.has_redactions = true;
        self.count += 1;
        self.fields.push(path.to_string());
    }
}

/// Scans output for PII, computes the user's allow-listed categories from
/// role/permissions, and redacts anything outside that allow-list. A
/// `redact` policy action's field list can additionally force redaction
/// of named fields regardless of the user's allow-list (§4.1 step 5).
pub struct ResponseProcessor {
    detector: PiiDetector,
}

impl ResponseProcessor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            detector: PiiDetector::new()?,
        })
    }

    /// Compute which PII categories `user` may see unredacted.
    /// `admin` sees everything; otherwise a permission of the form
    /// `pii:<category>` (e.g. `pii:email`) grants that one category.
    pub fn allowed_categories(&self, user: &UserContext) -> HashSet<PiiCategory> {
        if user.role == "admin" {
            return ALL_CATEGORIES.iter().copied().collect();
        }

        user.permissions
            .iter()
            .filter_map(|perm| perm.strip_prefix("pii:"))
            .filter_map(category_from_name)
            .collect()
    }

    /// Redact `value` in place (returning a new tree) for `user`,
    /// additionally forcing redaction of any field in `forced_fields`
    /// (matched case-insensitively against the leaf's map key or full
    /// dotted path) regardless of role.
    pub fn process(&self, value: &Value, user: &UserContext, forced_fields: &[String]) -> (Value, RedactionInfo) {
        let allowed = self.allowed_categories(user);
        let forced: HashSet<String> = forced_fields.iter().map(|f| f.to_ascii_lowercase()).collect();
        let mut info = RedactionInfo::default();
        let redacted = self.transform(value, "", None, &allowed, &forced, &mut info);
        if info.has_redactions {
            debug!(count = info.count, fields = ?info.fields, "response processor redacted fields");
        }
        (redacted, info)
    }

    fn transform(
        &self,
        value: &Value,
        path: &str,
        key_hint: Option<&str>,
        allowed: &HashSet<PiiCategory>,
        forced: &HashSet<String>,
        info: &mut RedactionInfo,
    ) -> Value {
        match value {
            Value::String(s) => self.transform_leaf(s, path, key_hint, allowed, forced, info),
            Value::Map(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map.iter() {
                    let child_path = join_path(path, k);
                    out.insert(k.clone(), self.transform(v, &child_path, Some(k), allowed, forced, info));
                }
                Value::Map(out)
            }
            Value::List(items) => Value::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let child_path = join_path(path, &i.to_string());
                        self.transform(item, &child_path, None, allowed, forced, info)
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn transform_leaf(
        &self,
        text: &str,
        path: &str,
        key_hint: Option<&str>,
        allowed: &HashSet<PiiCategory>,
        forced: &HashSet<String>,
        info: &mut RedactionInfo,
    ) -> Value {
        let is_forced = key_hint.is_some_and(|k| forced.contains(&k.to_ascii_lowercase()))
            || forced.contains(&path.to_ascii_lowercase());

        let detected = self.detector.leaf_categories(text, key_hint);

        if is_forced {
            info.record(path);
            return Value::string(Redactor::apply(
                detected.first().map(|c| default_strategy(*c)).unwrap_or(crate::strategy::RedactionStrategy::FullReplacement),
                text,
            ));
        }

        let disallowed = detected.iter().find(|c| !allowed.contains(c));
        match disallowed {
            Some(category) => {
                info.record(path);
                Value::string(Redactor::apply(default_strategy(*category), text))
            }
            None => Value::string(text.to_string()),
        }
    }
}

impl Default for ResponseProcessor {
    fn default() -> Self {
        Self::new().expect("built-in PII patterns are statically valid regexes")
    }
}

const ALL_CATEGORIES: &[PiiCategory] = &[
    PiiCategory::Ssn,
    PiiCategory::Email,
    PiiCategory::Phone,
    PiiCategory::CreditCard,
    PiiCategory::Password,
    PiiCategory::ApiKey,
];

fn category_from_name(name: &str) -> Option<PiiCategory> {
    match name {
        "ssn" => Some(PiiCategory::Ssn),
        "email" => Some(PiiCategory::Email),
        "phone" => Some(PiiCategory::Phone),
        "credit_card" => Some(PiiCategory::CreditCard),
        "password" => Some(PiiCategory::Password),
        "api_key" => Some(PiiCategory::ApiKey),
        _ => None,
    }
}

fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn user(role: &str, permissions: &[&str]) -> UserContext {
        UserContext {
            id: "u1".into(),
            email: "u@x.com".into(),
            role: role.into(),
            tenant_id: String::new(),
            permissions: permissions.iter().map(|p| p.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn map(pairs: &[(&str, Value)]) -> Value {
        let mut m = BTreeMap::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        Value::Map(m)
    }

    #[test]
    fn admin_sees_everything_unredacted() {
        let processor = ResponseProcessor::new().unwrap();
        let input = map(&[("ssn", Value::string("123-45-6789"))]);
        let (output, info) = processor.process(&input, &user("admin", &[]), &[]);
        assert!(!info.has_redactions);
        match output {
            Value::Map(m) => assert_eq!(m.get("ssn").unwrap().as_display_string(), "123-45-6789"),
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn regular_user_gets_ssn_masked() {
        let processor = ResponseProcessor::new().unwrap();
        let input = map(&[("ssn", Value::string("123-45-6789"))]);
        let (output, info) = processor.process(&input, &user("user", &[]), &[]);
        assert!(info.has_redactions);
        assert_eq!(info.fields, vec!["ssn".to_string()]);
        match output {
            Value::Map(m) => assert_eq!(m.get("ssn").unwrap().as_display_string(), "***6789"),
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn permission_grants_single_category_visibility() {
        let processor = ResponseProcessor::new().unwrap();
        let input = map(&[
            ("ssn", Value::string("123-45-6789")),
            ("password", Value::string("hunter2")),
        ]);
        let (output, info) = processor.process(&input, &user("user", &["pii:ssn"]), &[]);
        assert_eq!(info.count, 1);
        match output {
            Value::Map(m) => {
                assert_eq!(m.get("ssn").unwrap().as_display_string(), "123-45-6789");
                assert_eq!(m.get("password").unwrap().as_display_string(), "[REDACTED]");
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn policy_forced_field_redacts_even_for_admin() {
        let processor = ResponseProcessor::new().unwrap();
        let input = map(&[("notes", Value::string("internal memo"))]);
        let (output, info) = processor.process(&input, &user("admin", &[]), &["notes".to_string()]);
        assert!(info.has_redactions);
        match output {
            Value::Map(m) => assert_eq!(m.get("notes").unwrap().as_display_string(), "[REDACTED]"),
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn clean_output_is_untouched() {
        let processor = ResponseProcessor::new().unwrap();
        let input = map(&[("summary", Value::string("all clear"))]);
        let (_, info) = processor.process(&input, &user("user", &[]), &[]);
        assert!(!info.has_redactions);
    }
}
