//! PII Detector: matches patterns (SSN, email, phone, credit-card) across
//! string leaves of a `Value` tree, and flags structured fields whose
//! *names* suggest PII even when the value itself doesn't match a pattern
//! (e.g. a `password` field holding an opaque token).

use std::collections::BTreeMap;

use orchestra_core::{Error, Result, Value};
use regex::Regex;

/// A category of detected sensitive data. `Custom` covers a field-name
/// hit with no corresponding pattern category (e.g. `api_key`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PiiCategory {
    Ssn,
    Email,
    Phone,
    CreditCard,
    Password,
    ApiKey,
}

impl PiiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiCategory::Ssn => "ssn",
            PiiCategory::Email => "email",
            PiiCategory::Phone => "phone",
            PiiCategory::CreditCard => "credit_card",
            PiiCategory::Password => "password",
            PiiCategory::ApiKey => "api_key",
        }
    }

    /// Field-name hints that flag a leaf as this category regardless of
    /// whether the value itself matches a pattern. Matched case-insensitively
    /// as a substring of the field name.
    fn name_hints(&self) -> &'static [&'static str] {
        match self {
            PiiCategory::Ssn => &["ssn", "social_security"],
            PiiCategory::Email => &["email"],
            PiiCategory::Phone => &["phone", "mobile", "telephone"],
            PiiCategory::CreditCard => &["credit_card", "card_number", "cc_number"],
            PiiCategory::Password => &["password", "passwd", "pwd"],
            PiiCategory::ApiKey => &["api_key", "apikey", "secret_key", "access_token"],
        }
    }

    fn all() -> &'static [PiiCategory] {
        &[
            PiiCategory::Ssn,
            PiiCategory::Email,
            PiiCategory::Phone,
            PiiCategory::CreditCard,
            PiiCategory::Password,
            PiiCategory::ApiKey,
        ]
    }
}

/// A single detected occurrence of sensitive data, addressed by a
/// dot-separated path into the scanned `Value` tree (`""` for the root
/// scalar itself, `"a.b"` for a nested map key, `"a.2"` for a list index).
#[derive(Debug, Clone)]
pub struct PiiMatch {
    pub path: String,
    pub category: PiiCategory,
}

pub struct PiiDetector {
    email: Regex,
    phone: Regex,
    ssn: Regex,
    credit_card: Regex,
}

impl PiiDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            email: compile(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")?,
            phone: compile(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b")?,
            ssn: compile(r"\b\d{3}-\d{2}-\d{4}\b")?,
            credit_card: compile(r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b")?,
        })
    }

    /// Walk `value`, returning every detected PII occurrence. Field-name
    /// hints are checked first (cheap, and some categories — `password`,
    /// `api_key` — have no reliable content pattern); pattern matching
    /// covers string leaves regardless of their key.
    pub fn scan(&self, value: &Value) -> Vec<PiiMatch> {
        let mut matches = Vec::new();
        self.walk(value, "", None, &mut matches);
        matches
    }

    fn walk(&self, value: &Value, path: &str, key_hint: Option<&str>, out: &mut Vec<PiiMatch>) {
        if let Some(key) = key_hint {
            if let Some(category) = category_for_field_name(key) {
                out.push(PiiMatch {
                    path: path.to_string(),
                    category,
                });
            }
        }

        match value {
            Value::String(s) => {
                for category in self.content_categories(s) {
                    if !out.iter().any(|m| m.path == path && m.category == category) {
                        out.push(PiiMatch {
                            path: path.to_string(),
                            category,
                        });
                    }
                }
            }
            Value::Map(map) => {
                for (k, v) in map.iter() {
                    let child_path = if path.is_empty() {
                        k.clone()
                    } else {
                        format!("{path}.{k}")
                    };
                    self.walk(v, &child_path, Some(k), out);
                }
            }
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    let child_path = if path.is_empty() {
                        i.to_string()
                    } else {
                        format!("{path}.{i}")
                    };
                    self.walk(item, &child_path, None, out);
                }
            }
            _ => {}
        }
    }

    /// Categories detected for a single leaf, combining the field-name hint
    /// (if any) with content-pattern matches. The name hint is listed first
    /// since it is the more specific signal (used by the redaction
    /// processor to pick a default strategy when multiple categories hit).
    pub fn leaf_categories(&self, text: &str, key_hint: Option<&str>) -> Vec<PiiCategory> {
        let mut categories = Vec::new();
        if let Some(key) = key_hint {
            if let Some(category) = category_for_field_name(key) {
                categories.push(category);
            }
        }
        for category in self.content_categories(text) {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        categories
    }

    fn content_categories(&self, text: &str) -> Vec<PiiCategory> {
        let mut hits = Vec::new();
        if self.ssn.is_match(text) {
            hits.push(PiiCategory::Ssn);
        }
        if self.email.is_match(text) {
            hits.push(PiiCategory::Email);
        }
        if self.credit_card.is_match(text) {
            hits.push(PiiCategory::CreditCard);
        }
        // Phone overlaps with SSN's digit shape; only flag it when SSN did
        // not already match, per the "one classifier's hit wins" scan order
        // documented for this field.
        if !hits.contains(&PiiCategory::Ssn) && self.phone.is_match(text) {
            hits.push(PiiCategory::Phone);
        }
        hits
    }
}

impl Default for PiiDetector {
    fn default() -> Self {
        Self::new().expect("built-in PII patterns are statically valid regexes")
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::redaction(format!("failed to compile PII pattern: {e}")))
}

fn category_for_field_name(field: &str) -> Option<PiiCategory> {
    let lower = field.to_ascii_lowercase();
    PiiCategory::all()
        .iter()
        .find(|cat| cat.name_hints().iter().any(|hint| lower.contains(hint)))
        .copied()
}

/// Group matches by category, useful for reporting.
pub fn group_by_category(matches: &[PiiMatch]) -> BTreeMap<&'static str, Vec<String>> {
    let mut grouped: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    for m in matches {
        grouped.entry(m.category.as_str()).or_default().push(m.path.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as StdMap;

    #[test]
    fn detects_email_in_string_leaf() {
        let detector = PiiDetector::new().unwrap();
        let matches = detector.scan(&Value::string("reach me at a@b.com please"));
        assert!(matches.iter().any(|m| m.category == PiiCategory::Email));
    }

    #[test]
    fn detects_ssn_pattern() {
        let detector = PiiDetector::new().unwrap();
        let matches = detector.scan(&Value::string("ssn is 123-45-6789"));
        assert!(matches.iter().any(|m| m.category == PiiCategory::Ssn));
    }

    #[test]
    fn field_name_alone_flags_password() {
        let detector = PiiDetector::new().unwrap();
        let mut map = StdMap::new();
        map.insert("password".to_string(), Value::string("opaque-token-xyz"));
        let matches = detector.scan(&Value::Map(map));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, PiiCategory::Password);
        assert_eq!(matches[0].path, "password");
    }

    #[test]
    fn clean_text_yields_no_matches() {
        let detector = PiiDetector::new().unwrap();
        assert!(detector.scan(&Value::string("nothing sensitive here")).is_empty());
    }

    #[test]
    fn nested_map_paths_are_dotted() {
        let detector = PiiDetector::new().unwrap();
        let mut inner = StdMap::new();
        inner.insert("email".to_string(), Value::string("x@y.com"));
        let mut outer = StdMap::new();
        outer.insert("user".to_string(), Value::Map(inner));
        let matches = detector.scan(&Value::Map(outer));
        assert!(matches.iter().any(|m| m.path == "user.email"));
    }

    #[test]
    fn list_entries_get_index_paths() {
        let detector = PiiDetector::new().unwrap();
        let list = Value::List(vec![Value::string("clean"), Value::string("call 555-123-4567")]);
        let matches = detector.scan(&list);
        assert!(matches.iter().any(|m| m.path == "1" && m.category == PiiCategory::Phone));
    }
}
