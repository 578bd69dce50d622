//! Policy condition definitions

use orchestra_core::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Comparison operator for a policy condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Contains,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Regex,
    In,
}

/// A single condition within a policy. All conditions within a policy are
/// ANDed together; a policy with zero conditions is never applied (see
/// `Policy::is_applicable`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyCondition {
    /// Dotted field path: `query`, `request_type`, `user.role`,
    /// `user.email`, `user.tenant_id`, `user.permissions`, `client.id`,
    /// `client.name`, `risk_score`, `context.<key>`.
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl PolicyCondition {
    /// Evaluate this condition against a resolved field value. A type
    /// mismatch (e.g. `greater_than` against a non-numeric value) returns
    /// `false` rather than an error — the owning policy is treated as
    /// non-matching, never as a failure (§4.1 step 4).
    pub fn matches(&self, field_value: Option<&Value>) -> bool {
        let Some(field_value) = field_value else {
            return false;
        };

        match self.operator {
            Operator::Contains => {
                let haystack = field_value.as_display_string().to_lowercase();
                let needle = self.value.as_display_string().to_lowercase();
                haystack.contains(&needle)
            }
            Operator::Equals => values_equal(field_value, &self.value),
            Operator::NotEquals => !values_equal(field_value, &self.value),
            Operator::GreaterThan => match (field_value.as_f64(), self.value.as_f64()) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            Operator::LessThan => match (field_value.as_f64(), self.value.as_f64()) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
            Operator::Regex => {
                let pattern = self.value.as_display_string();
                match Regex::new(&pattern) {
                    Ok(re) => re.is_match(&field_value.as_display_string()),
                    Err(_) => false,
                }
            }
            Operator::In => match &self.value {
                Value::List(items) => items.iter().any(|item| values_equal(field_value, item)),
                _ => false,
            },
        }
    }
}

/// Loose equality: numeric values compare by coerced `f64`, everything
/// else by display-string equality (so `Value::Int(1)` equals
/// `Value::String("1")`, matching the coercion contract in `orchestra_core::Value`).
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(af), Some(bf)) = (a.as_f64(), b.as_f64()) {
        if matches!(a, Value::Int(_) | Value::Float(_)) || matches!(b, Value::Int(_) | Value::Float(_)) {
            return af == bf;
        }
    }
    a.as_display_string() == b.as_display_string()
}
