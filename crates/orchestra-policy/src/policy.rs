//! Policy definitions and persistence-format (de)serialization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::PolicyAction;
use crate::condition::PolicyCondition;

/// The kind of policy, used for reporting/grouping only — evaluation
/// treats all types uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyType {
    Content,
    User,
    Risk,
    Cost,
}

/// A named, ordered set of conditions (AND) and actions.
///
/// Serializes to the durable persistence format (§6 "Policy persistence
/// format"): `id, name, description, type, conditions, actions, priority,
/// enabled, tenant_id, created_at, updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    #[serde(rename = "id")]
    pub policy_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    #[serde(default)]
    pub conditions: Vec<PolicyCondition>,
    #[serde(default)]
    pub actions: Vec<PolicyAction>,
    pub priority: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Empty string means global (applies to every tenant).
    #[serde(default)]
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Policy {
    /// A policy with zero conditions is never applied, regardless of
    /// `enabled`/`tenant_id` (§3 invariant).
    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Applicability gate used by the engine's policy-selection pass
    /// (§4.1 step 3), independent of condition matching.
    pub fn is_selectable(&self, tenant_id: &str) -> bool {
        self.enabled
            && self.has_conditions()
            && (self.tenant_id.is_empty() || self.tenant_id == tenant_id)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PolicyAction;
    use crate::condition::Operator;
    use orchestra_core::Value;

    fn sample() -> Policy {
        Policy {
            policy_id: "p1".into(),
            name: "block-sql-injection".into(),
            description: "blocks high risk queries".into(),
            policy_type: PolicyType::Risk,
            conditions: vec![PolicyCondition {
                field: "risk_score".into(),
                operator: Operator::GreaterThan,
                value: Value::Float(0.8),
            }],
            actions: vec![PolicyAction::Block {
                reason: "high risk".into(),
            }],
            priority: 100,
            enabled: true,
            tenant_id: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn roundtrips_through_json() {
        let p = sample();
        let json = p.to_json().unwrap();
        let back = Policy::from_json(&json).unwrap();
        assert_eq!(back.policy_id, p.policy_id);
        assert_eq!(back.conditions.len(), 1);
        assert_eq!(back.actions.len(), 1);
    }

    #[test]
    fn zero_conditions_never_selectable() {
        let mut p = sample();
        p.conditions.clear();
        assert!(!p.is_selectable(""));
    }

    #[test]
    fn tenant_scoping() {
        let mut p = sample();
        p.tenant_id = "acme".into();
        assert!(p.is_selectable("acme"));
        assert!(!p.is_selectable("other-tenant"));

        p.tenant_id.clear();
        assert!(p.is_selectable("any-tenant"));
    }
}
