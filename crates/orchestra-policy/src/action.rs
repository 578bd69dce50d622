//! Policy action definitions

use serde::{Deserialize, Serialize};

/// Action to take when a policy's conditions all match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    /// Deny the request.
    Block {
        reason: String,
    },

    /// Mark fields for redaction once the step emits structured output.
    /// The policy engine itself does not redact; it records the field
    /// list for `orchestra-redaction` to apply downstream (§4.1 step 5).
    Redact {
        fields: Vec<String>,
    },

    /// Emit an audit alert. Fired asynchronously and never affects the
    /// allow/deny decision.
    Alert {
        category: String,
        #[serde(default = "default_alert_severity")]
        severity: AlertSeverity,
    },

    /// Record a log-only side effect.
    Log {
        message: String,
        #[serde(default)]
        level: LogLevel,
    },

    /// Multiply the running risk score by a fixed modifier.
    ModifyRisk {
        modifier: f32,
    },

    /// Signal that this request needs a human approval before the
    /// workflow may proceed past the step that triggered it.
    RequireApproval {
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

fn default_alert_severity() -> AlertSeverity {
    AlertSeverity::Medium
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_action_roundtrips() {
        let json = r#"{"type": "block", "reason": "high risk"}"#;
        let action: PolicyAction = serde_json::from_str(json).unwrap();
        match action {
            PolicyAction::Block { reason } => assert_eq!(reason, "high risk"),
            _ => panic!("wrong action"),
        }
    }

    #[test]
    fn require_approval_roundtrips() {
        let json = r#"{"type": "require_approval", "reason": "needs review"}"#;
        let action: PolicyAction = serde_json::from_str(json).unwrap();
        assert!(matches!(action, PolicyAction::RequireApproval { .. }));
    }
}
