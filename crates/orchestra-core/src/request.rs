//! Request/response types delivered to the core by an (out of scope)
//! authentication and ingress layer.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::value::{Value, ValueMap};

/// A user's identity and authorization context, as resolved by ingress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub id: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl UserContext {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// The calling client/application, distinct from the end user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientContext {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub org_id: String,
}

/// An immutable request handed to the core for a single call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub request_id: String,
    pub request_type: String,
    pub query: String,
    pub user: UserContext,
    pub client: ClientContext,
    #[serde(default)]
    pub context: ValueMap,
}

impl Request {
    /// Read a dotted-path field off the request for policy condition
    /// evaluation. Recognized roots: `query`, `request_type`, `user.*`,
    /// `client.*`, `context.<key>`. `risk_score` is handled separately by
    /// the policy engine since it depends on the computed risk, not the
    /// raw request.
    pub fn field(&self, path: &str) -> Option<Value> {
        match path {
            "query" => Some(Value::string(self.query.clone())),
            "request_type" => Some(Value::string(self.request_type.clone())),
            "user.role" => Some(Value::string(self.user.role.clone())),
            "user.email" => Some(Value::string(self.user.email.clone())),
            "user.tenant_id" => Some(Value::string(self.user.tenant_id.clone())),
            "user.id" => Some(Value::string(self.user.id.clone())),
            "user.permissions" => Some(Value::List(
                self.user
                    .permissions
                    .iter()
                    .map(|p| Value::string(p.clone()))
                    .collect(),
            )),
            "client.id" => Some(Value::string(self.client.id.clone())),
            "client.name" => Some(Value::string(self.client.name.clone())),
            "client.org_id" => Some(Value::string(self.client.org_id.clone())),
            other => other
                .strip_prefix("context.")
                .and_then(|key| self.context.get(key))
                .cloned(),
        }
    }

    /// Context override: force a provider by name (`context.provider`).
    pub fn forced_provider(&self) -> Option<&str> {
        match self.context.get("provider") {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Context override: allow selection of self-hosted providers.
    pub fn allow_local(&self) -> bool {
        matches!(self.context.get("allow_local"), Some(v) if v.as_bool() == Some(true))
    }

    /// The requested max_tokens, if the caller supplied one.
    pub fn max_tokens(&self) -> Option<u32> {
        self.context
            .get("max_tokens")
            .and_then(|v| v.as_i64())
            .and_then(|n| u32::try_from(n).ok())
    }
}

/// Policy metadata surfaced alongside a `Response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyInfo {
    pub applied_policies: Vec<String>,
    pub risk_score: f32,
    pub processing_time_ms: u64,
}

/// The egress shape returned for a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub request_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processing_time_ms: u64,
    pub policy_info: PolicyInfo,
}

impl Response {
    pub fn blocked(request_id: impl Into<String>, reason: String, policy_info: PolicyInfo) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            data: None,
            error: Some(reason),
            processing_time_ms: policy_info.processing_time_ms,
            policy_info,
        }
    }

    pub fn ok(request_id: impl Into<String>, data: Value, policy_info: PolicyInfo, processing_time_ms: u64) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            data: Some(data),
            error: None,
            processing_time_ms,
            policy_info,
        }
    }
}

/// Helper used by tests and demo seeding to build a `ValueMap` quickly.
pub fn value_map(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> ValueMap {
    let mut map: BTreeMap<String, Value> = BTreeMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> Request {
        Request {
            request_id: "r1".into(),
            request_type: "chat".into(),
            query: "hello".into(),
            user: UserContext {
                id: "u1".into(),
                email: "a@b.com".into(),
                role: "admin".into(),
                tenant_id: "acme".into(),
                permissions: BTreeSet::from(["read".to_string()]),
            },
            client: ClientContext {
                id: "c1".into(),
                name: "app".into(),
                org_id: "org1".into(),
            },
            context: value_map([("provider", Value::string("openai")), ("allow_local", Value::Bool(false))]),
        }
    }

    #[test]
    fn field_reads_nested_user_path() {
        let r = sample_request();
        assert_eq!(r.field("user.role"), Some(Value::string("admin")));
        assert_eq!(r.field("user.tenant_id"), Some(Value::string("acme")));
    }

    #[test]
    fn field_reads_context_key() {
        let r = sample_request();
        assert_eq!(r.field("context.provider"), Some(Value::string("openai")));
    }

    #[test]
    fn forced_provider_reads_context() {
        let r = sample_request();
        assert_eq!(r.forced_provider(), Some("openai"));
    }

    #[test]
    fn unknown_field_is_none() {
        let r = sample_request();
        assert_eq!(r.field("nonexistent"), None);
    }
}
