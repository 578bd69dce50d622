//! The `ResponseProvider` capability set that upstream generative-text
//! services, travel APIs, and database/HTTP connectors satisfy.

use async_trait::async_trait;
use orchestra_core::Value;

use crate::error::Result;

/// Static metadata the router uses for selection, independent of the
/// provider's runtime health.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub weight: f64,
    /// Self-hosted providers are only eligible when the caller opts in
    /// via `context.allow_local` (§4.3).
    pub is_local: bool,
    pub default_model: String,
    /// A higher-quality variant offered for demanding request types.
    pub reasoning_model: Option<String>,
    /// Advertises a stronger reasoning capability, preferred for
    /// `code_generation` and analytical request types.
    pub has_reasoning_capability: bool,
}

impl ProviderInfo {
    /// Pick the model to use for `request_type` when the caller did not
    /// specify one explicitly (§4.3 "Model selection").
    pub fn preferred_model(&self, request_type: &str) -> &str {
        let wants_reasoning = request_type == "code_generation" || request_type == "analysis";
        if wants_reasoning && self.has_reasoning_capability {
            self.reasoning_model.as_deref().unwrap_or(&self.default_model)
        } else {
            &self.default_model
        }
    }
}

/// A single unit of work dispatched to a provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub request_type: String,
    pub query: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Outcome of a successful provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub data: Value,
    pub tokens_used: u64,
    pub estimated_cost: f64,
}

/// Capability set an upstream provider must satisfy. Implementations wrap
/// generative-text services, travel APIs, or database/HTTP connectors
/// behind a uniform async call.
#[async_trait]
pub trait ResponseProvider: Send + Sync {
    fn info(&self) -> &ProviderInfo;

    async fn call(&self, request: &ProviderRequest) -> Result<ProviderResponse>;
}
