//! Orchestra Router
//!
//! Provider-neutral request routing: weighted/round-robin/failover
//! selection across upstream response providers, rolling-window health
//! tracking, and per-provider metrics.

pub mod error;
pub mod health;
pub mod metrics;
pub mod provider;
pub mod router;
pub mod strategy;

pub use error::{Error, Result};
pub use health::ProviderHealth;
pub use metrics::ProviderMetrics;
pub use provider::{ProviderInfo, ProviderRequest, ProviderResponse, ResponseProvider};
pub use router::ProviderRouter;
pub use strategy::{Candidate, RoutingStrategy, Selector};

pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::provider::{ProviderInfo, ProviderRequest, ProviderResponse, ResponseProvider};
    pub use crate::router::ProviderRouter;
    pub use crate::strategy::RoutingStrategy;
}
