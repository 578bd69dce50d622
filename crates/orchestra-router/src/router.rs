//! Provider router (C8): builds the outbound request, selects a provider,
//! calls it, falls back once on error, and records metrics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use orchestra_core::Request;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::health::ProviderHealth;
use crate::metrics::ProviderMetrics;
use crate::provider::{ProviderInfo, ProviderRequest, ProviderResponse, ResponseProvider};
use crate::strategy::{Candidate, RoutingStrategy, Selector};

struct ProviderEntry {
    provider: Arc<dyn ResponseProvider>,
    health: ProviderHealth,
    metrics: ProviderMetrics,
}

impl ProviderEntry {
    fn name(&self) -> &str {
        &self.provider.info().name
    }
}

/// A provider entry paired with its current weight, built fresh per
/// selection call so weight updates never need to touch per-entry state.
struct WeightedCandidate<'a> {
    entry: &'a ProviderEntry,
    weight: f64,
}

impl Candidate for WeightedCandidate<'_> {
    fn name(&self) -> &str {
        self.entry.name()
    }
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Selects among configured upstream providers and dispatches requests,
/// tracking health and per-provider metrics.
pub struct ProviderRouter {
    entries: Vec<ProviderEntry>,
    weights: RwLock<Arc<HashMap<String, f64>>>,
    selector: Selector,
}

impl ProviderRouter {
    pub fn new(providers: Vec<Arc<dyn ResponseProvider>>, strategy: RoutingStrategy) -> Self {
        let weights: HashMap<String, f64> = providers
            .iter()
            .map(|p| (p.info().name.clone(), p.info().weight))
            .collect();

        let entries = providers
            .into_iter()
            .map(|provider| ProviderEntry {
                provider,
                health: ProviderHealth::new(),
                metrics: ProviderMetrics::new(),
            })
            .collect();

        Self {
            entries,
            weights: RwLock::new(Arc::new(weights)),
            selector: Selector::new(strategy),
        }
    }

    /// Validate and atomically swap provider weights (§4.3 "Weight update
    /// contract"). All three conditions must hold or nothing changes.
    pub fn update_weights(&self, new_weights: HashMap<String, f64>) -> Result<()> {
        for (name, weight) in new_weights.iter() {
            if !self.entries.iter().any(|e| e.name() == name) {
                return Err(Error::UnknownProvider(name.clone()));
            }
            if *weight < 0.0 {
                return Err(Error::invalid_weights(format!("negative weight for {name}")));
            }
        }

        let sum: f64 = new_weights.values().sum();
        if !(0.99..=1.01).contains(&sum) {
            return Err(Error::invalid_weights(format!("weights sum to {sum}, expected ~1.0")));
        }

        *self.weights.write() = Arc::new(new_weights);
        Ok(())
    }

    fn healthy_candidates(&self, request: &Request) -> Vec<WeightedCandidate<'_>> {
        let weights = self.weights.read().clone();
        let forced = request.forced_provider();
        let allow_local = request.allow_local();

        self.entries
            .iter()
            .filter(|e| e.health.is_healthy())
            .filter(|e| allow_local || !e.provider.info().is_local)
            .filter(|e| forced.is_none_or_eq(e.name()))
            .map(|e| WeightedCandidate {
                weight: *weights.get(e.name()).unwrap_or(&e.provider.info().weight),
                entry: e,
            })
            .collect()
    }

    fn entry_by_name(&self, name: &str) -> Option<&ProviderEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Dispatch `request`. Builds a `ProviderRequest`, calls the selected
    /// provider, and on failure retries once against a different healthy
    /// provider (§4.3 "Failover").
    pub async fn route(&self, request: &Request) -> Result<(ProviderResponse, ProviderInfo)> {
        let candidates = self.healthy_candidates(request);
        if candidates.is_empty() {
            return Err(Error::NoHealthyProvider);
        }

        let chosen_name = self
            .selector
            .select(&candidates)
            .map(|c| c.name().to_string())
            .ok_or(Error::NoHealthyProvider)?;

        match self.call_provider(&chosen_name, request).await {
            Ok(result) => Ok(result),
            Err(first_err) => {
                warn!(provider = %chosen_name, error = %first_err, "provider call failed, attempting failover");

                let alternates: Vec<WeightedCandidate<'_>> = candidates
                    .into_iter()
                    .filter(|c| c.name() != chosen_name)
                    .collect();

                let Some(alternate_name) = self.selector.select(&alternates).map(|c| c.name().to_string()) else {
                    return Err(Error::AllProvidersFailed);
                };

                self.call_provider(&alternate_name, request)
                    .await
                    .map_err(|_| Error::AllProvidersFailed)
            }
        }
    }

    async fn call_provider(
        &self,
        name: &str,
        request: &Request,
    ) -> Result<(ProviderResponse, ProviderInfo)> {
        let entry = self
            .entry_by_name(name)
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))?;

        let info = entry.provider.info().clone();
        let model = request
            .context
            .get("model")
            .and_then(|v| v.as_template_str().map(str::to_string))
            .unwrap_or_else(|| info.preferred_model(&request.request_type).to_string());

        let provider_request = ProviderRequest {
            request_type: request.request_type.clone(),
            query: request.query.clone(),
            model: Some(model),
            max_tokens: request.max_tokens(),
        };

        let started = Instant::now();
        match entry.provider.call(&provider_request).await {
            Ok(response) => {
                entry
                    .metrics
                    .record_success(started.elapsed(), response.tokens_used, response.estimated_cost);
                entry.health.record_success();
                info!(provider = %name, latency_us = started.elapsed().as_micros(), "provider call succeeded");
                Ok((response, info))
            }
            Err(err) => {
                entry.metrics.record_error();
                entry.health.record_error();
                Err(err)
            }
        }
    }

    pub fn metrics_for(&self, name: &str) -> Option<(u64, u64)> {
        self.entry_by_name(name)
            .map(|e| (e.metrics.request_count(), e.metrics.error_count()))
    }

    pub fn is_healthy(&self, name: &str) -> Option<bool> {
        self.entry_by_name(name).map(|e| e.health.is_healthy())
    }
}

/// Small local extension so `forced.is_none_or_eq(name)` reads as "no
/// override, or the override names this provider".
trait OptionEqExt {
    fn is_none_or_eq(&self, other: &str) -> bool;
}

impl OptionEqExt for Option<&str> {
    fn is_none_or_eq(&self, other: &str) -> bool {
        match self {
            None => true,
            Some(name) => *name == other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderInfo;
    use async_trait::async_trait;
    use orchestra_core::{value_map, ClientContext, UserContext, Value};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        info: ProviderInfo,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResponseProvider for MockProvider {
        fn info(&self) -> &ProviderInfo {
            &self.info
        }

        async fn call(&self, _request: &ProviderRequest) -> Result<ProviderResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::provider("simulated failure"))
            } else {
                Ok(ProviderResponse {
                    data: Value::string("ok"),
                    tokens_used: 10,
                    estimated_cost: 0.001,
                })
            }
        }
    }

    fn provider(name: &str, weight: f64, fail: bool) -> Arc<dyn ResponseProvider> {
        Arc::new(MockProvider {
            info: ProviderInfo {
                name: name.into(),
                weight,
                is_local: false,
                default_model: "base".into(),
                reasoning_model: None,
                has_reasoning_capability: false,
            },
            fail,
            calls: AtomicUsize::new(0),
        })
    }

    fn request() -> Request {
        Request {
            request_id: "r1".into(),
            request_type: "chat".into(),
            query: "hi".into(),
            user: UserContext {
                id: "u1".into(),
                email: "u@x.com".into(),
                role: "user".into(),
                tenant_id: String::new(),
                permissions: BTreeSet::new(),
            },
            client: ClientContext {
                id: "c1".into(),
                name: String::new(),
                org_id: String::new(),
            },
            context: value_map([]),
        }
    }

    #[tokio::test]
    async fn failover_falls_to_healthy_alternate() {
        let router = ProviderRouter::new(
            vec![provider("a", 0.6, true), provider("b", 0.4, false)],
            RoutingStrategy::Failover {
                default_provider: "a".into(),
            },
        );

        let (_, info) = router.route(&request()).await.unwrap();
        assert_eq!(info.name, "b");
        assert_eq!(router.metrics_for("a").unwrap().1, 1);
        assert_eq!(router.metrics_for("b").unwrap().0, 1);
    }

    #[tokio::test]
    async fn all_providers_failing_is_an_error() {
        let router = ProviderRouter::new(
            vec![provider("a", 0.5, true), provider("b", 0.5, true)],
            RoutingStrategy::Weighted,
        );
        let result = router.route(&request()).await;
        assert!(matches!(result, Err(Error::AllProvidersFailed)));
    }

    #[tokio::test]
    async fn forced_provider_override_is_honored() {
        let router = ProviderRouter::new(
            vec![provider("a", 0.5, false), provider("b", 0.5, false)],
            RoutingStrategy::Weighted,
        );
        let mut req = request();
        req.context = value_map([("provider", Value::string("b"))]);
        let (_, info) = router.route(&req).await.unwrap();
        assert_eq!(info.name, "b");
    }

    #[test]
    fn update_weights_rejects_unknown_provider() {
        let router = ProviderRouter::new(vec![provider("a", 1.0, false)], RoutingStrategy::Weighted);
        let mut weights = HashMap::new();
        weights.insert("ghost".to_string(), 1.0);
        assert!(router.update_weights(weights).is_err());
    }

    #[test]
    fn update_weights_rejects_bad_sum() {
        let router = ProviderRouter::new(
            vec![provider("a", 0.5, false), provider("b", 0.5, false)],
            RoutingStrategy::Weighted,
        );
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.9);
        weights.insert("b".to_string(), 0.9);
        assert!(router.update_weights(weights).is_err());
    }

    #[test]
    fn update_weights_accepts_valid_set() {
        let router = ProviderRouter::new(
            vec![provider("a", 0.5, false), provider("b", 0.5, false)],
            RoutingStrategy::Weighted,
        );
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.3);
        weights.insert("b".to_string(), 0.7);
        assert!(router.update_weights(weights).is_ok());
    }
}
