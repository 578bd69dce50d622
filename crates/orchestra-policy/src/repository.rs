//! Policy storage seam and the background hot-reload loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::policy::Policy;

/// Durable backing store for policies. Implementations might read from a
/// relational database, a config-map volume, or a static file — the engine
/// only needs `load_all`.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn load_all(&self) -> Result<Vec<Policy>, String>;
}

/// A repository that always returns a fixed set, useful for tests and for
/// deployments with no durable store configured.
pub struct StaticPolicyRepository {
    policies: Vec<Policy>,
}

impl StaticPolicyRepository {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }
}

#[async_trait]
impl PolicyRepository for StaticPolicyRepository {
    async fn load_all(&self) -> Result<Vec<Policy>, String> {
        Ok(self.policies.clone())
    }
}

/// Holds the current, atomically-swappable snapshot of loaded policies.
#[derive(Default)]
pub struct PolicySnapshot {
    inner: RwLock<Arc<Vec<Policy>>>,
}

impl PolicySnapshot {
    pub fn new(initial: Vec<Policy>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn get(&self) -> Arc<Vec<Policy>> {
        self.inner.read().clone()
    }

    pub fn swap(&self, next: Vec<Policy>) {
        *self.inner.write() = Arc::new(next);
    }
}

/// Reject duplicate `policy_id`s and policies with unparseable regexes,
/// per §4.1 "Reload" / "Failure semantics". Returns the filtered, valid
/// set plus the rejected ids for logging.
pub fn validate_load(policies: Vec<Policy>) -> (Vec<Policy>, Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    let mut valid = Vec::new();
    let mut rejected = Vec::new();

    for policy in policies {
        if !seen.insert(policy.policy_id.clone()) {
            rejected.push(policy.policy_id.clone());
            continue;
        }

        if policy
            .conditions
            .iter()
            .any(|c| matches!(c.operator, crate::condition::Operator::Regex) && !regex_compiles(&c.value))
        {
            rejected.push(policy.policy_id.clone());
            continue;
        }

        valid.push(policy);
    }

    (valid, rejected)
}

fn regex_compiles(value: &orchestra_core::Value) -> bool {
    regex::Regex::new(&value.as_display_string()).is_ok()
}

/// Poll `repository` every `interval`, appending `default_policies` to
/// whatever loads successfully, and swap `snapshot` atomically. A failed
/// poll logs a warning and leaves the existing snapshot untouched.
pub async fn run_reload_loop(
    repository: Arc<dyn PolicyRepository>,
    snapshot: Arc<PolicySnapshot>,
    default_policies: Vec<Policy>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        reload_once(repository.as_ref(), &snapshot, &default_policies).await;
    }
}

async fn reload_once(
    repository: &dyn PolicyRepository,
    snapshot: &PolicySnapshot,
    default_policies: &[Policy],
) {
    match repository.load_all().await {
        Ok(mut loaded) => {
            loaded.extend(default_policies.iter().cloned());
            let (valid, rejected) = validate_load(loaded);
            if !rejected.is_empty() {
                warn!(count = rejected.len(), ids = ?rejected, "rejected policies at reload");
            }
            info!(count = valid.len(), "policy snapshot reloaded");
            snapshot.swap(valid);
        }
        Err(err) => {
            warn!(error = %err, "policy repository reload failed, keeping previous snapshot");
        }
    }
}
