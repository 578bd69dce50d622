//! Result aggregator (C12): synthesizes a final answer across completed
//! step outputs, LLM-assisted with a concatenation fallback.

use std::sync::Arc;
use std::time::Duration;

use orchestra_core::{Request, UserContext, Value};
use orchestra_router::ProviderRouter;
use serde::{Deserialize, Serialize};

use crate::execution::{StepExecution, StepStatus};

/// Side-channel statistics emitted alongside the synthesized result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub total_duration: Duration,
}

impl AggregationStats {
    pub fn compute(steps: &[StepExecution], total_duration: Duration) -> Self {
        let total = steps.len();
        let successful = steps.iter().filter(|s| s.status == StepStatus::Completed).count();
        let failed = steps.iter().filter(|s| s.status == StepStatus::Failed).count();
        let success_rate = if total == 0 { 0.0 } else { successful as f64 / total as f64 };
        Self {
            total,
            successful,
            failed,
            success_rate,
            total_duration,
        }
    }
}

pub struct ResultAggregator {
    router: Arc<ProviderRouter>,
}

impl ResultAggregator {
    pub fn new(router: Arc<ProviderRouter>) -> Self {
        Self { router }
    }

    /// Synthesize across every `completed` step (§4.8). Falls back to a
    /// labeled concatenation referencing the original query when the
    /// synthesis call itself fails — the aggregator never fails the
    /// workflow on its own account.
    pub async fn aggregate(&self, query: &str, steps: &[StepExecution], user: &UserContext) -> String {
        let completed: Vec<&StepExecution> = steps.iter().filter(|s| s.status == StepStatus::Completed).collect();
        if completed.is_empty() {
            return format!("No step produced output for: {query}");
        }

        let prompt = build_synthesis_prompt(query, &completed);
        match self.synthesize(&prompt, user).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "synthesis call failed, falling back to concatenation");
                concatenate(query, &completed)
            }
        }
    }

    async fn synthesize(&self, prompt: &str, user: &UserContext) -> orchestra_router::Result<String> {
        let request = Request {
            request_id: "aggregation".to_string(),
            request_type: "synthesis".to_string(),
            query: prompt.to_string(),
            user: user.clone(),
            client: orchestra_core::ClientContext {
                id: "workflow-engine".to_string(),
                name: "orchestra-workflow".to_string(),
                org_id: String::new(),
            },
            context: orchestra_core::ValueMap::new(),
        };
        let (response, _) = self.router.route(&request).await?;
        Ok(response.data.as_display_string())
    }
}

fn build_synthesis_prompt(query: &str, completed: &[&StepExecution]) -> String {
    let mut prompt = format!("Original request: {query}\n\nSynthesize a single answer from these task results:\n");
    for step in completed {
        let rendered = step
            .output
            .as_ref()
            .map(|o| Value::Map(o.clone()).as_display_string())
            .unwrap_or_default();
        prompt.push_str(&format!("\n- {}: {}\n", step.name, rendered));
    }
    prompt
}

fn concatenate(query: &str, completed: &[&StepExecution]) -> String {
    let mut out = format!("Results for: {query}\n");
    for step in completed {
        let rendered = step
            .output
            .as_ref()
            .map(|o| Value::Map(o.clone()).as_display_string())
            .unwrap_or_default();
        out.push_str(&format!("\n[{}] {}\n", step.name, rendered));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_core::value_map;
    use std::collections::BTreeSet;

    fn step(name: &str, status: StepStatus, content: &str) -> StepExecution {
        let mut s = StepExecution::pending(name, value_map([]));
        s.status = status;
        if status == StepStatus::Completed {
            s.output = Some(value_map([("content", Value::String(content.to_string()))]));
        }
        s
    }

    #[test]
    fn stats_count_successful_and_failed() {
        let steps = vec![
            step("a", StepStatus::Completed, "x"),
            step("b", StepStatus::Failed, ""),
            step("c", StepStatus::Completed, "y"),
        ];
        let stats = AggregationStats::compute(&steps, Duration::from_secs(2));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn concatenate_includes_every_completed_step() {
        let steps = vec![step("a", StepStatus::Completed, "flight info"), step("b", StepStatus::Failed, "")];
        let refs: Vec<&StepExecution> = steps.iter().collect();
        let completed: Vec<&StepExecution> = refs.into_iter().filter(|s| s.status == StepStatus::Completed).collect();
        let text = concatenate("plan my trip", &completed);
        assert!(text.contains("plan my trip"));
        assert!(text.contains("flight info"));
        assert!(!text.contains("[b]"));
    }

    #[test]
    fn empty_success_set_yields_zero_rate() {
        let steps = vec![step("a", StepStatus::Failed, "")];
        let stats = AggregationStats::compute(&steps, Duration::from_secs(0));
        assert_eq!(stats.success_rate, 0.0);
    }
}
