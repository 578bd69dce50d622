//! Step processor registry: maps a step's `type` to the implementation
//! that carries it out (C9). Mirrors the name-keyed capability registry
//! pattern this tree uses for upstream provider dispatch, generalized to
//! four step kinds: a generative call routed through C8, a named local
//! function, a named external connector (database/HTTP), and an
//! in-process conditional branch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orchestra_core::{value_map, Request, Value, ValueMap};
use orchestra_router::ProviderRouter;

use crate::aggregator::ResultAggregator;
use crate::error::{Error, Result};
use crate::execution::WorkflowExecution;
use crate::step::WorkflowStep;

/// The capability every step-type handler satisfies.
#[async_trait]
pub trait StepProcessor: Send + Sync {
    async fn process(
        &self,
        step: &WorkflowStep,
        input: &ValueMap,
        execution: &WorkflowExecution,
    ) -> Result<ValueMap>;
}

/// Name-keyed lookup from `WorkflowStep::step_type` to its processor,
/// built once by the caller and shared across executions.
#[derive(Default)]
pub struct StepProcessorRegistry {
    processors: HashMap<String, Arc<dyn StepProcessor>>,
}

impl StepProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    pub fn register(&mut self, step_type: impl Into<String>, processor: Arc<dyn StepProcessor>) -> &mut Self {
        self.processors.insert(step_type.into(), processor);
        self
    }

    pub fn get(&self, step_type: &str) -> Option<Arc<dyn StepProcessor>> {
        self.processors.get(step_type).cloned()
    }
}

/// A named, locally-registered function a `function` step may invoke.
/// Stands in for the out-of-scope business logic (flight search, hotel
/// search, ...) that a deployment wires in.
#[async_trait]
pub trait StepFunction: Send + Sync {
    async fn call(&self, parameters: &ValueMap) -> Result<ValueMap>;
}

/// A named database/HTTP connector a `connector` step may invoke,
/// receiving the step's `operation` and `statement` fields alongside its
/// resolved parameters.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn invoke(&self, operation: &str, statement: Option<&str>, parameters: &ValueMap) -> Result<ValueMap>;
}

/// Routes `llm`/generative steps through the provider router (C8),
/// wrapping the outcome as step output under `content`/`tokens_used`/
/// `estimated_cost`.
pub struct LlmStepProcessor {
    router: Arc<ProviderRouter>,
}

impl LlmStepProcessor {
    pub fn new(router: Arc<ProviderRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl StepProcessor for LlmStepProcessor {
    async fn process(
        &self,
        step: &WorkflowStep,
        input: &ValueMap,
        execution: &WorkflowExecution,
    ) -> Result<ValueMap> {
        let prompt = step
            .prompt
            .clone()
            .ok_or_else(|| Error::invalid_input(format!("step '{}' has no prompt", step.name)))?;

        let mut context = input.clone();
        if let Some(Value::String(provider)) = step.parameters.get("provider") {
            context.insert("provider".to_string(), Value::String(provider.clone()));
        }

        let request = Request {
            request_id: execution.id.clone(),
            request_type: "workflow_step".to_string(),
            query: prompt,
            user: execution.user.clone(),
            client: orchestra_core::ClientContext {
                id: "workflow-engine".to_string(),
                name: "orchestra-workflow".to_string(),
                org_id: String::new(),
            },
            context,
        };

        let (response, provider_info) = self.router.route(&request).await?;

        Ok(value_map([
            ("content", response.data.clone()),
            ("provider", Value::String(provider_info.name)),
            ("tokens_used", Value::Int(response.tokens_used as i64)),
            ("estimated_cost", Value::Float(response.estimated_cost)),
        ]))
    }
}

/// Dispatches `function` steps to a registered `StepFunction` by name.
pub struct FunctionStepProcessor {
    functions: HashMap<String, Arc<dyn StepFunction>>,
}

impl FunctionStepProcessor {
    pub fn new(functions: HashMap<String, Arc<dyn StepFunction>>) -> Self {
        Self { functions }
    }
}

#[async_trait]
impl StepProcessor for FunctionStepProcessor {
    async fn process(
        &self,
        step: &WorkflowStep,
        _input: &ValueMap,
        _execution: &WorkflowExecution,
    ) -> Result<ValueMap> {
        let name = step
            .function
            .as_deref()
            .ok_or_else(|| Error::invalid_input(format!("step '{}' has no function", step.name)))?;
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| Error::unknown_step_type(format!("function:{name}")))?;
        function.call(&step.parameters).await
    }
}

/// Dispatches `connector` steps to a registered `Connector` by name.
pub struct ConnectorStepProcessor {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorStepProcessor {
    pub fn new(connectors: HashMap<String, Arc<dyn Connector>>) -> Self {
        Self { connectors }
    }
}

#[async_trait]
impl StepProcessor for ConnectorStepProcessor {
    async fn process(
        &self,
        step: &WorkflowStep,
        _input: &ValueMap,
        _execution: &WorkflowExecution,
    ) -> Result<ValueMap> {
        let name = step
            .connector
            .as_deref()
            .ok_or_else(|| Error::invalid_input(format!("step '{}' has no connector", step.name)))?;
        let connector = self
            .connectors
            .get(name)
            .ok_or_else(|| Error::unknown_step_type(format!("connector:{name}")))?;
        let operation = step.operation.as_deref().unwrap_or("default");
        connector
            .invoke(operation, step.statement.as_deref(), &step.parameters)
            .await
    }
}

/// Evaluates `step.condition` as a dotted path into the merged input,
/// truthy when the resolved value's `as_bool` is `Some(true)`. Produces
/// `{ taken: bool, branch: <if_true|if_false step name> }` for the
/// template resolver and for the engine's branch-skip logic.
pub struct ConditionalStepProcessor;

#[async_trait]
impl StepProcessor for ConditionalStepProcessor {
    async fn process(
        &self,
        step: &WorkflowStep,
        input: &ValueMap,
        _execution: &WorkflowExecution,
    ) -> Result<ValueMap> {
        let condition = step
            .condition
            .as_deref()
            .ok_or_else(|| Error::invalid_input(format!("step '{}' has no condition", step.name)))?;

        let taken = dotted_truthy(input, condition);
        let branch = if taken {
            step.if_true.clone()
        } else {
            step.if_false.clone()
        };

        Ok(value_map([
            ("taken", Value::Bool(taken)),
            ("branch", branch.map(Value::String).unwrap_or(Value::Null)),
        ]))
    }
}

/// Dispatches `synthesizer` steps to the result aggregator (C12),
/// letting a workflow embed synthesis mid-pipeline rather than only at
/// the tail. Uses `execution.query` and every step completed so far.
pub struct SynthesizerStepProcessor {
    aggregator: ResultAggregator,
}

impl SynthesizerStepProcessor {
    pub fn new(router: Arc<ProviderRouter>) -> Self {
        Self {
            aggregator: ResultAggregator::new(router),
        }
    }
}

#[async_trait]
impl StepProcessor for SynthesizerStepProcessor {
    async fn process(
        &self,
        _step: &WorkflowStep,
        _input: &ValueMap,
        execution: &WorkflowExecution,
    ) -> Result<ValueMap> {
        let elapsed = chrono::Utc::now()
            .signed_duration_since(execution.start_time)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let query = match execution.input.get("query") {
            Some(Value::String(q)) => q.clone(),
            _ => execution.workflow_name.clone(),
        };
        let text = self.aggregator.aggregate(&query, &execution.steps, &execution.user).await;
        let stats = crate::aggregator::AggregationStats::compute(&execution.steps, elapsed);
        Ok(value_map([
            ("content", Value::String(text)),
            ("total_steps", Value::Int(stats.total as i64)),
            ("successful_steps", Value::Int(stats.successful as i64)),
            ("success_rate", Value::Float(stats.success_rate)),
        ]))
    }
}

fn dotted_truthy(map: &ValueMap, path: &str) -> bool {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return false;
    };
    let Some(mut current) = map.get(first).cloned() else {
        return false;
    };
    for segment in segments {
        current = match current {
            Value::Map(ref m) => match m.get(segment) {
                Some(v) => v.clone(),
                None => return false,
            },
            _ => return false,
        };
    }
    match current {
        Value::Bool(b) => b,
        Value::Null => false,
        other => other.as_bool().unwrap_or(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::StepExecution;
    use orchestra_core::UserContext;
    use std::collections::BTreeSet;

    fn user() -> UserContext {
        UserContext {
            id: "u1".into(),
            email: "u@x.com".into(),
            role: "user".into(),
            tenant_id: String::new(),
            permissions: BTreeSet::new(),
        }
    }

    struct Echo;

    #[async_trait]
    impl StepFunction for Echo {
        async fn call(&self, parameters: &ValueMap) -> Result<ValueMap> {
            Ok(parameters.clone())
        }
    }

    #[tokio::test]
    async fn function_processor_dispatches_by_name() {
        let mut functions: HashMap<String, Arc<dyn StepFunction>> = HashMap::new();
        functions.insert("echo".to_string(), Arc::new(Echo));
        let processor = FunctionStepProcessor::new(functions);

        let mut step = WorkflowStep::new("s1", "function");
        step.function = Some("echo".to_string());
        step.parameters = value_map([("x", Value::Int(1))]);

        let execution = WorkflowExecution::new("w", value_map([]), user());
        let output = processor.process(&step, &value_map([]), &execution).await.unwrap();
        assert_eq!(output.get("x"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn function_processor_errors_on_unknown_name() {
        let processor = FunctionStepProcessor::new(HashMap::new());
        let mut step = WorkflowStep::new("s1", "function");
        step.function = Some("missing".to_string());
        let execution = WorkflowExecution::new("w", value_map([]), user());
        let err = processor.process(&step, &value_map([]), &execution).await.unwrap_err();
        assert!(matches!(err, Error::UnknownStepType(_)));
    }

    #[tokio::test]
    async fn conditional_processor_picks_true_branch() {
        let processor = ConditionalStepProcessor;
        let mut step = WorkflowStep::new("gate", "conditional");
        step.condition = Some("eligible".to_string());
        step.if_true = Some("approve".to_string());
        step.if_false = Some("reject".to_string());

        let input = value_map([("eligible", Value::Bool(true))]);
        let execution = WorkflowExecution::new("w", value_map([]), user());
        let output = processor.process(&step, &input, &execution).await.unwrap();
        assert_eq!(output.get("taken"), Some(&Value::Bool(true)));
        assert_eq!(output.get("branch"), Some(&Value::String("approve".to_string())));
    }

    #[tokio::test]
    async fn conditional_processor_defaults_to_false_when_missing() {
        let processor = ConditionalStepProcessor;
        let mut step = WorkflowStep::new("gate", "conditional");
        step.condition = Some("nested.flag".to_string());
        step.if_false = Some("reject".to_string());

        let execution = WorkflowExecution::new("w", value_map([]), user());
        let output = processor.process(&step, &value_map([]), &execution).await.unwrap();
        assert_eq!(output.get("taken"), Some(&Value::Bool(false)));
        assert_eq!(output.get("branch"), Some(&Value::String("reject".to_string())));
    }

    struct MockProvider {
        info: orchestra_router::ProviderInfo,
    }

    #[async_trait]
    impl orchestra_router::ResponseProvider for MockProvider {
        fn info(&self) -> &orchestra_router::ProviderInfo {
            &self.info
        }

        async fn call(&self, _request: &orchestra_router::ProviderRequest) -> orchestra_router::Result<orchestra_router::ProviderResponse> {
            Ok(orchestra_router::ProviderResponse {
                data: Value::string("synthesized answer"),
                tokens_used: 5,
                estimated_cost: 0.0001,
            })
        }
    }

    #[tokio::test]
    async fn synthesizer_processor_aggregates_completed_steps() {
        let provider = Arc::new(MockProvider {
            info: orchestra_router::ProviderInfo {
                name: "p1".into(),
                weight: 1.0,
                is_local: false,
                default_model: "base".into(),
                reasoning_model: None,
                has_reasoning_capability: false,
            },
        });
        let router = Arc::new(orchestra_router::ProviderRouter::new(
            vec![provider],
            orchestra_router::RoutingStrategy::Weighted,
        ));
        let processor = SynthesizerStepProcessor::new(router);

        let mut execution = WorkflowExecution::new("w", value_map([("query", Value::string("plan my trip"))]), user());
        let mut completed = StepExecution::pending("flight-search", value_map([]));
        completed.complete(value_map([("content", Value::string("flight booked"))]), std::time::Instant::now());
        execution.steps.push(completed);

        let step = WorkflowStep::new("summary", "synthesizer");
        let output = processor.process(&step, &value_map([]), &execution).await.unwrap();
        assert_eq!(output.get("content"), Some(&Value::string("synthesized answer")));
        assert_eq!(output.get("successful_steps"), Some(&Value::Int(1)));
    }
}
