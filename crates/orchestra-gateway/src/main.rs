//! Orchestra Gateway
//!
//! HTTP ingress that validates incoming requests, drives them through the
//! policy and workflow engines, routes generative calls across providers,
//! and exposes health/metrics endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use orchestra_policy::{PolicyEngine, PolicyRepository, PolicySnapshot, StaticPolicyRepository};
use orchestra_redaction::ResponseProcessor;
use orchestra_router::{ProviderInfo, ProviderRouter, RoutingStrategy};
use orchestra_telemetry::MetricsCollector;
use orchestra_workflow::{
    ConditionalStepProcessor, FunctionStepProcessor, InMemoryExecutionStore, LlmStepProcessor,
    StepProcessorRegistry, SynthesizerStepProcessor, WorkflowEngine,
};
use tokio::signal;
use tracing::{info, warn};

mod config;
mod error;
mod policy_bridge;
mod provider_http;
mod routes;
mod security;
mod state;
mod workflows;

use config::GatewaySettings;
use policy_bridge::{GatewayPolicyChecker, InMemoryApprovalService};
use provider_http::HttpResponseProvider;
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "orchestra-gateway")]
#[command(about = "Policy-gated workflow orchestration gateway", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Default generative backend URL, overriding the config file
    #[arg(short, long)]
    backend: Option<String>,

    /// Directory of workflow definition YAML files
    #[arg(short, long)]
    workflows: Option<String>,

    /// Listen address
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("Starting Orchestra Gateway");

    let settings = GatewaySettings::load(&cli.config, &cli)?;
    info!(listen = %settings.listen, port = settings.port, "configuration loaded");
    info!(workflows_dir = %settings.workflows_dir, policies_file = %settings.policies_file, "data sources");

    match config::check_service_secret() {
        Some(warning) => warn!("{warning}"),
        None => info!("service-to-service auth enabled"),
    }

    let metrics_handle = init_metrics()?;

    let state = build_state(&settings, metrics_handle.clone()).await?;

    let secret = security::ServiceSecret(std::env::var(config::ENV_SERVICE_SECRET).ok());
    let app = routes::create_router(state, secret);

    let addr: SocketAddr = format!("{}:{}", settings.listen, settings.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("gateway listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("shutdown signal received, stopping server...");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    info!("server shutdown complete");
    Ok(())
}

async fn build_state(settings: &GatewaySettings, prometheus_handle: PrometheusHandle) -> Result<AppState> {
    // Policy engine: static file-backed repository, reloaded on an
    // interval in the background (§4.1 "Reload"). A deployment with
    // `DATABASE_URL` set would swap in a database-backed repository here.
    let initial = load_initial_policies(&settings.policies_file);
    let snapshot = Arc::new(PolicySnapshot::new(initial.clone()));
    let repository: Arc<dyn PolicyRepository> = Arc::new(StaticPolicyRepository::new(initial));
    tokio::spawn(orchestra_policy::run_reload_loop(
        repository,
        snapshot.clone(),
        Vec::new(),
        Duration::from_secs(settings.policy_reload_interval_secs),
    ));
    let policy_engine = Arc::new(PolicyEngine::new(snapshot));

    // Provider router: one HTTP-backed provider per configured weight, or
    // a single default provider forwarding to `backend_url`.
    let strategy = parse_routing_strategy(settings);
    let providers = build_providers(settings);
    let router = Arc::new(ProviderRouter::new(providers, strategy));

    // Workflow engine: registry seeded with every built-in step type,
    // gated by the policy bridge and backed by an in-memory approval
    // service until an external HITL system is wired in.
    let mut registry = StepProcessorRegistry::new();
    registry.register("llm", Arc::new(LlmStepProcessor::new(router.clone())));
    registry.register("function", Arc::new(FunctionStepProcessor::new(Default::default())));
    registry.register(
        "connector",
        Arc::new(orchestra_workflow::ConnectorStepProcessor::new(Default::default())),
    );
    registry.register("conditional", Arc::new(ConditionalStepProcessor));
    registry.register("synthesizer", Arc::new(SynthesizerStepProcessor::new(router.clone())));

    let checker = Arc::new(GatewayPolicyChecker::new(policy_engine.clone()));
    let approvals = Arc::new(InMemoryApprovalService::new());
    let workflow_engine = Arc::new(WorkflowEngine::new(registry, checker, approvals.clone()));

    let workflows = Arc::new(workflows::load_workflows(&settings.workflows_dir));
    info!(count = workflows.len(), "workflows registered");

    let redaction = Arc::new(ResponseProcessor::new()?);
    let execution_store = Arc::new(InMemoryExecutionStore::new());
    let metrics = Arc::new(MetricsCollector::new());

    Ok(AppState {
        policy_engine,
        workflow_engine,
        router,
        redaction,
        execution_store,
        metrics,
        prometheus_handle,
        workflows,
        approvals,
    })
}

fn load_initial_policies(path: &str) -> Vec<orchestra_policy::Policy> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        info!(path = %path, "no static policy file found, starting with an empty policy set");
        return Vec::new();
    };
    match serde_yaml::from_str::<Vec<orchestra_policy::Policy>>(&contents) {
        Ok(policies) => {
            let (valid, rejected) = orchestra_policy::validate_load(policies);
            if !rejected.is_empty() {
                warn!(ids = ?rejected, "rejected invalid policies at startup");
            }
            valid
        }
        Err(err) => {
            warn!(path = %path, error = %err, "failed to parse policy file, starting with an empty policy set");
            Vec::new()
        }
    }
}

fn parse_routing_strategy(settings: &GatewaySettings) -> RoutingStrategy {
    match settings.routing_strategy.as_str() {
        "round_robin" | "round-robin" => RoutingStrategy::RoundRobin,
        "failover" => RoutingStrategy::Failover {
            default_provider: settings
                .default_provider
                .clone()
                .unwrap_or_else(|| "primary".to_string()),
        },
        _ => RoutingStrategy::Weighted,
    }
}

fn build_providers(settings: &GatewaySettings) -> Vec<Arc<dyn orchestra_router::ResponseProvider>> {
    let weights = settings.parsed_provider_weights();
    let entries = weights.unwrap_or_else(|| vec![("primary".to_string(), 1.0)]);

    entries
        .into_iter()
        .map(|(name, weight)| {
            let info = ProviderInfo {
                name,
                weight,
                is_local: false,
                default_model: "gpt-4o-mini".to_string(),
                reasoning_model: Some("gpt-4o".to_string()),
                has_reasoning_capability: true,
            };
            Arc::new(HttpResponseProvider::new(info, settings.backend_url.clone())) as Arc<dyn orchestra_router::ResponseProvider>
        })
        .collect()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("orchestra=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("orchestra=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;

    metrics::describe_counter!("orchestra_requests_total", "Total number of requests processed, by request_type");
    metrics::describe_counter!("orchestra_policy_decisions_total", "Total number of policy decisions, by outcome");
    metrics::describe_histogram!(
        "orchestra_workflow_step_latency_us",
        metrics::Unit::Microseconds,
        "Workflow step processing latency in microseconds, by step_type"
    );
    metrics::describe_counter!("orchestra_provider_errors_total", "Total number of provider call errors, by provider");

    Ok(handle)
}
