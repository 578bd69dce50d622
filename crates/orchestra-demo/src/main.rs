//! Orchestra Demo
//!
//! A synthetic traffic generator and one-shot workflow runner for
//! exercising a running `orchestra-gateway` without a real upstream.

use anyhow::Result;
use clap::Parser;
use orchestra_core::{value_map, UserContext, Value};
use serde::Serialize;
use tracing::info;

mod cli;
mod generator;
mod templates;

use cli::{Cli, Commands};
use generator::TrafficGenerator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::GenerateTraffic {
            target,
            rate,
            duration,
            templates,
            service_secret,
            verbose,
        } => {
            init_tracing(verbose);
            info!(%target, rate, duration, "starting traffic generation");
            let categories: Vec<String> = templates.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
            let generator = TrafficGenerator::new(target, service_secret);
            generator.run(rate, duration, categories).await;
        }
        Commands::RunWorkflow {
            target,
            workflow,
            input,
            service_secret,
            verbose,
        } => {
            init_tracing(verbose);
            run_workflow(&target, &workflow, &input, service_secret.as_deref()).await?;
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct ExecuteWorkflowBody {
    input: orchestra_core::ValueMap,
    user: UserContext,
}

async fn run_workflow(target: &str, workflow: &str, input_json: &str, service_secret: Option<&str>) -> Result<()> {
    let parsed: serde_json::Value = serde_json::from_str(input_json)?;
    let input = json_to_value_map(parsed);

    let body = ExecuteWorkflowBody {
        input,
        user: UserContext {
            id: "demo-user".to_string(),
            email: "demo@orchestra.local".to_string(),
            role: "user".to_string(),
            tenant_id: String::new(),
            permissions: Default::default(),
        },
    };

    let client = reqwest::Client::new();
    let mut builder = client
        .post(format!("{target}/v1/workflows/{workflow}/execute"))
        .json(&body);
    if let Some(secret) = service_secret {
        builder = builder.header("x-internal-service-secret", secret);
    }

    let response = builder.send().await?;
    let status = response.status();
    let text = response.text().await?;
    println!("status: {status}\n{text}");
    Ok(())
}

fn json_to_value_map(value: serde_json::Value) -> orchestra_core::ValueMap {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = std::collections::BTreeMap::new();
            for (k, v) in map {
                out.insert(k, json_to_orchestra_value(v));
            }
            out
        }
        _ => value_map([]),
    }
}

fn json_to_orchestra_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(json_to_orchestra_value).collect()),
        serde_json::Value::Object(map) => {
            Value::Map(map.into_iter().map(|(k, v)| (k, json_to_orchestra_value(v))).collect())
        }
    }
}


fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("orchestra_demo=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("orchestra_demo=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
