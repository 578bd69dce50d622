//! Loads workflow definitions from a directory of YAML documents (§6
//! "Workflow submission": `apiVersion, kind, metadata {name, version},
//! spec {...}`), registering each by `metadata.name`.

use std::collections::HashMap;
use std::path::Path;

use orchestra_workflow::Workflow;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowDocument {
    #[serde(default)]
    #[allow(dead_code)]
    api_version: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    kind: Option<String>,
    #[allow(dead_code)]
    metadata: WorkflowMetadata,
    spec: Workflow,
}

#[derive(Debug, Deserialize)]
struct WorkflowMetadata {
    name: String,
    #[serde(default)]
    #[allow(dead_code)]
    version: Option<String>,
}

/// Reads every `*.yaml`/`*.yml` file directly under `dir`, parsing each
/// as a `WorkflowDocument` and registering its `spec` under
/// `metadata.name`. A directory that doesn't exist yields an empty
/// registry rather than an error — workflows can also be registered
/// programmatically by an embedding deployment.
pub fn load_workflows(dir: &str) -> HashMap<String, Workflow> {
    let mut registered = HashMap::new();
    let path = Path::new(dir);
    if !path.is_dir() {
        info!(dir = %dir, "workflows directory not found, starting with an empty registry");
        return registered;
    }

    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir, error = %err, "failed to read workflows directory");
            return registered;
        }
    };

    for entry in entries.flatten() {
        let file_path = entry.path();
        let is_yaml = file_path
            .extension()
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);
        if !is_yaml {
            continue;
        }

        match std::fs::read_to_string(&file_path) {
            Ok(content) => match serde_yaml::from_str::<WorkflowDocument>(&content) {
                Ok(doc) => {
                    info!(name = %doc.metadata.name, file = ?file_path, "registered workflow");
                    registered.insert(doc.metadata.name.clone(), doc.spec);
                }
                Err(err) => {
                    warn!(file = ?file_path, error = %err, "failed to parse workflow document");
                }
            },
            Err(err) => {
                warn!(file = ?file_path, error = %err, "failed to read workflow file");
            }
        }
    }

    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_directory_yields_empty_registry() {
        let registry = load_workflows("/nonexistent/path/for/orchestra-gateway-tests");
        assert!(registry.is_empty());
    }

    #[test]
    fn parses_a_minimal_workflow_document() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("trip.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        writeln!(
            file,
            "apiVersion: orchestra/v1\nkind: Workflow\nmetadata:\n  name: trip-planner\n  version: v1\nspec:\n  name: trip-planner\n  steps: []\n"
        )
        .unwrap();

        let registry = load_workflows(dir.path().to_str().unwrap());
        assert!(registry.contains_key("trip-planner"));
    }
}
