//! Declarative workflow/step shapes (§3, §6 "Workflow submission").

use std::collections::BTreeMap;
use std::time::Duration;

use orchestra_core::{Value, ValueMap};
use serde::{Deserialize, Serialize};

/// A step's explicit role, replacing the source's lowercase-substring
/// name-sniffing (§9 "Pattern-name heuristics") with a typed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    Synthesizer,
}

/// Substrings that mark a step as a synthesizer when `role` is unset, kept
/// only as a compatibility path for unmigrated workflow definitions.
const SYNTHESIZER_NAME_HINTS: &[&str] =
    &["synthesize", "combine", "final", "summary", "aggregate", "merge"];

/// A single declared step in a workflow (§3 "WorkflowStep").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: String,

    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub parameters: ValueMap,
    #[serde(default)]
    pub connector: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub statement: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub if_true: Option<String>,
    #[serde(default)]
    pub if_false: Option<String>,
    #[serde(default)]
    pub output_schema: Option<Value>,

    /// Explicit synthesizer role (§9 design note). Defaults to name-sniffing
    /// against `SYNTHESIZER_NAME_HINTS` when unset.
    #[serde(default)]
    pub role: Option<StepRole>,

    /// Per-step-author declaration that this step's failure fails the
    /// whole parallel group, generalizing the source's two hardcoded
    /// step names (§9 "Critical-step set"). Defaults to `false`.
    #[serde(default)]
    pub critical: bool,
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>, step_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step_type: step_type.into(),
            provider: None,
            model: None,
            prompt: None,
            function: None,
            parameters: ValueMap::new(),
            connector: None,
            operation: None,
            statement: None,
            max_tokens: None,
            condition: None,
            if_true: None,
            if_false: None,
            output_schema: None,
            role: None,
            critical: false,
        }
    }

    /// Whether this step synthesizes sibling outputs, via the explicit
    /// `role` attribute or (compatibility path) a name-sniff match.
    pub fn is_synthesizer(&self) -> bool {
        if let Some(role) = self.role {
            return role == StepRole::Synthesizer;
        }
        let lower = self.name.to_lowercase();
        SYNTHESIZER_NAME_HINTS.iter().any(|hint| lower.contains(hint))
    }
}

/// A declarative, submitted workflow (§6 "Workflow submission": `spec`
/// carries `timeout, retries, input, steps, output`). `parallel` toggles
/// the fan-out/fan-in execution mode of §4.5: when set, every step but the
/// last runs concurrently and the last step runs after the join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(with = "humantime_duration", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub input: ValueMap,
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub output: BTreeMap<String, String>,
    #[serde(default)]
    pub parallel: bool,
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Workflow {
    pub fn new(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            timeout: default_timeout(),
            retries: 0,
            input: ValueMap::new(),
            steps,
            output: BTreeMap::new(),
            parallel: false,
        }
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// `Workflow::timeout` serializes as a humantime-style string (`"30s"`,
/// `"5m"`) the way the rest of this tree's on-disk YAML config documents
/// do, rather than as a raw integer of ambiguous unit.
mod humantime_duration {
    use super::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    fn parse(raw: &str) -> std::result::Result<Duration, String> {
        let raw = raw.trim();
        let (digits, unit) = raw.split_at(raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len()));
        let value: u64 = digits.parse().map_err(|_| format!("invalid duration: {raw}"))?;
        let seconds = match unit {
            "" | "s" => value,
            "m" => value * 60,
            "h" => value * 3600,
            "ms" => return Ok(Duration::from_millis(value)),
            other => return Err(format!("unknown duration unit: {other}")),
        };
        Ok(Duration::from_secs(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_role_overrides_name_sniffing() {
        let mut step = WorkflowStep::new("step-one", "function");
        step.role = Some(StepRole::Synthesizer);
        assert!(step.is_synthesizer());
    }

    #[test]
    fn name_sniffing_is_a_compatibility_path() {
        let step = WorkflowStep::new("final-summary", "function");
        assert!(step.is_synthesizer());

        let step = WorkflowStep::new("flight-search", "function");
        assert!(!step.is_synthesizer());
    }

    #[test]
    fn workflow_round_trips_through_yaml() {
        let mut workflow = Workflow::new("trip-planner", vec![WorkflowStep::new("s1", "llm")]);
        workflow.output.insert("summary".into(), "{{steps.s1.output.text}}".into());
        let yaml = serde_yaml::to_string(&workflow).unwrap();
        let back: Workflow = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.name, "trip-planner");
        assert_eq!(back.steps.len(), 1);
        assert_eq!(back.timeout, Duration::from_secs(30));
    }

    #[test]
    fn duration_parses_minutes() {
        let yaml = "name: w\nsteps: []\ntimeout: 5m\n";
        let workflow: Workflow = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(workflow.timeout, Duration::from_secs(300));
    }
}
