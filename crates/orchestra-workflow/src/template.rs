//! `{{...}}` token substitution over step prompts/parameters (C1).
//!
//! Three token shapes are recognized, matched by dotted prefix:
//!   `{{input.x}}`          — the originating request's field `x`
//!   `{{workflow.input.x}}` — the workflow invocation's own input field `x`
//!   `{{steps.NAME.output.k}}` — a prior step's output field `k`
//!
//! A token that fails to resolve is left untouched in the output so a
//! malformed template is visible in the result rather than silently
//! eaten. A token that resolves to a non-string `Value` is *also* left
//! untouched when substituting into step prompts/parameters (§4.7: "Only
//! string values are substituted"); `resolve_output` is the one path
//! that stringifies non-string values, since a workflow's final output
//! template (§4.5) is explicitly allowed to render a step's content
//! leaf as text.

use std::collections::BTreeMap;

use orchestra_core::{Value, ValueMap};
use regex::Regex;

use crate::execution::WorkflowExecution;

const TOKEN_PATTERN: &str = r"\{\{\s*([a-zA-Z0-9_.]+)\s*\}\}";

pub struct TemplateResolver {
    token: Regex,
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self {
            token: Regex::new(TOKEN_PATTERN).expect("TOKEN_PATTERN is a static valid regex"),
        }
    }

    /// Resolve every `{{...}}` token in `template` against the originating
    /// request fields, the workflow's own input, and steps completed so
    /// far in `execution`. Only tokens resolving to a `Value::String`
    /// are substituted (§4.7); a token resolving to a non-string value
    /// is left intact, exactly like an unresolvable one.
    pub fn resolve(
        &self,
        template: &str,
        request_context: &ValueMap,
        execution: &WorkflowExecution,
    ) -> String {
        let mut current = template.to_string();
        loop {
            let next = self.pass(&current, request_context, execution, |v| {
                v.as_template_str().map(|s| s.to_string())
            });
            if next == current {
                return next;
            }
            current = next;
        }
    }

    /// Resolve every `{{...}}` token in a workflow's final output
    /// template (§4.5), stringifying non-string values via
    /// `Value::as_display_string` (e.g. a structured step output's
    /// `content` leaf). This is the one substitution path that does so;
    /// step prompts/parameters go through `resolve`/`resolve_parameters`
    /// instead, which leave non-string tokens intact per §4.7.
    pub fn resolve_output(
        &self,
        template: &str,
        request_context: &ValueMap,
        execution: &WorkflowExecution,
    ) -> String {
        let mut current = template.to_string();
        loop {
            let next = self.pass(&current, request_context, execution, |v| Some(v.as_display_string()));
            if next == current {
                return next;
            }
            current = next;
        }
    }

    /// A single non-recursive substitution pass; `resolve`/`resolve_output`
    /// repeat this until a pass makes no change, so a token resolving to
    /// a string that itself contains tokens (chained step outputs) still
    /// resolves. `stringify` decides how a resolved non-string `Value` is
    /// rendered (or whether it is at all) — `resolve` rejects it, leaving
    /// the token intact, while `resolve_output` stringifies it.
    fn pass(
        &self,
        template: &str,
        request_context: &ValueMap,
        execution: &WorkflowExecution,
        stringify: impl Fn(&Value) -> Option<String>,
    ) -> String {
        let mut out = String::with_capacity(template.len());
        let mut last_end = 0;
        for capture in self.token.captures_iter(template) {
            let whole = capture.get(0).expect("group 0 always matches");
            let path = &capture[1];
            out.push_str(&template[last_end..whole.start()]);
            match self.lookup(path, request_context, execution).and_then(|v| stringify(&v)) {
                Some(rendered) => out.push_str(&rendered),
                None => out.push_str(whole.as_str()),
            }
            last_end = whole.end();
        }
        out.push_str(&template[last_end..]);
        out
    }

    /// Resolve tokens inside every string leaf of a parameter map,
    /// recursing through nested maps/lists, leaving non-string leaves
    /// untouched.
    pub fn resolve_parameters(
        &self,
        parameters: &ValueMap,
        request_context: &ValueMap,
        execution: &WorkflowExecution,
    ) -> ValueMap {
        parameters
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve_value(v, request_context, execution)))
            .collect()
    }

    fn resolve_value(
        &self,
        value: &Value,
        request_context: &ValueMap,
        execution: &WorkflowExecution,
    ) -> Value {
        match value {
            Value::String(s) => Value::String(self.resolve(s, request_context, execution)),
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| self.resolve_value(v, request_context, execution))
                    .collect(),
            ),
            Value::Map(map) => {
                let mut resolved = BTreeMap::new();
                for (k, v) in map {
                    resolved.insert(k.clone(), self.resolve_value(v, request_context, execution));
                }
                Value::Map(resolved)
            }
            other => other.clone(),
        }
    }

    fn lookup(&self, path: &str, request_context: &ValueMap, execution: &WorkflowExecution) -> Option<Value> {
        let mut parts = path.split('.');
        match parts.next()? {
            "input" => {
                let rest = parts.collect::<Vec<_>>().join(".");
                dotted_lookup(request_context, &rest)
            }
            "workflow" => {
                if parts.next()? != "input" {
                    return None;
                }
                let rest = parts.collect::<Vec<_>>().join(".");
                dotted_lookup(&execution.input, &rest)
            }
            "steps" => {
                let step_name = parts.next()?;
                if parts.next()? != "output" {
                    return None;
                }
                let rest = parts.collect::<Vec<_>>().join(".");
                let step = execution.step(step_name)?;
                let output = step.output.as_ref()?;
                dotted_lookup(output, &rest)
            }
            _ => None,
        }
    }
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn dotted_lookup(map: &ValueMap, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(Value::Map(map.clone()));
    }
    let mut current = map.get(path.split('.').next().unwrap())?.clone();
    for segment in path.split('.').skip(1) {
        current = match current {
            Value::Map(ref m) => m.get(segment)?.clone(),
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_core::{value_map, UserContext};
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

    #[test]
    fn resolves_input_token() {
        let resolver = TemplateResolver::new();
        let request_context = value_map([("city", Value::String("Austin".into()))]);
        let execution = WorkflowExecution::new("w", value_map([]), user());
        let resolved = resolver.resolve("visit {{input.city}}", &request_context, &execution);
        assert_eq!(resolved, "visit Austin");
    }

    #[test]
    fn resolves_step_output_token() {
        let resolver = TemplateResolver::new();
        let mut execution = WorkflowExecution::new("w", value_map([]), user());
        let mut step = crate::execution::StepExecution::pending("search", value_map([]));
        step.complete(
            value_map([("text", Value::String("5 flights found".into()))]),
            std::time::Instant::now(),
        );
        execution.steps.push(step);

        let resolved = resolver.resolve(
            "{{steps.search.output.text}}",
            &value_map([]),
            &execution,
        );
        assert_eq!(resolved, "5 flights found");
    }

    #[test]
    fn unresolvable_token_is_left_untouched() {
        let resolver = TemplateResolver::new();
        let execution = WorkflowExecution::new("w", value_map([]), user());
        let resolved = resolver.resolve("{{steps.missing.output.x}}", &value_map([]), &execution);
        assert_eq!(resolved, "{{steps.missing.output.x}}");
    }

    #[test]
    fn resolves_workflow_input_token() {
        let resolver = TemplateResolver::new();
        let execution = WorkflowExecution::new(
            "w",
            value_map([("destination", Value::String("TYO".into()))]),
            user(),
        );
        let resolved = resolver.resolve("to {{workflow.input.destination}}", &value_map([]), &execution);
        assert_eq!(resolved, "to TYO");
    }

    #[test]
    fn non_string_workflow_input_token_is_left_intact_in_prompt_resolution() {
        let resolver = TemplateResolver::new();
        let execution = WorkflowExecution::new(
            "w",
            value_map([("budget", Value::Int(500))]),
            user(),
        );
        let resolved = resolver.resolve("${{workflow.input.budget}}", &value_map([]), &execution);
        assert_eq!(resolved, "${{workflow.input.budget}}");
    }

    #[test]
    fn resolve_output_stringifies_non_string_values() {
        let resolver = TemplateResolver::new();
        let execution = WorkflowExecution::new(
            "w",
            value_map([("budget", Value::Int(500))]),
            user(),
        );
        let resolved = resolver.resolve_output("${{workflow.input.budget}}", &value_map([]), &execution);
        assert_eq!(resolved, "$500");
    }

    #[test]
    fn resolves_nested_parameters() {
        let resolver = TemplateResolver::new();
        let execution = WorkflowExecution::new("w", value_map([]), user());
        let request_context = value_map([("name", Value::String("Ada".into()))]);
        let params = value_map([("greeting", Value::String("hi {{input.name}}".into()))]);
        let resolved = resolver.resolve_parameters(&params, &request_context, &execution);
        assert_eq!(
            resolved.get("greeting").unwrap().as_template_str(),
            Some("hi Ada")
        );
    }
}
