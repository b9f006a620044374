//! Variable resolution against the run context.
//!
//! Resolution is a pure function of (context, template): mappings and
//! sequences resolve recursively, strings are tokenized and substituted
//! segment by segment. A placeholder whose path cannot be walked is left
//! verbatim in the output and surfaced as a [`ResolutionWarning`] rather
//! than failing the step, so partially-specified steps remain inspectable.

use serde_json::Value;

use crate::template::tokens::{parse_segments, whole_placeholder, Segment};

/// A template placeholder that could not be resolved.
///
/// Non-fatal: the placeholder text stays in the output and the warning is
/// recorded for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionWarning {
    /// The dotted path that failed to resolve.
    pub path: String,
    /// The template string the placeholder appeared in.
    pub template: String,
}

impl std::fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unresolved path '{}' in template '{}'", self.path, self.template)
    }
}

/// Result of resolving a template: the substituted value plus any
/// warnings gathered along the way.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub value: Value,
    pub warnings: Vec<ResolutionWarning>,
}

/// Template resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver;

impl Resolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a template value against a context value.
    pub fn resolve(&self, context: &Value, template: &Value) -> Resolved {
        let mut warnings = Vec::new();
        let value = self.resolve_value(context, template, &mut warnings);
        Resolved { value, warnings }
    }

    fn resolve_value(
        &self,
        context: &Value,
        template: &Value,
        warnings: &mut Vec<ResolutionWarning>,
    ) -> Value {
        match template {
            Value::String(s) => self.resolve_string(context, s, warnings),
            Value::Object(map) => {
                let mut result = serde_json::Map::new();
                for (key, value) in map {
                    let resolved_key = match self.resolve_string(context, key, warnings) {
                        Value::String(k) => k,
                        other => value_to_string(&other),
                    };
                    result.insert(resolved_key, self.resolve_value(context, value, warnings));
                }
                Value::Object(result)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_value(context, item, warnings))
                    .collect(),
            ),
            _ => template.clone(),
        }
    }

    /// Resolve a single template string.
    ///
    /// A template that is exactly one placeholder returns the looked-up
    /// value unconverted; mixed content substitutes textual forms.
    fn resolve_string(
        &self,
        context: &Value,
        template: &str,
        warnings: &mut Vec<ResolutionWarning>,
    ) -> Value {
        let segments = parse_segments(template);

        if let Some(path) = whole_placeholder(&segments) {
            return match lookup_path(context, path) {
                Some(value) => value.clone(),
                None => {
                    warnings.push(ResolutionWarning {
                        path: path.join("."),
                        template: template.to_string(),
                    });
                    Value::String(template.to_string())
                }
            };
        }

        let mut output = String::new();
        for segment in &segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder { path, raw } => match lookup_path(context, path) {
                    Some(value) => output.push_str(&value_to_string(value)),
                    None => {
                        warnings.push(ResolutionWarning {
                            path: path.join("."),
                            template: template.to_string(),
                        });
                        output.push_str(raw);
                    }
                },
            }
        }
        Value::String(output)
    }

    /// Evaluate a boolean condition expression against a context.
    ///
    /// A bare expression is treated as a single path placeholder; an
    /// unresolvable condition evaluates false and carries its warnings.
    pub fn evaluate_condition(
        &self,
        context: &Value,
        expression: &str,
    ) -> (bool, Vec<ResolutionWarning>) {
        let template = if expression.contains("{{") {
            expression.to_string()
        } else {
            format!("{{{{ {} }}}}", expression.trim())
        };

        let resolved = self.resolve(context, &Value::String(template));
        (is_truthy(&resolved.value), resolved.warnings)
    }
}

/// Walk a dotted path through a context value.
///
/// Object segments are looked up by key; sequence segments accept numeric
/// indexes.
pub fn lookup_path<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Textual form used when substituting into mixed-content strings.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Truthiness for condition results.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_context() -> Value {
        json!({
            "trigger_data": {"topic": "laptops", "items": [1, 2, 3]},
            "steps": {
                "fetch": {"output": "market research", "status": "completed"}
            },
            "config": {"threshold": 5},
            "loop": {"item": {"name": "alpha"}, "index": 0, "total": 3},
            "date": "2026-08-07"
        })
    }

    #[test]
    fn test_no_placeholders_unchanged() {
        let resolver = Resolver::new();
        let ctx = make_context();

        let resolved = resolver.resolve(&ctx, &json!("plain text"));
        assert_eq!(resolved.value, json!("plain text"));
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn test_resolution_is_pure() {
        let resolver = Resolver::new();
        let ctx = make_context();
        let template = json!("Topic: {{ trigger_data.topic }}");

        let first = resolver.resolve(&ctx, &template);
        let second = resolver.resolve(&ctx, &template);
        assert_eq!(first.value, second.value);
        assert_eq!(first.value, json!("Topic: laptops"));
    }

    #[test]
    fn test_whole_placeholder_preserves_type() {
        // A template that is exactly one placeholder returns the looked-up
        // value unconverted, not its string form.
        let resolver = Resolver::new();
        let ctx = make_context();

        let resolved = resolver.resolve(&ctx, &json!("{{ trigger_data.items }}"));
        assert_eq!(resolved.value, json!([1, 2, 3]));

        let resolved = resolver.resolve(&ctx, &json!("{{ config.threshold }}"));
        assert_eq!(resolved.value, json!(5));
    }

    #[test]
    fn test_mixed_content_stringifies() {
        let resolver = Resolver::new();
        let ctx = make_context();

        let resolved = resolver.resolve(
            &ctx,
            &json!("threshold={{ config.threshold }} items={{ trigger_data.items }}"),
        );
        assert_eq!(resolved.value, json!("threshold=5 items=[1,2,3]"));
    }

    #[test]
    fn test_unresolved_placeholder_left_verbatim() {
        let resolver = Resolver::new();
        let ctx = make_context();

        let resolved = resolver.resolve(&ctx, &json!("out: {{ steps.missing.output }}"));
        assert_eq!(resolved.value, json!("out: {{ steps.missing.output }}"));
        assert_eq!(resolved.warnings.len(), 1);
        assert_eq!(resolved.warnings[0].path, "steps.missing.output");
    }

    #[test]
    fn test_unresolved_whole_placeholder_left_verbatim() {
        let resolver = Resolver::new();
        let ctx = make_context();

        let resolved = resolver.resolve(&ctx, &json!("{{ steps.missing.output }}"));
        assert_eq!(resolved.value, json!("{{ steps.missing.output }}"));
        assert_eq!(resolved.warnings.len(), 1);
    }

    #[test]
    fn test_structure_preserved() {
        let resolver = Resolver::new();
        let ctx = make_context();

        let template = json!({
            "query": "{{ trigger_data.topic }}",
            "sources": ["{{ steps.fetch.output }}", "static"],
            "limit": 10
        });
        let resolved = resolver.resolve(&ctx, &template);
        assert_eq!(
            resolved.value,
            json!({
                "query": "laptops",
                "sources": ["market research", "static"],
                "limit": 10
            })
        );
    }

    #[test]
    fn test_loop_scope_lookup() {
        let resolver = Resolver::new();
        let ctx = make_context();

        let resolved = resolver.resolve(&ctx, &json!("{{ loop.item.name }} ({{ loop.index }})"));
        assert_eq!(resolved.value, json!("alpha (0)"));
    }

    #[test]
    fn test_numeric_index_lookup() {
        let resolver = Resolver::new();
        let ctx = make_context();

        let resolved = resolver.resolve(&ctx, &json!("{{ trigger_data.items.1 }}"));
        assert_eq!(resolved.value, json!(2));
    }

    #[test]
    fn test_evaluate_condition_paths() {
        let resolver = Resolver::new();
        let ctx = json!({
            "result": {"approved": true, "count": 0, "status": "yes"}
        });

        assert!(resolver.evaluate_condition(&ctx, "result.approved").0);
        assert!(resolver.evaluate_condition(&ctx, "{{ result.status }}").0);
        assert!(!resolver.evaluate_condition(&ctx, "result.count").0);
    }

    #[test]
    fn test_evaluate_condition_unresolved_is_false() {
        let resolver = Resolver::new();
        let ctx = json!({});

        let (pass, warnings) = resolver.evaluate_condition(&ctx, "result.approved");
        assert!(!pass);
        assert_eq!(warnings.len(), 1);
    }
}
