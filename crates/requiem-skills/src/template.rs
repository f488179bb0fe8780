// crates/requiem-skills/src/template.rs
// ============================================================================
// Module: Template Resolution
// Description: `{{path}}` placeholder substitution over JSON values.
// Purpose: Resolve a skill step's input/prompt template against the bag of
//          named outputs accumulated so far, without ever executing code.
// Dependencies: serde_json, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! Placeholders take the form `{{a.b.c}}`, where `a` names a key in the bag
//! and each following segment descends one object field. Resolution walks
//! any string, array, or map value recursively; non-string leaves pass
//! through untouched. A path that cannot be resolved is left in the output
//! exactly as written — unresolved placeholders are data, not errors.

use std::collections::BTreeMap;

use serde_json::Value;

/// Recursively resolves `{{path}}` placeholders in `value` against `bag`.
#[must_use]
pub fn resolve_templates(value: &Value, bag: &BTreeMap<String, Value>) -> Value {
    match value {
        Value::String(text) => Value::String(resolve_string(text, bag)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| resolve_templates(item, bag)).collect())
        }
        Value::Object(fields) => Value::Object(
            fields.iter().map(|(key, val)| (key.clone(), resolve_templates(val, bag))).collect(),
        ),
        other => other.clone(),
    }
}

/// Resolves placeholders within a single string, leaving unmatched ones
/// intact.
#[must_use]
pub fn resolve_string(input: &str, bag: &BTreeMap<String, Value>) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            output.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let path = after_open[..close].trim();
        match resolve_path(path, bag) {
            Some(resolved) => output.push_str(&stringify(&resolved)),
            None => {
                output.push_str("{{");
                output.push_str(path);
                output.push_str("}}");
            }
        }
        rest = &after_open[close + 2..];
    }
    output.push_str(rest);
    output
}

/// Descends `bag` one `.`-separated segment at a time.
fn resolve_path(path: &str, bag: &BTreeMap<String, Value>) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = bag.get(first)?.clone();
    for segment in segments {
        current = current.as_object()?.get(segment)?.clone();
    }
    Some(current)
}

/// Renders a resolved value for inline substitution: strings are inserted
/// verbatim, everything else is rendered as compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::resolve_path;
    use super::resolve_string;
    use super::resolve_templates;

    fn bag() -> std::collections::BTreeMap<String, serde_json::Value> {
        let mut bag = std::collections::BTreeMap::new();
        bag.insert("initial".to_string(), json!({"user": {"name": "Ada"}, "count": 3}));
        bag.insert("lookup".to_string(), json!({"hits": ["a", "b"]}));
        bag
    }

    #[test]
    fn resolves_nested_path_in_string() {
        let resolved = resolve_string("hello {{initial.user.name}}", &bag());
        assert_eq!(resolved, "hello Ada");
    }

    #[test]
    fn non_string_leaf_renders_as_compact_json() {
        let resolved = resolve_string("count={{initial.count}}", &bag());
        assert_eq!(resolved, "count=3");
        let nested = resolve_string("hits={{lookup.hits}}", &bag());
        assert_eq!(nested, "hits=[\"a\",\"b\"]");
    }

    #[test]
    fn unresolved_placeholder_is_left_intact() {
        let resolved = resolve_string("missing {{initial.user.age}}", &bag());
        assert_eq!(resolved, "missing {{initial.user.age}}");
    }

    #[test]
    fn unclosed_placeholder_is_left_intact() {
        let resolved = resolve_string("broken {{initial.user.name", &bag());
        assert_eq!(resolved, "broken {{initial.user.name");
    }

    #[test]
    fn resolve_templates_recurses_through_arrays_and_maps() {
        let template = json!({
            "greeting": "hi {{initial.user.name}}",
            "items": ["{{initial.count}}", "static"],
        });
        let resolved = resolve_templates(&template, &bag());
        assert_eq!(resolved, json!({"greeting": "hi Ada", "items": ["3", "static"]}));
    }

    #[test]
    fn resolve_path_rejects_unknown_root() {
        assert!(resolve_path("unknown.field", &bag()).is_none());
    }
}
