use serde_json::{Map, Value, json};

/// Operators that take no right-hand value.
const UNARY_OPERATORS: &[&str] = &["exists", "notExists", "isEmpty", "isNotEmpty", "empty", "notEmpty", "true", "false"];

/// Values of `operator.type` that name a data type rather than an operation.
const DATA_TYPES: &[&str] = &["string", "number", "boolean", "dateTime", "array", "object", "any"];

/// Option version written into completed condition blocks.
pub const CONDITION_OPTIONS_VERSION: u64 = 2;

pub fn is_unary(operation: &str) -> bool {
    UNARY_OPERATORS.contains(&operation)
}

/// Bring one operator object into canonical shape. Returns whether it changed.
///
/// `{type: "isNotEmpty"}` becomes `{type: "boolean", operation: "isNotEmpty",
/// singleValue: true}`; binary operators lose any `singleValue` flag.
pub fn normalize_operator(operator: &mut Map<String, Value>) -> bool {
    let mut changed = false;

    let shorthand = match (operator.get("type").and_then(Value::as_str), operator.get("operation")) {
        (Some(t), None) if !DATA_TYPES.contains(&t) => Some(t.to_string()),
        _ => None,
    };
    if let Some(operation) = shorthand {
        let data_type = if is_unary(&operation) { "boolean" } else { "string" };
        operator.insert("type".into(), json!(data_type));
        operator.insert("operation".into(), json!(operation));
        changed = true;
    }

    let Some(operation) = operator.get("operation").and_then(Value::as_str) else {
        return changed;
    };
    if is_unary(operation) {
        if operator.get("singleValue") != Some(&Value::Bool(true)) {
            operator.insert("singleValue".into(), Value::Bool(true));
            changed = true;
        }
    } else if operator.remove("singleValue").is_some() {
        changed = true;
    }
    changed
}

/// Normalize every operator inside a condition block
/// (`{conditions: [{operator, ...}], combinator, options}`).
pub fn normalize_operators(block: &mut Value) -> bool {
    let Some(conditions) = block.get_mut("conditions").and_then(Value::as_array_mut) else {
        return false;
    };
    let mut changed = false;
    for condition in conditions.iter_mut() {
        if let Some(operator) = condition.get_mut("operator").and_then(Value::as_object_mut) {
            changed |= normalize_operator(operator);
        }
    }
    changed
}

/// Fill missing keys of the block's `options` object without touching
/// values that are already set.
pub fn complete_options(block: &mut Value) -> bool {
    let Some(block) = block.as_object_mut() else {
        return false;
    };
    let options = block.entry("options").or_insert_with(|| Value::Object(Map::new()));
    let Some(options) = options.as_object_mut() else {
        return false;
    };

    let defaults = [
        ("version", json!(CONDITION_OPTIONS_VERSION)),
        ("leftValue", json!("")),
        ("caseSensitive", json!(true)),
        ("typeValidation", json!("strict")),
    ];
    let mut changed = false;
    for (key, value) in defaults {
        if !options.contains_key(key) {
            options.insert(key.to_string(), value);
            changed = true;
        }
    }
    changed
}
