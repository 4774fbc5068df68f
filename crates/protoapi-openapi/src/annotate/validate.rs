//! `buf.validate` rules expressed as JSON Schema keywords.
//!
//! Only rules with a direct schema counterpart are translated. CEL
//! expressions, `any` rules and map key rules have none; they are logged and
//! skipped.

use super::{AnnotateContext, Annotator};
use crate::model::Schema;
use crate::schema::{add_combinator, oneof_combinator, require_one_of};
use protoapi_descriptor::{extension, FieldRef, FieldType, MessageRef};
use serde_json::{Map, Number, Value};

const FIELD_RULES: &str = "buf.validate.field";
const MESSAGE_RULES: &str = "buf.validate.message";
const ONEOF_RULES: &str = "buf.validate.oneof";

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateAnnotator;

impl Annotator for ValidateAnnotator {
    fn message(&self, cx: &AnnotateContext<'_>, message: &MessageRef<'_>, schema: &mut Schema) {
        if let Some(rules) = extension(message.options(), MESSAGE_RULES) {
            warn_cel(rules, message.full_name());

            for group in rules.get("oneof").and_then(Value::as_array).into_iter().flatten() {
                let names: Vec<String> = group
                    .get("fields")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .filter_map(|name| message.field_by_name(name))
                    .map(|f| cx.options.property_name(&f))
                    .collect();
                if names.is_empty() {
                    continue;
                }
                add_combinator(schema, oneof_combinator(&names));
                if flag(group, "required") {
                    require_one_of(schema, &names);
                }
            }
        }

        for oneof in message.oneofs() {
            let required = extension(oneof.options(), ONEOF_RULES)
                .is_some_and(|rules| flag(rules, "required"));
            if !required || oneof.is_synthetic() {
                continue;
            }
            let names: Vec<String> = oneof
                .fields()
                .iter()
                .map(|f| cx.options.property_name(f))
                .collect();
            if !require_one_of(schema, &names) {
                tracing::debug!(
                    message = %message.full_name(),
                    oneof = oneof.name(),
                    "required oneof has no combinator"
                );
            }
        }
    }

    fn field(
        &self,
        cx: &AnnotateContext<'_>,
        field: &FieldRef<'_>,
        schema: &mut Schema,
        parent: &mut Schema,
    ) {
        let Some(rules) = extension(field.options(), FIELD_RULES) else {
            return;
        };
        let field_name = field.full_name();
        warn_cel(rules, &field_name);

        if flag(rules, "required") {
            parent.require(&cx.options.property_name(field));
        }

        let map_entry = field.map_entry().ok().flatten();
        if let Some(entry) = map_entry {
            let Some(map) = rules.get("map") else { return };
            set_count(&mut schema.min_properties, map.get("minPairs"));
            set_count(&mut schema.max_properties, map.get("maxPairs"));
            if map.get("keys").is_some() {
                tracing::warn!(field = %field_name, "map key rules have no schema equivalent; ignored");
            }
            let value_field = entry.field_by_number(2);
            if let (Some(values), Some(value_field)) = (map.get("values"), value_field) {
                if let Some(crate::model::AdditionalProperties::Schema(value_schema)) =
                    schema.additional_properties.as_mut()
                {
                    apply_element(&value_field, values, value_schema);
                }
            }
        } else if field.is_repeated() {
            let Some(repeated) = rules.get("repeated") else {
                return;
            };
            set_count(&mut schema.min_items, repeated.get("minItems"));
            set_count(&mut schema.max_items, repeated.get("maxItems"));
            if flag(repeated, "unique") {
                schema.unique_items = Some(true);
            }
            if let (Some(items), Some(item_schema)) = (repeated.get("items"), schema.items.as_mut()) {
                apply_element(field, items, item_schema);
            }
        } else {
            apply_element(field, rules, schema);
        }
    }
}

/// Apply the kind-specific half of a `FieldRules` object to one value schema.
fn apply_element(field: &FieldRef<'_>, rules: &Value, schema: &mut Schema) {
    let kind = field.kind();
    if rules.get("any").is_some() {
        tracing::warn!(field = %field.full_name(), "`any` rules are not translated; ignored");
    }
    let Some(Value::Object(r)) = rules.get(kind.rules_key()) else {
        return;
    };
    match kind {
        FieldType::String => string_rules(field, r, schema),
        FieldType::Bytes => bytes_rules(field, r, schema),
        FieldType::Enum => enum_rules(field, r, schema),
        FieldType::Bool => {
            if let Some(v) = r.get("const") {
                schema.const_value = Some(v.clone());
            }
        }
        FieldType::Message | FieldType::Group => {}
        _ => numeric_rules(field, r, schema),
    }
}

fn string_rules(field: &FieldRef<'_>, r: &Map<String, Value>, schema: &mut Schema) {
    for (key, value) in r {
        match key.as_str() {
            "const" => schema.const_value = Some(value.clone()),
            "len" => {
                set_count(&mut schema.min_length, Some(value));
                set_count(&mut schema.max_length, Some(value));
            }
            "minLen" => set_count(&mut schema.min_length, Some(value)),
            "maxLen" => set_count(&mut schema.max_length, Some(value)),
            "pattern" => {
                if let Some(p) = value.as_str() {
                    add_pattern(schema, p.to_string());
                }
            }
            "prefix" => {
                if let Some(p) = value.as_str() {
                    add_pattern(schema, format!("^{}", regex::escape(p)));
                }
            }
            "suffix" => {
                if let Some(p) = value.as_str() {
                    add_pattern(schema, format!("{}$", regex::escape(p)));
                }
            }
            "contains" => {
                if let Some(p) = value.as_str() {
                    add_pattern(schema, regex::escape(p));
                }
            }
            "in" => schema.enum_values = list(value),
            "notIn" => exclude(schema, list(value)),
            "email" | "hostname" | "uri" | "uuid" | "ipv4" | "ipv6" if value == &Value::Bool(true) => {
                schema.format = Some(key.clone());
            }
            "uriRef" if value == &Value::Bool(true) => {
                schema.format = Some("uri-reference".to_string());
            }
            "ip" if value == &Value::Bool(true) => {
                schema.any_of = vec![
                    Schema {
                        format: Some("ipv4".to_string()),
                        ..Default::default()
                    },
                    Schema {
                        format: Some("ipv6".to_string()),
                        ..Default::default()
                    },
                ];
            }
            other => unsupported(field, other),
        }
    }
}

fn bytes_rules(field: &FieldRef<'_>, r: &Map<String, Value>, schema: &mut Schema) {
    for (key, value) in r {
        match key.as_str() {
            "len" => {
                schema.min_length = count(value).map(base64_len);
                schema.max_length = count(value).map(base64_len);
            }
            "minLen" => schema.min_length = count(value).map(base64_len),
            "maxLen" => schema.max_length = count(value).map(base64_len),
            other => unsupported(field, other),
        }
    }
}

fn enum_rules(field: &FieldRef<'_>, r: &Map<String, Value>, schema: &mut Schema) {
    let Ok(enumeration) = field.resolve_enum() else {
        return;
    };
    let names = |value: &Value| -> Vec<Value> {
        value
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_i64)
            .filter_map(|n| i32::try_from(n).ok())
            .filter_map(|n| enumeration.value_name(n))
            .map(|name| Value::String(name.to_string()))
            .collect()
    };
    for (key, value) in r {
        match key.as_str() {
            "const" => {
                let name = value
                    .as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .and_then(|n| enumeration.value_name(n));
                if let Some(name) = name {
                    schema.const_value = Some(Value::String(name.to_string()));
                }
            }
            "in" => schema.enum_values = names(value),
            "notIn" => exclude(schema, names(value)),
            // The referenced enum schema already lists only defined values.
            "definedOnly" => {}
            other => unsupported(field, other),
        }
    }
}

fn numeric_rules(field: &FieldRef<'_>, r: &Map<String, Value>, schema: &mut Schema) {
    for (key, value) in r {
        match key.as_str() {
            "const" => schema.const_value = number(value).map(Value::Number),
            "gt" => schema.exclusive_minimum = number(value),
            "gte" => schema.minimum = number(value),
            "lt" => schema.exclusive_maximum = number(value),
            "lte" => schema.maximum = number(value),
            "in" => schema.enum_values = numbers(value),
            "notIn" => exclude(schema, numbers(value)),
            "finite" => {}
            other => unsupported(field, other),
        }
    }
}

fn unsupported(field: &FieldRef<'_>, rule: &str) {
    tracing::warn!(field = %field.full_name(), rule, "validation rule has no schema equivalent; ignored");
}

fn warn_cel(rules: &Value, owner: &str) {
    let has_cel = rules
        .get("cel")
        .and_then(Value::as_array)
        .is_some_and(|c| !c.is_empty());
    if has_cel {
        tracing::warn!(owner, "CEL validation rules are not translated; ignored");
    }
}

fn add_pattern(schema: &mut Schema, pattern: String) {
    if schema.pattern.is_none() {
        schema.pattern = Some(pattern);
    } else {
        schema.all_of.push(Schema {
            pattern: Some(pattern),
            ..Default::default()
        });
    }
}

fn exclude(schema: &mut Schema, values: Vec<Value>) {
    if values.is_empty() {
        return;
    }
    schema.not = Some(Box::new(Schema {
        enum_values: values,
        ..Default::default()
    }));
}

fn flag(rules: &Value, key: &str) -> bool {
    rules.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn list(value: &Value) -> Vec<Value> {
    value.as_array().cloned().unwrap_or_default()
}

fn numbers(value: &Value) -> Vec<Value> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(number)
        .map(Value::Number)
        .collect()
}

/// protojson renders 64-bit integers as strings; accept both.
fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .map(Number::from)
            .or_else(|| s.parse::<u64>().ok().map(Number::from))
            .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64)),
        _ => None,
    }
}

fn count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn set_count(slot: &mut Option<u64>, value: Option<&Value>) {
    if let Some(n) = value.and_then(count) {
        *slot = Some(n);
    }
}

/// Length of the base64 text encoding `n` raw bytes, saturating at
/// `u64::MAX`.
fn base64_len(n: u64) -> u64 {
    n.div_ceil(3).checked_mul(4).unwrap_or(u64::MAX)
}
