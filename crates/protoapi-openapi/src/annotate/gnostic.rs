//! gnostic `openapi.v3` annotations.
//!
//! gnostic models OpenAPI objects as protobuf messages, so its protojson shape
//! differs from OpenAPI in a few places: named maps are lists of
//! `{name, value}` pairs, free-form values are `{yaml: "..."}` strings, and
//! schema-or-reference unions wrap the schema in a `schema` key.

use super::{any_value, AnnotateContext, Annotator};
use crate::document::{merge_parameters, merge_servers, merge_tags};
use crate::model::{
    Document, Extensions, Operation, Parameter, ParameterLocation, Schema, SchemaType,
    SecurityRequirement, Server, Tag,
};
use protoapi_descriptor::{extension, FieldRef, FileRef, MessageRef, MethodRef};
use serde_json::Value;

const DOCUMENT: &str = "openapi.v3.document";
const OPERATION: &str = "openapi.v3.operation";
const SCHEMA: &str = "openapi.v3.schema";
const PROPERTY: &str = "openapi.v3.property";

#[derive(Debug, Clone, Copy, Default)]
pub struct GnosticAnnotator;

impl Annotator for GnosticAnnotator {
    fn message(&self, _cx: &AnnotateContext<'_>, message: &MessageRef<'_>, schema: &mut Schema) {
        if let Some(raw) = extension(message.options(), SCHEMA) {
            overlay_schema(schema, raw);
        }
    }

    fn field(
        &self,
        _cx: &AnnotateContext<'_>,
        field: &FieldRef<'_>,
        schema: &mut Schema,
        _parent: &mut Schema,
    ) {
        if let Some(raw) = extension(field.options(), PROPERTY) {
            overlay_schema(schema, raw);
        }
    }

    fn operation(&self, _cx: &AnnotateContext<'_>, method: &MethodRef<'_>, operation: &mut Operation) {
        let Some(raw) = extension(method.options(), OPERATION) else {
            return;
        };
        if let Some(summary) = text(raw, "summary") {
            operation.summary = Some(summary);
        }
        if let Some(description) = text(raw, "description") {
            operation.description = Some(description);
        }
        if let Some(id) = text(raw, "operationId") {
            operation.operation_id = Some(id);
        }
        if raw.get("deprecated").and_then(Value::as_bool) == Some(true) {
            operation.deprecated = Some(true);
        }
        for tag in strings(raw.get("tags")) {
            if !operation.tags.contains(&tag) {
                operation.tags.push(tag);
            }
        }
        let parameters = list(raw.get("parameters"))
            .filter_map(|p| p.get("parameter"))
            .filter_map(parameter)
            .collect();
        merge_parameters(&mut operation.parameters, parameters);
        merge_servers(&mut operation.servers, servers(raw.get("servers")));
        if let Some(security) = raw.get("security") {
            operation.security = Some(security_requirements(security));
        }
        operation.extensions.extend(specification_extensions(raw));
    }

    fn document(&self, _cx: &AnnotateContext<'_>, file: &FileRef<'_>, document: &mut Document) {
        let Some(raw) = extension(file.options(), DOCUMENT) else {
            return;
        };

        if let Some(info) = raw.get("info") {
            if let Some(title) = text(info, "title") {
                document.info.title = title;
            }
            if let Some(version) = text(info, "version") {
                document.info.version = version;
            }
            if let Some(description) = text(info, "description") {
                document.info.description = Some(description);
            }
            for key in ["termsOfService", "contact", "license", "summary"] {
                if let Some(value) = info.get(key) {
                    document.info.extensions.insert(key.to_string(), value.clone());
                }
            }
            document.info.extensions.extend(specification_extensions(info));
        }

        merge_servers(&mut document.servers, servers(raw.get("servers")));

        let tags = list(raw.get("tags"))
            .filter_map(|t| {
                Some(Tag {
                    name: text(t, "name")?,
                    description: text(t, "description"),
                    extensions: specification_extensions(t),
                })
            })
            .collect();
        merge_tags(&mut document.tags, tags);

        if let Some(security) = raw.get("security") {
            for requirement in security_requirements(security) {
                if !document.security.contains(&requirement) {
                    document.security.push(requirement);
                }
            }
        }

        let schemes = raw
            .get("components")
            .and_then(|c| c.get("securitySchemes"))
            .map(|s| named(Some(s)))
            .unwrap_or_default();
        for (name, value) in schemes {
            if let Some(scheme) = value.get("securityScheme") {
                document
                    .components
                    .security_schemes
                    .insert(name, scheme.clone());
            }
        }

        document.extensions.extend(specification_extensions(raw));
    }
}

/// Apply the keywords a gnostic `Schema` sets; gnostic has the last word.
fn overlay_schema(schema: &mut Schema, raw: &Value) {
    if let Some(title) = text(raw, "title") {
        schema.title = Some(title);
    }
    if let Some(description) = text(raw, "description") {
        schema.description = Some(description);
    }
    if let Some(format) = text(raw, "format") {
        schema.format = Some(format);
    }
    if let Some(pattern) = text(raw, "pattern") {
        schema.pattern = Some(pattern);
    }
    if let Some(example) = raw.get("example").and_then(any_value) {
        schema.examples.push(example);
    }
    for (key, slot) in [
        ("readOnly", &mut schema.read_only),
        ("writeOnly", &mut schema.write_only),
        ("deprecated", &mut schema.deprecated),
    ] {
        if let Some(flag) = raw.get(key).and_then(Value::as_bool) {
            *slot = Some(flag);
        }
    }
    schema.extensions.extend(specification_extensions(raw));
}

/// A gnostic `Parameter` (the `parameter` arm of `ParameterOrReference`).
fn parameter(raw: &Value) -> Option<Parameter> {
    let name = text(raw, "name")?;
    let location = match raw.get("in").and_then(Value::as_str)? {
        "path" => ParameterLocation::Path,
        "query" => ParameterLocation::Query,
        "header" => ParameterLocation::Header,
        "cookie" => ParameterLocation::Cookie,
        other => {
            tracing::warn!(parameter = %name, location = other, "unknown parameter location; ignored");
            return None;
        }
    };
    let schema = raw.get("schema").and_then(|s| s.get("schema")).map(|s| {
        let mut schema = Schema {
            schema_type: text(s, "type").map(SchemaType::Single),
            ..Default::default()
        };
        overlay_schema(&mut schema, s);
        schema
    });
    Some(Parameter {
        name,
        location: Some(location),
        description: text(raw, "description"),
        required: raw.get("required").and_then(Value::as_bool),
        deprecated: raw.get("deprecated").and_then(Value::as_bool),
        style: text(raw, "style"),
        explode: raw.get("explode").and_then(Value::as_bool),
        schema,
        extensions: specification_extensions(raw),
        ..Default::default()
    })
}

fn servers(raw: Option<&Value>) -> Vec<Server> {
    list(raw)
        .filter_map(|s| {
            Some(Server {
                url: text(s, "url")?,
                description: text(s, "description"),
                extensions: specification_extensions(s),
            })
        })
        .collect()
}

/// `[{additionalProperties: [{name, value: {value: [scopes]}}]}]`
fn security_requirements(raw: &Value) -> Vec<SecurityRequirement> {
    list(Some(raw))
        .map(|req| {
            named(req.get("additionalProperties"))
                .into_iter()
                .map(|(name, value)| (name, strings(value.get("value"))))
                .collect()
        })
        .collect()
}

/// `specificationExtension: [{name, value: {yaml}}]`
fn specification_extensions(raw: &Value) -> Extensions {
    named(raw.get("specificationExtension"))
        .into_iter()
        .filter_map(|(name, value)| Some((name, any_value(&value)?)))
        .collect()
}

/// gnostic's `Named*` lists, either bare or under `additionalProperties`.
fn named(raw: Option<&Value>) -> Vec<(String, Value)> {
    let entries = match raw {
        Some(Value::Object(map)) => map.get("additionalProperties"),
        other => other,
    };
    list(entries)
        .filter_map(|entry| {
            let name = text(entry, "name")?;
            Some((name, entry.get("value").cloned().unwrap_or(Value::Null)))
        })
        .collect()
}

fn list(raw: Option<&Value>) -> impl Iterator<Item = &Value> {
    raw.and_then(Value::as_array).into_iter().flatten()
}

fn strings(raw: Option<&Value>) -> Vec<String> {
    list(raw)
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn text(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
