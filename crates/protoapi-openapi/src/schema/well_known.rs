//! `google.protobuf` types with a dedicated JSON mapping.

use crate::model::{AdditionalProperties, Schema, SchemaType};

pub const EMPTY: &str = "google.protobuf.Empty";

const DURATION_PATTERN: &str = r"^-?[0-9]+(\.[0-9]{0,9})?s$";

pub fn is_empty(full_name: &str) -> bool {
    full_name == EMPTY
}

/// Schema of a well-known type, or `None` for ordinary messages.
///
/// `Empty` is well known but has no schema of its own; callers check
/// [`is_empty`] first.
pub fn schema(full_name: &str) -> Option<Schema> {
    let short = full_name.strip_prefix("google.protobuf.")?;
    let schema = match short {
        "Duration" => Schema {
            pattern: Some(DURATION_PATTERN.to_string()),
            ..Schema::typed_with_format("string", "duration")
        },
        "Timestamp" => Schema::typed_with_format("string", "date-time"),
        "Value" => Schema {
            any_of: vec![
                Schema::typed("null"),
                Schema::typed("number"),
                Schema::typed("string"),
                Schema::typed("boolean"),
                Schema::typed("array"),
                open_object(),
            ],
            ..Default::default()
        },
        "Struct" => open_object(),
        "ListValue" => Schema::array(Schema::reference("google.protobuf.Value")),
        "Any" => Schema {
            properties: [("@type".to_string(), Schema::typed("string"))]
                .into_iter()
                .collect(),
            ..open_object()
        },
        "FieldMask" => Schema::typed_with_format("string", "field-mask"),
        "NullValue" => Schema::typed("null"),
        "DoubleValue" => nullable("number", Some("double")),
        "FloatValue" => nullable("number", Some("float")),
        "Int64Value" | "UInt64Value" => Schema {
            schema_type: Some(SchemaType::many(&["integer", "string", "null"])),
            format: Some("int64".to_string()),
            ..Default::default()
        },
        "Int32Value" => nullable("integer", Some("int32")),
        "UInt32Value" => nullable("integer", None),
        "BoolValue" => nullable("boolean", None),
        "StringValue" => nullable("string", None),
        "BytesValue" => nullable("string", Some("byte")),
        _ => return None,
    };
    Some(Schema {
        title: Some(short.to_string()),
        ..schema
    })
}

/// Types a well-known schema refers to, so they get materialized too.
pub fn dependencies(full_name: &str) -> &'static [&'static str] {
    match full_name {
        "google.protobuf.ListValue" => &["google.protobuf.Value"],
        _ => &[],
    }
}

fn open_object() -> Schema {
    Schema {
        additional_properties: Some(AdditionalProperties::Allowed(true)),
        ..Schema::typed("object")
    }
}

fn nullable(kind: &str, format: Option<&str>) -> Schema {
    Schema {
        schema_type: Some(SchemaType::many(&[kind, "null"])),
        format: format.map(str::to_string),
        ..Default::default()
    }
}
