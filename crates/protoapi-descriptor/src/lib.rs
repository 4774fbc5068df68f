//! Protobuf descriptor sets, read as JSON.
//!
//! This crate is the read-only boundary between the host (protoc/buf) and the
//! OpenAPI compiler:
//!
//! - `model` mirrors the subset of `google.protobuf.FileDescriptorSet` and
//!   `google.protobuf.compiler.CodeGeneratorRequest` that we need,
//! - `pool` indexes every message/enum by fully-qualified name and every
//!   source comment by its source-code-info path,
//! - `walk` hands out cheap borrowed views (`MessageRef`, `FieldRef`, ...)
//!   for traversal in declaration order.
//!
//! Why JSON?
//!
//! Custom options (`(google.api.http)`, `(buf.validate.field)`, gnostic
//! annotations) are encoded as extensions. Decoding those from the binary
//! descriptor requires an extension-aware reflective stack. The protobuf JSON
//! rendering emits them explicitly as bracketed keys:
//!
//! ```json
//! { "[google.api.http]": { "get": "/v1/messages/{message_id}" } }
//! ```
//!
//! so every option bag is kept as an ordered `name → serde_json::Value` map.

pub mod model;
pub mod pool;
pub mod walk;

pub use model::{
    CodeGeneratorRequest, CodeGeneratorResponse, DescriptorProto, EnumDescriptorProto,
    EnumValueDescriptorProto, FieldDescriptorProto, FieldLabel, FieldType, FileDescriptorProto,
    FileDescriptorSet, MethodDescriptorProto, OneofDescriptorProto, OptionsJson,
    ResponseFile, ServiceDescriptorProto,
};
pub use pool::DescriptorPool;
pub use walk::{EnumRef, FieldRef, FileRef, MessageRef, MethodRef, OneofRef, ServiceRef};

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("failed to parse descriptor JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("type `{name}` referenced from `{referrer}` is not defined in the descriptor set")]
    UnresolvedType { name: String, referrer: String },

    #[error("file `{0}` is not part of the descriptor set")]
    UnknownFile(String),

    #[error("duplicate definition of `{0}`")]
    DuplicateType(String),
}

pub type Result<T, E = DescriptorError> = std::result::Result<T, E>;

/// Strip the leading `.` protoc puts on fully-qualified type references.
pub fn normalize_type_name(name: &str) -> &str {
    name.trim_start_matches('.')
}

/// Join a package and a (possibly nested) type path into a fully-qualified name.
pub fn qualify_type_name(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}

/// Look up an extension option rendered as `"[full.name]"`.
pub fn extension<'a>(options: Option<&'a OptionsJson>, full_name: &str) -> Option<&'a serde_json::Value> {
    let options = options?;
    options
        .iter()
        .find(|(k, _)| {
            k.strip_prefix('[')
                .and_then(|k| k.strip_suffix(']'))
                .is_some_and(|k| k == full_name)
        })
        .map(|(_, v)| v)
}

/// Read a plain boolean option (`deprecated`, `mapEntry`, ...).
pub fn option_bool(options: Option<&OptionsJson>, name: &str) -> bool {
    options
        .and_then(|o| o.get(name))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// The protobuf JSON name of a field (`foo_bar` → `fooBar`).
///
/// protoc always fills `jsonName`; this is only used when it is missing.
pub fn to_lower_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
