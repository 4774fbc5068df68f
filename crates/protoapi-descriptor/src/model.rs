//! Descriptor JSON (subset).
//!
//! Field names follow the protobuf JSON mapping (`messageType`, `typeName`,
//! ...). Everything is optional: protobuf JSON omits default values.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Option bag: plain options by name, extensions as `"[full.name]"`.
pub type OptionsJson = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileDescriptorSet {
    #[serde(default)]
    pub file: Vec<FileDescriptorProto>,
}

/// `google.protobuf.compiler.CodeGeneratorRequest`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeGeneratorRequest {
    #[serde(default)]
    pub file_to_generate: Vec<String>,
    pub parameter: Option<String>,
    #[serde(default)]
    pub proto_file: Vec<FileDescriptorProto>,
}

/// `google.protobuf.compiler.CodeGeneratorResponse`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeGeneratorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub file: Vec<ResponseFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseFile {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptorProto {
    pub name: Option<String>,
    pub package: Option<String>,
    #[serde(default)]
    pub dependency: Vec<String>,
    #[serde(default)]
    pub message_type: Vec<DescriptorProto>,
    #[serde(default)]
    pub enum_type: Vec<EnumDescriptorProto>,
    #[serde(default)]
    pub service: Vec<ServiceDescriptorProto>,
    pub options: Option<OptionsJson>,
    pub source_code_info: Option<SourceCodeInfo>,
    pub syntax: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorProto {
    pub name: Option<String>,
    #[serde(default)]
    pub field: Vec<FieldDescriptorProto>,
    #[serde(default)]
    pub nested_type: Vec<DescriptorProto>,
    #[serde(default)]
    pub enum_type: Vec<EnumDescriptorProto>,
    #[serde(default)]
    pub oneof_decl: Vec<OneofDescriptorProto>,
    pub options: Option<OptionsJson>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneofDescriptorProto {
    pub name: Option<String>,
    pub options: Option<OptionsJson>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "TYPE_DOUBLE")]
    Double,
    #[serde(rename = "TYPE_FLOAT")]
    Float,
    #[serde(rename = "TYPE_INT64")]
    Int64,
    #[serde(rename = "TYPE_UINT64")]
    Uint64,
    #[serde(rename = "TYPE_INT32")]
    Int32,
    #[serde(rename = "TYPE_FIXED64")]
    Fixed64,
    #[serde(rename = "TYPE_FIXED32")]
    Fixed32,
    #[serde(rename = "TYPE_BOOL")]
    Bool,
    #[serde(rename = "TYPE_STRING")]
    String,
    #[serde(rename = "TYPE_GROUP")]
    Group,
    #[serde(rename = "TYPE_MESSAGE")]
    Message,
    #[serde(rename = "TYPE_BYTES")]
    Bytes,
    #[serde(rename = "TYPE_UINT32")]
    Uint32,
    #[serde(rename = "TYPE_ENUM")]
    Enum,
    #[serde(rename = "TYPE_SFIXED32")]
    Sfixed32,
    #[serde(rename = "TYPE_SFIXED64")]
    Sfixed64,
    #[serde(rename = "TYPE_SINT32")]
    Sint32,
    #[serde(rename = "TYPE_SINT64")]
    Sint64,
}

impl FieldType {
    pub fn is_64_bit_integer(self) -> bool {
        matches!(
            self,
            Self::Int64 | Self::Uint64 | Self::Fixed64 | Self::Sfixed64 | Self::Sint64
        )
    }

    pub fn is_32_bit_integer(self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::Uint32 | Self::Fixed32 | Self::Sfixed32 | Self::Sint32
        )
    }

    /// Message-like kinds point at another descriptor through `typeName`.
    pub fn is_reference(self) -> bool {
        matches!(self, Self::Message | Self::Group | Self::Enum)
    }

    /// Key used by `buf.validate.FieldRules` for this kind.
    pub fn rules_key(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Int32 => "int32",
            Self::Fixed64 => "fixed64",
            Self::Fixed32 => "fixed32",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Group | Self::Message => "message",
            Self::Bytes => "bytes",
            Self::Uint32 => "uint32",
            Self::Enum => "enum",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldLabel {
    #[serde(rename = "LABEL_OPTIONAL")]
    Optional,
    #[serde(rename = "LABEL_REQUIRED")]
    Required,
    #[serde(rename = "LABEL_REPEATED")]
    Repeated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptorProto {
    pub name: Option<String>,
    pub number: Option<i32>,
    pub label: Option<FieldLabel>,
    #[serde(rename = "type")]
    pub typ: Option<FieldType>,
    pub type_name: Option<String>,
    pub json_name: Option<String>,
    pub options: Option<OptionsJson>,
    pub oneof_index: Option<i32>,
    pub proto3_optional: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnumDescriptorProto {
    pub name: Option<String>,
    #[serde(default)]
    pub value: Vec<EnumValueDescriptorProto>,
    pub options: Option<OptionsJson>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnumValueDescriptorProto {
    pub name: Option<String>,
    pub number: Option<i32>,
    pub options: Option<OptionsJson>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDescriptorProto {
    pub name: Option<String>,
    #[serde(default)]
    pub method: Vec<MethodDescriptorProto>,
    pub options: Option<OptionsJson>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptorProto {
    pub name: Option<String>,
    pub input_type: Option<String>,
    pub output_type: Option<String>,
    pub options: Option<OptionsJson>,
    pub client_streaming: Option<bool>,
    pub server_streaming: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceCodeInfo {
    #[serde(default)]
    pub location: Vec<Location>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub path: Vec<i32>,
    #[serde(default)]
    pub span: Vec<i32>,
    pub leading_comments: Option<String>,
    pub trailing_comments: Option<String>,
    #[serde(default)]
    pub leading_detached_comments: Vec<String>,
}
