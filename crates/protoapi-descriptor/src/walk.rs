//! Borrowed views over the pool, visited in declaration order.

use crate::model::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FieldLabel, FieldType, FileDescriptorProto, MethodDescriptorProto, OneofDescriptorProto,
    OptionsJson, ServiceDescriptorProto,
};
use crate::pool::{
    DescriptorPool, ENUM_VALUE, FILE_ENUM_TYPE, FILE_MESSAGE_TYPE, FILE_SERVICE, MESSAGE_ENUM_TYPE,
    MESSAGE_FIELD, MESSAGE_NESTED_TYPE, SERVICE_METHOD,
};
use crate::{normalize_type_name, option_bool, qualify_type_name, DescriptorError, Result};

// =============================================================================
// Files
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct FileRef<'a> {
    pool: &'a DescriptorPool,
    index: usize,
}

impl<'a> FileRef<'a> {
    pub(crate) fn new(pool: &'a DescriptorPool, index: usize) -> Self {
        Self { pool, index }
    }

    pub fn pool(&self) -> &'a DescriptorPool {
        self.pool
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn proto(&self) -> &'a FileDescriptorProto {
        self.pool.file_proto(self.index)
    }

    pub fn name(&self) -> &'a str {
        self.proto().name.as_deref().unwrap_or("<unknown>")
    }

    pub fn package(&self) -> &'a str {
        self.proto().package.as_deref().unwrap_or_default()
    }

    pub fn options(&self) -> Option<&'a OptionsJson> {
        self.proto().options.as_ref()
    }

    /// Top-level messages.
    pub fn messages(&self) -> Vec<MessageRef<'a>> {
        (0..self.proto().message_type.len())
            .map(|i| self.message_at(i))
            .collect()
    }

    /// Top-level enums.
    pub fn enums(&self) -> Vec<EnumRef<'a>> {
        (0..self.proto().enum_type.len())
            .map(|i| self.enum_at(i))
            .collect()
    }

    pub fn services(&self) -> Vec<ServiceRef<'a>> {
        (0..self.proto().service.len())
            .map(|index| {
                let proto = &self.proto().service[index];
                ServiceRef {
                    file: *self,
                    proto,
                    index,
                    full_name: qualify_type_name(
                        self.package(),
                        proto.name.as_deref().unwrap_or_default(),
                    ),
                }
            })
            .collect()
    }

    pub(crate) fn message_at(&self, index: usize) -> MessageRef<'a> {
        let proto = &self.proto().message_type[index];
        MessageRef {
            file: *self,
            proto,
            full_name: qualify_type_name(self.package(), proto.name.as_deref().unwrap_or_default()),
            source_path: vec![FILE_MESSAGE_TYPE, index as i32],
        }
    }

    pub(crate) fn enum_at(&self, index: usize) -> EnumRef<'a> {
        let proto = &self.proto().enum_type[index];
        EnumRef {
            file: *self,
            proto,
            full_name: qualify_type_name(self.package(), proto.name.as_deref().unwrap_or_default()),
            source_path: vec![FILE_ENUM_TYPE, index as i32],
        }
    }

    fn comment(&self, path: &[i32]) -> Option<&'a str> {
        self.pool.comment(self.index, path)
    }
}

// =============================================================================
// Messages + fields
// =============================================================================

#[derive(Debug, Clone)]
pub struct MessageRef<'a> {
    file: FileRef<'a>,
    proto: &'a DescriptorProto,
    full_name: String,
    source_path: Vec<i32>,
}

impl<'a> MessageRef<'a> {
    pub fn file(&self) -> FileRef<'a> {
        self.file
    }

    pub fn proto(&self) -> &'a DescriptorProto {
        self.proto
    }

    pub fn name(&self) -> &'a str {
        self.proto.name.as_deref().unwrap_or_default()
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn options(&self) -> Option<&'a OptionsJson> {
        self.proto.options.as_ref()
    }

    pub fn comment(&self) -> Option<&'a str> {
        self.file.comment(&self.source_path)
    }

    pub fn is_map_entry(&self) -> bool {
        option_bool(self.options(), "mapEntry")
    }

    pub fn is_deprecated(&self) -> bool {
        option_bool(self.options(), "deprecated")
    }

    pub fn fields(&self) -> Vec<FieldRef<'a>> {
        (0..self.proto.field.len())
            .map(|index| FieldRef {
                message: self.clone(),
                proto: &self.proto.field[index],
                index,
            })
            .collect()
    }

    pub fn field_by_name(&self, name: &str) -> Option<FieldRef<'a>> {
        self.fields().into_iter().find(|f| f.name() == name)
    }

    pub fn field_by_number(&self, number: i32) -> Option<FieldRef<'a>> {
        self.fields().into_iter().find(|f| f.number() == number)
    }

    pub fn oneofs(&self) -> Vec<OneofRef<'a>> {
        (0..self.proto.oneof_decl.len())
            .map(|index| OneofRef {
                message: self.clone(),
                proto: &self.proto.oneof_decl[index],
                index,
            })
            .collect()
    }

    pub fn nested_messages(&self) -> Vec<MessageRef<'a>> {
        (0..self.proto.nested_type.len())
            .map(|i| self.nested_message_at(i))
            .collect()
    }

    pub fn nested_enums(&self) -> Vec<EnumRef<'a>> {
        (0..self.proto.enum_type.len())
            .map(|i| self.nested_enum_at(i))
            .collect()
    }

    pub(crate) fn nested_message_at(&self, index: usize) -> MessageRef<'a> {
        let proto = &self.proto.nested_type[index];
        MessageRef {
            file: self.file,
            proto,
            full_name: format!(
                "{}.{}",
                self.full_name,
                proto.name.as_deref().unwrap_or_default()
            ),
            source_path: [
                self.source_path.clone(),
                vec![MESSAGE_NESTED_TYPE, index as i32],
            ]
            .concat(),
        }
    }

    pub(crate) fn nested_enum_at(&self, index: usize) -> EnumRef<'a> {
        let proto = &self.proto.enum_type[index];
        EnumRef {
            file: self.file,
            proto,
            full_name: format!(
                "{}.{}",
                self.full_name,
                proto.name.as_deref().unwrap_or_default()
            ),
            source_path: [
                self.source_path.clone(),
                vec![MESSAGE_ENUM_TYPE, index as i32],
            ]
            .concat(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldRef<'a> {
    message: MessageRef<'a>,
    proto: &'a FieldDescriptorProto,
    index: usize,
}

impl<'a> FieldRef<'a> {
    /// The message declaring this field.
    pub fn parent(&self) -> &MessageRef<'a> {
        &self.message
    }

    pub fn proto(&self) -> &'a FieldDescriptorProto {
        self.proto
    }

    pub fn name(&self) -> &'a str {
        self.proto.name.as_deref().unwrap_or_default()
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.message.full_name(), self.name())
    }

    pub fn json_name(&self) -> String {
        self.proto
            .json_name
            .clone()
            .unwrap_or_else(|| crate::to_lower_camel(self.name()))
    }

    pub fn number(&self) -> i32 {
        self.proto.number.unwrap_or_default()
    }

    pub fn kind(&self) -> FieldType {
        match self.proto.typ {
            Some(t) => t,
            None if self.proto.type_name.is_some() => FieldType::Message,
            None => FieldType::String,
        }
    }

    pub fn is_repeated(&self) -> bool {
        self.proto.label == Some(FieldLabel::Repeated)
    }

    pub fn is_proto3_optional(&self) -> bool {
        self.proto.proto3_optional.unwrap_or(false)
    }

    pub fn is_deprecated(&self) -> bool {
        option_bool(self.options(), "deprecated")
    }

    /// Referenced type without the leading `.`.
    pub fn type_name(&self) -> Option<&'a str> {
        self.proto.type_name.as_deref().map(normalize_type_name)
    }

    /// Index of the field's oneof, unless it is the synthetic oneof of a
    /// proto3 `optional` field.
    pub fn oneof_index(&self) -> Option<usize> {
        if self.is_proto3_optional() {
            return None;
        }
        self.proto
            .oneof_index
            .and_then(|i| usize::try_from(i).ok())
    }

    pub fn options(&self) -> Option<&'a OptionsJson> {
        self.proto.options.as_ref()
    }

    pub fn comment(&self) -> Option<&'a str> {
        let path = [
            self.message.source_path.clone(),
            vec![MESSAGE_FIELD, self.index as i32],
        ]
        .concat();
        self.message.file.comment(&path)
    }

    pub fn resolve_message(&self) -> Result<MessageRef<'a>> {
        let name = self.type_name().unwrap_or_default();
        self.message
            .file
            .pool()
            .message(name)
            .ok_or_else(|| self.unresolved(name))
    }

    pub fn resolve_enum(&self) -> Result<EnumRef<'a>> {
        let name = self.type_name().unwrap_or_default();
        self.message
            .file
            .pool()
            .enumeration(name)
            .ok_or_else(|| self.unresolved(name))
    }

    /// The synthesized `*Entry` message when this is a `map<K, V>` field.
    pub fn map_entry(&self) -> Result<Option<MessageRef<'a>>> {
        if !self.is_repeated() || self.kind() != FieldType::Message {
            return Ok(None);
        }
        let target = self.resolve_message()?;
        Ok(target.is_map_entry().then_some(target))
    }

    fn unresolved(&self, name: &str) -> DescriptorError {
        DescriptorError::UnresolvedType {
            name: name.to_string(),
            referrer: self.full_name(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OneofRef<'a> {
    message: MessageRef<'a>,
    proto: &'a OneofDescriptorProto,
    index: usize,
}

impl<'a> OneofRef<'a> {
    pub fn name(&self) -> &'a str {
        self.proto.name.as_deref().unwrap_or_default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn options(&self) -> Option<&'a OptionsJson> {
        self.proto.options.as_ref()
    }

    /// Member fields in declaration order.
    pub fn fields(&self) -> Vec<FieldRef<'a>> {
        self.message
            .fields()
            .into_iter()
            .filter(|f| f.proto.oneof_index == Some(self.index as i32))
            .collect()
    }

    /// Synthetic oneofs wrap exactly one proto3 `optional` field.
    pub fn is_synthetic(&self) -> bool {
        let fields = self.fields();
        !fields.is_empty() && fields.iter().all(FieldRef::is_proto3_optional)
    }
}

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone)]
pub struct EnumRef<'a> {
    file: FileRef<'a>,
    proto: &'a EnumDescriptorProto,
    full_name: String,
    source_path: Vec<i32>,
}

impl<'a> EnumRef<'a> {
    pub fn file(&self) -> FileRef<'a> {
        self.file
    }

    pub fn name(&self) -> &'a str {
        self.proto.name.as_deref().unwrap_or_default()
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn options(&self) -> Option<&'a OptionsJson> {
        self.proto.options.as_ref()
    }

    pub fn values(&self) -> &'a [EnumValueDescriptorProto] {
        &self.proto.value
    }

    pub fn value_name(&self, number: i32) -> Option<&'a str> {
        self.proto
            .value
            .iter()
            .find(|v| v.number.unwrap_or_default() == number)
            .and_then(|v| v.name.as_deref())
    }

    pub fn comment(&self) -> Option<&'a str> {
        self.file.comment(&self.source_path)
    }

    pub fn value_comment(&self, index: usize) -> Option<&'a str> {
        let path = [self.source_path.clone(), vec![ENUM_VALUE, index as i32]].concat();
        self.file.comment(&path)
    }
}

// =============================================================================
// Services + methods
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServiceRef<'a> {
    file: FileRef<'a>,
    proto: &'a ServiceDescriptorProto,
    index: usize,
    full_name: String,
}

impl<'a> ServiceRef<'a> {
    pub fn file(&self) -> FileRef<'a> {
        self.file
    }

    pub fn name(&self) -> &'a str {
        self.proto.name.as_deref().unwrap_or_default()
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn options(&self) -> Option<&'a OptionsJson> {
        self.proto.options.as_ref()
    }

    pub fn comment(&self) -> Option<&'a str> {
        self.file.comment(&[FILE_SERVICE, self.index as i32])
    }

    pub fn methods(&self) -> Vec<MethodRef<'a>> {
        (0..self.proto.method.len())
            .map(|index| MethodRef {
                service: self.clone(),
                proto: &self.proto.method[index],
                index,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct MethodRef<'a> {
    service: ServiceRef<'a>,
    proto: &'a MethodDescriptorProto,
    index: usize,
}

impl<'a> MethodRef<'a> {
    pub fn service(&self) -> &ServiceRef<'a> {
        &self.service
    }

    pub fn name(&self) -> &'a str {
        self.proto.name.as_deref().unwrap_or_default()
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.service.full_name, self.name())
    }

    pub fn options(&self) -> Option<&'a OptionsJson> {
        self.proto.options.as_ref()
    }

    pub fn comment(&self) -> Option<&'a str> {
        self.service.file.comment(&[
            FILE_SERVICE,
            self.service.index as i32,
            SERVICE_METHOD,
            self.index as i32,
        ])
    }

    pub fn input_type(&self) -> &'a str {
        normalize_type_name(self.proto.input_type.as_deref().unwrap_or_default())
    }

    pub fn output_type(&self) -> &'a str {
        normalize_type_name(self.proto.output_type.as_deref().unwrap_or_default())
    }

    pub fn input(&self) -> Result<MessageRef<'a>> {
        self.resolve(self.input_type())
    }

    pub fn output(&self) -> Result<MessageRef<'a>> {
        self.resolve(self.output_type())
    }

    pub fn client_streaming(&self) -> bool {
        self.proto.client_streaming.unwrap_or(false)
    }

    pub fn server_streaming(&self) -> bool {
        self.proto.server_streaming.unwrap_or(false)
    }

    pub fn is_streaming(&self) -> bool {
        self.client_streaming() || self.server_streaming()
    }

    /// `option idempotency_level = NO_SIDE_EFFECTS;`
    pub fn is_side_effect_free(&self) -> bool {
        self.options()
            .and_then(|o| o.get("idempotencyLevel"))
            .and_then(|v| v.as_str())
            .is_some_and(|v| v == "NO_SIDE_EFFECTS")
    }

    pub fn is_deprecated(&self) -> bool {
        option_bool(self.options(), "deprecated")
    }

    fn resolve(&self, name: &str) -> Result<MessageRef<'a>> {
        self.service
            .file
            .pool()
            .message(name)
            .ok_or_else(|| DescriptorError::UnresolvedType {
                name: name.to_string(),
                referrer: self.full_name(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn methods_and_oneofs_in_declaration_order() {
        let pool = DescriptorPool::from_descriptor_set_json(
            &json!({
                "file": [{
                    "name": "svc.proto",
                    "package": "svc",
                    "messageType": [{
                        "name": "Req",
                        "field": [
                            { "name": "a", "number": 1, "type": "TYPE_STRING", "oneofIndex": 0 },
                            { "name": "b", "number": 2, "type": "TYPE_INT32", "oneofIndex": 0 },
                            { "name": "c", "number": 3, "type": "TYPE_STRING", "oneofIndex": 1, "proto3Optional": true }
                        ],
                        "oneofDecl": [ { "name": "choice" }, { "name": "_c" } ]
                    }],
                    "service": [{
                        "name": "Echo",
                        "method": [
                            { "name": "Say", "inputType": ".svc.Req", "outputType": ".svc.Req",
                              "options": { "idempotencyLevel": "NO_SIDE_EFFECTS" } },
                            { "name": "Stream", "inputType": ".svc.Req", "outputType": ".svc.Missing",
                              "serverStreaming": true }
                        ]
                    }],
                    "sourceCodeInfo": { "location": [ { "path": [6, 0, 2, 1], "leadingComments": " Streams.\n" } ] }
                }]
            })
            .to_string(),
        )
        .unwrap();

        let file = pool.file("svc.proto").unwrap();
        let service = &file.services()[0];
        assert_eq!(service.full_name(), "svc.Echo");
        let methods = service.methods();
        assert_eq!(methods[0].full_name(), "svc.Echo.Say");
        assert!(methods[0].is_side_effect_free());
        assert!(!methods[0].is_streaming());
        assert!(methods[1].is_streaming());
        assert_eq!(methods[1].comment(), Some("Streams."));
        assert!(matches!(
            methods[1].output(),
            Err(DescriptorError::UnresolvedType { name, .. }) if name == "svc.Missing"
        ));

        let req = methods[0].input().unwrap();
        let oneofs = req.oneofs();
        assert!(!oneofs[0].is_synthetic());
        assert!(oneofs[1].is_synthetic());
        let names: Vec<_> = oneofs[0].fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(req.field_by_name("c").unwrap().oneof_index(), None);
        assert_eq!(req.field_by_name("b").unwrap().json_name(), "b");
    }
}
