//! Descriptor → JSON Schema translation.
//!
//! Component schemas are keyed by fully-qualified type name. Message fields
//! only ever point at other types through `$ref`, so recursive and mutually
//! recursive messages need no cycle detection: a type is built once and every
//! further mention is a reference.
//!
//! References to types outside the file being compiled are queued and
//! materialized by [`SchemaBuilder::drain_external`], breadth first, until the
//! component set is closed.

pub mod well_known;

use crate::annotate::{AnnotateContext, Annotator};
use crate::error::Result;
use crate::model::{Schema, SchemaType};
use crate::options::Options;
use indexmap::IndexMap;
use protoapi_descriptor::{
    DescriptorError, DescriptorPool, EnumRef, FieldLabel, FieldRef, FieldType, FileRef, MessageRef,
};
use std::collections::{HashSet, VecDeque};

pub struct SchemaBuilder<'a> {
    options: &'a Options,
    annotators: &'a dyn Annotator,
    pool: &'a DescriptorPool,
    schemas: IndexMap<String, Schema>,
    pending: VecDeque<String>,
    materialized: HashSet<String>,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(options: &'a Options, annotators: &'a dyn Annotator, pool: &'a DescriptorPool) -> Self {
        Self {
            options,
            annotators,
            pool,
            schemas: IndexMap::new(),
            pending: VecDeque::new(),
            materialized: HashSet::new(),
        }
    }

    pub fn options(&self) -> &'a Options {
        self.options
    }

    pub fn annotators(&self) -> &'a dyn Annotator {
        self.annotators
    }

    fn context(&self) -> AnnotateContext<'a> {
        AnnotateContext {
            options: self.options,
        }
    }

    /// Build every message and enum declared in `file`, nested ones included.
    pub fn build_file(&mut self, file: &FileRef<'_>) -> Result<()> {
        for message in file.messages() {
            self.build_message_tree(&message)?;
        }
        for enumeration in file.enums() {
            let (name, schema) = self.build_enum(&enumeration);
            self.insert(name, schema);
        }
        Ok(())
    }

    fn build_message_tree(&mut self, message: &MessageRef<'_>) -> Result<()> {
        if message.is_map_entry() {
            return Ok(());
        }
        if let Some((name, schema)) = self.build_message(message)? {
            self.insert(name, schema);
        }
        for enumeration in message.nested_enums() {
            let (name, schema) = self.build_enum(&enumeration);
            self.insert(name, schema);
        }
        for nested in message.nested_messages() {
            self.build_message_tree(&nested)?;
        }
        Ok(())
    }

    fn insert(&mut self, name: String, schema: Schema) {
        self.materialized.insert(name.clone());
        self.schemas.insert(name, schema);
    }

    /// `None` for `google.protobuf.Empty`, which never becomes a component.
    pub fn build_message(&mut self, message: &MessageRef<'_>) -> Result<Option<(String, Schema)>> {
        let full_name = message.full_name().to_string();
        if well_known::is_empty(&full_name) {
            return Ok(None);
        }
        if let Some(schema) = well_known::schema(&full_name) {
            self.enqueue_well_known_dependencies(&full_name);
            return Ok(Some((full_name, schema)));
        }

        let mut schema = Schema {
            title: Some(self.title(message.name(), &full_name)),
            description: message.comment().map(str::to_string),
            deprecated: message.is_deprecated().then_some(true),
            ..Schema::typed("object")
        };

        for field in message.fields() {
            let property = self.build_field(&mut schema, &field)?;
            schema
                .properties
                .insert(self.options.property_name(&field), property);
        }

        for oneof in message.oneofs() {
            if oneof.is_synthetic() {
                continue;
            }
            let names: Vec<String> = oneof
                .fields()
                .iter()
                .map(|f| self.options.property_name(f))
                .collect();
            if names.is_empty() {
                continue;
            }
            add_combinator(&mut schema, oneof_combinator(&names));
        }

        self.annotators
            .message(&self.context(), message, &mut schema);
        Ok(Some((full_name, schema)))
    }

    pub fn build_enum(&mut self, enumeration: &EnumRef<'_>) -> (String, Schema) {
        let full_name = enumeration.full_name().to_string();
        if let Some(schema) = well_known::schema(&full_name) {
            return (full_name, schema);
        }

        let mut values: Vec<serde_json::Value> = enumeration
            .values()
            .iter()
            .map(|v| v.name.clone().unwrap_or_default().into())
            .collect();
        let schema_type = if self.options.include_number_enum_values {
            values.extend(
                enumeration
                    .values()
                    .iter()
                    .map(|v| v.number.unwrap_or_default().into()),
            );
            SchemaType::many(&["string", "integer"])
        } else {
            SchemaType::one("string")
        };

        let schema = Schema {
            title: Some(self.title(enumeration.name(), &full_name)),
            description: enumeration.comment().map(str::to_string),
            schema_type: Some(schema_type),
            enum_values: values,
            ..Default::default()
        };
        (full_name, schema)
    }

    /// Schema of `field` as a property of `parent`.
    ///
    /// Annotators may record constraints on `parent` (a required field adds
    /// its name to `parent.required`).
    pub fn build_field(&mut self, parent: &mut Schema, field: &FieldRef<'_>) -> Result<Schema> {
        let mut schema = if let Some(entry) = field.map_entry()? {
            let value = entry.field_by_number(2).ok_or_else(|| {
                DescriptorError::UnresolvedType {
                    name: format!("{}.value", entry.full_name()),
                    referrer: field.full_name(),
                }
            })?;
            Schema::map(self.element(&value, field, parent)?)
        } else if field.is_repeated() {
            Schema::array(self.element(field, field, parent)?)
        } else {
            self.element(field, field, parent)?
        };

        if let Some(comment) = field.comment() {
            schema.description = Some(comment.to_string());
        }
        if field.is_deprecated() {
            schema.deprecated = Some(true);
        }
        if field.proto().label == Some(FieldLabel::Required) {
            parent.require(&self.options.property_name(field));
        }

        self.annotators
            .field(&self.context(), field, &mut schema, parent);
        Ok(schema)
    }

    /// Schema of `field` outside of any message (query parameters, bodies).
    pub fn field_schema(&mut self, field: &FieldRef<'_>) -> Result<Schema> {
        let mut scratch = Schema::default();
        self.build_field(&mut scratch, field)
    }

    /// Schema of one value of `field`: the scalar, or a `$ref`. Reference
    /// hooks see `owner`, the property's own field (the map field for values).
    fn element(
        &mut self,
        field: &FieldRef<'_>,
        owner: &FieldRef<'_>,
        parent: &mut Schema,
    ) -> Result<Schema> {
        let kind = field.kind();
        if !kind.is_reference() {
            return Ok(scalar(kind));
        }

        let type_name = field.type_name().unwrap_or_default().to_string();
        if well_known::is_empty(&type_name) {
            return Ok(Schema::typed("object"));
        }
        if well_known::schema(&type_name).is_none() {
            // Fail on the referring field rather than during the drain.
            match kind {
                FieldType::Enum => {
                    field.resolve_enum()?;
                }
                _ => {
                    field.resolve_message()?;
                }
            }
        }

        let mut schema = self.reference(&type_name);
        self.annotators
            .field_reference(&self.context(), owner, &mut schema, parent);
        Ok(schema)
    }

    /// `$ref` to the component for `full_name`, queueing it for materialization.
    ///
    /// Returns `None` for `google.protobuf.Empty`.
    pub fn reference_message(&mut self, full_name: &str) -> Option<Schema> {
        if well_known::is_empty(full_name) {
            return None;
        }
        Some(self.reference(full_name))
    }

    fn reference(&mut self, full_name: &str) -> Schema {
        self.enqueue(full_name);
        Schema::reference(full_name)
    }

    fn enqueue(&mut self, full_name: &str) {
        if !self.materialized.contains(full_name) {
            self.pending.push_back(full_name.to_string());
        }
    }

    fn enqueue_well_known_dependencies(&mut self, full_name: &str) {
        for dep in well_known::dependencies(full_name) {
            self.enqueue(dep);
        }
    }

    /// Materialize every queued type that is not yet a component.
    pub fn drain_external(&mut self) -> Result<()> {
        while let Some(full_name) = self.pending.pop_front() {
            if self.materialized.contains(&full_name) {
                continue;
            }
            tracing::debug!(type_name = %full_name, "materializing referenced type");

            if well_known::is_empty(&full_name) {
                self.materialized.insert(full_name);
                continue;
            }
            if let Some(schema) = well_known::schema(&full_name) {
                self.enqueue_well_known_dependencies(&full_name);
                self.insert(full_name, schema);
                continue;
            }

            let pool = self.pool;
            if let Some(message) = pool.message(&full_name) {
                match self.build_message(&message)? {
                    Some((name, schema)) => self.insert(name, schema),
                    None => {
                        self.materialized.insert(full_name);
                    }
                }
            } else if let Some(enumeration) = pool.enumeration(&full_name) {
                let (name, schema) = self.build_enum(&enumeration);
                self.insert(name, schema);
            } else {
                return Err(DescriptorError::UnresolvedType {
                    name: full_name,
                    referrer: "<operation>".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Register a hand-written component unless one with that name exists.
    pub fn define(&mut self, name: &str, schema: impl FnOnce() -> Schema) -> Schema {
        if !self.schemas.contains_key(name) {
            self.insert(name.to_string(), schema());
        }
        Schema::reference(name)
    }

    pub fn schemas(&self) -> &IndexMap<String, Schema> {
        &self.schemas
    }

    /// Hand over the built components, leaving the builder empty.
    pub fn take(&mut self) -> IndexMap<String, Schema> {
        std::mem::take(&mut self.schemas)
    }

    fn title(&self, short: &str, full: &str) -> String {
        if self.options.full_message_titles {
            full.to_string()
        } else {
            short.to_string()
        }
    }
}

fn scalar(kind: FieldType) -> Schema {
    match kind {
        FieldType::Bool => Schema::typed("boolean"),
        FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => {
            Schema::typed_with_format("integer", "int32")
        }
        FieldType::Uint32 | FieldType::Fixed32 => Schema::typed("integer"),
        k if k.is_64_bit_integer() => Schema {
            schema_type: Some(SchemaType::many(&["integer", "string"])),
            format: Some("int64".to_string()),
            ..Default::default()
        },
        FieldType::Float => Schema::typed_with_format("number", "float"),
        FieldType::Double => Schema::typed_with_format("number", "double"),
        FieldType::Bytes => Schema::typed_with_format("string", "byte"),
        _ => Schema::typed("string"),
    }
}

// =============================================================================
// Oneof combinators
// =============================================================================

/// Accept at most one of `names`:
///
/// ```yaml
/// oneOf:
///   - required: [a]
///   - required: [b]
///   - not: { anyOf: [ { required: [a] }, { required: [b] } ] }
/// ```
pub fn oneof_combinator(names: &[String]) -> Schema {
    let each: Vec<Schema> = names
        .iter()
        .map(|n| Schema::requiring(std::slice::from_ref(n)))
        .collect();
    let mut one_of = each.clone();
    one_of.push(Schema {
        not: Some(Box::new(Schema {
            any_of: each,
            ..Default::default()
        })),
        ..Default::default()
    });
    Schema {
        one_of,
        ..Default::default()
    }
}

/// Attach a group combinator; a second group moves both under `allOf`.
pub fn add_combinator(schema: &mut Schema, combinator: Schema) {
    if schema.one_of.is_empty() && schema.all_of.is_empty() {
        schema.one_of = combinator.one_of;
        return;
    }
    if !schema.one_of.is_empty() {
        let first = Schema {
            one_of: std::mem::take(&mut schema.one_of),
            ..Default::default()
        };
        schema.all_of.push(first);
    }
    schema.all_of.push(combinator);
}

/// Turn the "at most one" group over `names` into "exactly one".
///
/// Returns false when no combinator for that group exists.
pub fn require_one_of(schema: &mut Schema, names: &[String]) -> bool {
    if is_group(&schema.one_of, names) {
        schema.one_of.pop();
        return true;
    }
    for member in &mut schema.all_of {
        if is_group(&member.one_of, names) {
            member.one_of.pop();
            return true;
        }
    }
    false
}

fn is_group(one_of: &[Schema], names: &[String]) -> bool {
    let Some((last, each)) = one_of.split_last() else {
        return false;
    };
    last.not.is_some()
        && each.len() == names.len()
        && each
            .iter()
            .zip(names)
            .all(|(s, n)| s.required.len() == 1 && &s.required[0] == n)
}
