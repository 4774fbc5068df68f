//! Type index over a set of file descriptors.

use crate::model::{CodeGeneratorRequest, DescriptorProto, FileDescriptorProto, FileDescriptorSet};
use crate::walk::{EnumRef, FileRef, MessageRef};
use crate::{qualify_type_name, DescriptorError, Result};
use std::collections::HashMap;

// Source-code-info field numbers (descriptor.proto).
pub(crate) const FILE_MESSAGE_TYPE: i32 = 4;
pub(crate) const FILE_ENUM_TYPE: i32 = 5;
pub(crate) const FILE_SERVICE: i32 = 6;
pub(crate) const MESSAGE_FIELD: i32 = 2;
pub(crate) const MESSAGE_NESTED_TYPE: i32 = 3;
pub(crate) const MESSAGE_ENUM_TYPE: i32 = 4;
pub(crate) const ENUM_VALUE: i32 = 2;
pub(crate) const SERVICE_METHOD: i32 = 2;

#[derive(Debug, Clone)]
pub(crate) enum TypeEntry {
    /// `nesting` is the index path through `messageType` / `nestedType`.
    Message { file: usize, nesting: Vec<usize> },
    Enum {
        file: usize,
        parent: Vec<usize>,
        index: usize,
    },
}

/// Every file of a compilation run plus lookup tables.
///
/// The pool owns the descriptors; all views (`MessageRef`, ...) borrow from it.
#[derive(Debug, Default)]
pub struct DescriptorPool {
    files: Vec<FileDescriptorProto>,
    files_by_name: HashMap<String, usize>,
    types: HashMap<String, TypeEntry>,
    comments: HashMap<(usize, Vec<i32>), String>,
}

impl DescriptorPool {
    pub fn new(files: Vec<FileDescriptorProto>) -> Result<Self> {
        let mut pool = DescriptorPool {
            files,
            ..Default::default()
        };

        // -------------------------------------------------------------------------
        // Pass 1: file names, fully-qualified type names.
        // -------------------------------------------------------------------------
        for (file_idx, file) in pool.files.iter().enumerate() {
            let file_name = file.name.clone().unwrap_or_default();
            pool.files_by_name.insert(file_name, file_idx);

            let package = file.package.clone().unwrap_or_default();
            for (msg_idx, m) in file.message_type.iter().enumerate() {
                index_message(
                    &mut pool.types,
                    file_idx,
                    &package,
                    m,
                    Vec::new(),
                    vec![msg_idx],
                )?;
            }
            for (enum_idx, e) in file.enum_type.iter().enumerate() {
                let fqn = qualify_type_name(&package, e.name.as_deref().unwrap_or_default());
                insert_type(
                    &mut pool.types,
                    fqn,
                    TypeEntry::Enum {
                        file: file_idx,
                        parent: Vec::new(),
                        index: enum_idx,
                    },
                )?;
            }
        }

        // -------------------------------------------------------------------------
        // Pass 2: comments keyed by (file, source path).
        // -------------------------------------------------------------------------
        for (file_idx, file) in pool.files.iter().enumerate() {
            let Some(sci) = &file.source_code_info else {
                continue;
            };
            for loc in &sci.location {
                let mut parts: Vec<String> = Vec::new();
                for c in [&loc.leading_comments, &loc.trailing_comments]
                    .into_iter()
                    .flatten()
                {
                    let cleaned = clean_comment(c);
                    if !cleaned.is_empty() {
                        parts.push(cleaned);
                    }
                }
                if !parts.is_empty() {
                    pool.comments
                        .insert((file_idx, loc.path.clone()), parts.join("\n\n"));
                }
            }
        }

        Ok(pool)
    }

    pub fn from_request(request: &CodeGeneratorRequest) -> Result<Self> {
        Self::new(request.proto_file.clone())
    }

    pub fn from_descriptor_set_json(text: &str) -> Result<Self> {
        let set: FileDescriptorSet = serde_json::from_str(text)?;
        Self::new(set.file)
    }

    pub fn files(&self) -> impl Iterator<Item = FileRef<'_>> {
        (0..self.files.len()).map(move |index| FileRef::new(self, index))
    }

    pub fn file(&self, name: &str) -> Result<FileRef<'_>> {
        self.files_by_name
            .get(name)
            .map(|&index| FileRef::new(self, index))
            .ok_or_else(|| DescriptorError::UnknownFile(name.to_string()))
    }

    /// Resolve a message by fully-qualified name (leading `.` allowed).
    pub fn message(&self, full_name: &str) -> Option<MessageRef<'_>> {
        let full_name = crate::normalize_type_name(full_name);
        match self.types.get(full_name)? {
            TypeEntry::Message { file, nesting } => Some(self.message_at(*file, nesting)),
            TypeEntry::Enum { .. } => None,
        }
    }

    /// Resolve an enum by fully-qualified name (leading `.` allowed).
    pub fn enumeration(&self, full_name: &str) -> Option<EnumRef<'_>> {
        let full_name = crate::normalize_type_name(full_name);
        match self.types.get(full_name)? {
            TypeEntry::Enum {
                file,
                parent,
                index,
            } => {
                if parent.is_empty() {
                    Some(FileRef::new(self, *file).enum_at(*index))
                } else {
                    Some(self.message_at(*file, parent).nested_enum_at(*index))
                }
            }
            TypeEntry::Message { .. } => None,
        }
    }

    pub(crate) fn file_proto(&self, index: usize) -> &FileDescriptorProto {
        &self.files[index]
    }

    pub(crate) fn comment(&self, file: usize, path: &[i32]) -> Option<&str> {
        self.comments
            .get(&(file, path.to_vec()))
            .map(String::as_str)
    }

    fn message_at(&self, file: usize, nesting: &[usize]) -> MessageRef<'_> {
        let file_ref = FileRef::new(self, file);
        let mut current = file_ref.message_at(nesting[0]);
        for &i in &nesting[1..] {
            current = current.nested_message_at(i);
        }
        current
    }
}

fn insert_type(
    types: &mut HashMap<String, TypeEntry>,
    fqn: String,
    entry: TypeEntry,
) -> Result<()> {
    if types.contains_key(&fqn) {
        return Err(DescriptorError::DuplicateType(fqn));
    }
    types.insert(fqn, entry);
    Ok(())
}

fn index_message(
    types: &mut HashMap<String, TypeEntry>,
    file: usize,
    package: &str,
    m: &DescriptorProto,
    mut prefix: Vec<String>,
    nesting: Vec<usize>,
) -> Result<()> {
    let Some(name) = m.name.clone() else {
        return Ok(());
    };
    prefix.push(name);
    let fqn = qualify_type_name(package, &prefix.join("."));
    insert_type(
        types,
        fqn,
        TypeEntry::Message {
            file,
            nesting: nesting.clone(),
        },
    )?;

    for (i, e) in m.enum_type.iter().enumerate() {
        let Some(en) = &e.name else { continue };
        let enum_fqn = qualify_type_name(package, &[prefix.join("."), en.clone()].join("."));
        insert_type(
            types,
            enum_fqn,
            TypeEntry::Enum {
                file,
                parent: nesting.clone(),
                index: i,
            },
        )?;
    }

    for (i, nested) in m.nested_type.iter().enumerate() {
        let mut child = nesting.clone();
        child.push(i);
        index_message(types, file, package, nested, prefix.clone(), child)?;
    }
    Ok(())
}

/// Trim protoc's comment text: one leading space per line, surrounding blank lines.
fn clean_comment(raw: &str) -> String {
    raw.lines()
        .map(|l| l.strip_prefix(' ').unwrap_or(l).trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pool() -> DescriptorPool {
        DescriptorPool::from_descriptor_set_json(
            &json!({
                "file": [
                    {
                        "name": "acme/v1/things.proto",
                        "package": "acme.v1",
                        "dependency": ["acme/v1/common.proto"],
                        "messageType": [
                            {
                                "name": "Thing",
                                "field": [
                                    { "name": "thing_id", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_STRING", "jsonName": "thingId" },
                                    { "name": "labels", "number": 2, "label": "LABEL_REPEATED", "type": "TYPE_MESSAGE", "typeName": ".acme.v1.Thing.LabelsEntry", "jsonName": "labels" },
                                    { "name": "meta", "number": 3, "label": "LABEL_OPTIONAL", "type": "TYPE_MESSAGE", "typeName": ".acme.v1.Meta", "jsonName": "meta" }
                                ],
                                "nestedType": [
                                    {
                                        "name": "LabelsEntry",
                                        "field": [
                                            { "name": "key", "number": 1, "type": "TYPE_STRING" },
                                            { "name": "value", "number": 2, "type": "TYPE_STRING" }
                                        ],
                                        "options": { "mapEntry": true }
                                    }
                                ],
                                "enumType": [
                                    { "name": "Kind", "value": [ { "name": "KIND_UNSPECIFIED", "number": 0 } ] }
                                ]
                            }
                        ],
                        "sourceCodeInfo": {
                            "location": [
                                { "path": [4, 0], "leadingComments": " A thing.\n Second line.\n", "leadingDetachedComments": [" license "] },
                                { "path": [4, 0, 2, 0], "trailingComments": " the id\n" }
                            ]
                        }
                    },
                    {
                        "name": "acme/v1/common.proto",
                        "package": "acme.v1",
                        "messageType": [ { "name": "Meta" } ]
                    }
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn resolves_nested_types_by_full_name() {
        let pool = pool();
        let entry = pool.message(".acme.v1.Thing.LabelsEntry").unwrap();
        assert!(entry.is_map_entry());
        assert_eq!(entry.full_name(), "acme.v1.Thing.LabelsEntry");

        let kind = pool.enumeration("acme.v1.Thing.Kind").unwrap();
        assert_eq!(kind.name(), "Kind");
        assert!(pool.message("acme.v1.Thing.Kind").is_none());
        assert!(pool.enumeration("acme.v1.Missing").is_none());
    }

    #[test]
    fn comments_skip_detached_and_strip_prefix() {
        let pool = pool();
        let thing = pool.message("acme.v1.Thing").unwrap();
        assert_eq!(thing.comment(), Some("A thing.\nSecond line."));
        let fields = thing.fields();
        assert_eq!(fields[0].comment(), Some("the id"));
        assert_eq!(fields[1].comment(), None);
    }

    #[test]
    fn cross_file_reference_keeps_its_own_file() {
        let pool = pool();
        let thing = pool.message("acme.v1.Thing").unwrap();
        let meta_field = thing.field_by_name("meta").unwrap();
        let meta = meta_field.resolve_message().unwrap();
        assert_eq!(meta.file().name(), "acme/v1/common.proto");
        assert_ne!(meta.file().index(), thing.file().index());
    }

    #[test]
    fn map_entries_are_detected_through_the_field() {
        let pool = pool();
        let thing = pool.message("acme.v1.Thing").unwrap();
        let labels = thing.field_by_name("labels").unwrap();
        assert!(labels.map_entry().unwrap().is_some());
        let meta = thing.field_by_name("meta").unwrap();
        assert!(meta.map_entry().unwrap().is_none());
    }

    #[test]
    fn unknown_file_is_an_error() {
        let pool = pool();
        assert!(matches!(
            pool.file("nope.proto"),
            Err(DescriptorError::UnknownFile(_))
        ));
    }

    #[test]
    fn duplicate_types_are_rejected() {
        let file = json!({ "name": "a.proto", "package": "p", "messageType": [ { "name": "A" } ] });
        let again = json!({ "name": "b.proto", "package": "p", "messageType": [ { "name": "A" } ] });
        let err = DescriptorPool::from_descriptor_set_json(
            &json!({ "file": [file, again] }).to_string(),
        )
        .unwrap_err();
        assert!(matches!(err, DescriptorError::DuplicateType(name) if name == "p.A"));
    }
}
