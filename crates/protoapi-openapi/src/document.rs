//! Folding generated fragments into one OpenAPI document.
//!
//! Every merge here is additive: nothing present before a merge disappears
//! after it. Scalars are replaced only by non-empty incoming values, lists are
//! appended with de-duplication, extension keys keep their first writer.

use crate::error::{Error, Result};
use crate::model::{
    Document, Extensions, Operation, Parameter, PathItem, RequestBody, Response, Schema, Server,
    Tag, OPENAPI_VERSION, SCHEMA_REF_PREFIX,
};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

/// Accumulates one output document.
#[derive(Debug, Default)]
pub struct Assembler {
    document: Document,
}

impl Assembler {
    /// Start from `base` when given, otherwise from an empty 3.1 document.
    pub fn new(base: Option<Document>) -> Self {
        let mut document = base.unwrap_or_default();
        if document.openapi.is_empty() {
            document.openapi = OPENAPI_VERSION.to_string();
        }
        Self { document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Generated schemas replace same-named schemas from the base document.
    pub fn add_schemas(&mut self, schemas: IndexMap<String, Schema>) {
        self.document.components.schemas.extend(schemas);
    }

    pub fn add_paths(&mut self, paths: IndexMap<String, PathItem>) {
        merge_paths(&mut self.document.paths, paths);
    }

    pub fn add_tags(&mut self, tags: Vec<Tag>) {
        merge_tags(&mut self.document.tags, tags);
    }

    /// Fill `info.title` / `info.version` when nothing set them yet.
    pub fn default_info(&mut self, title: &str, version: &str) {
        let info = &mut self.document.info;
        if info.title.is_empty() {
            info.title = title.to_string();
        }
        if info.version.is_empty() {
            info.version = version.to_string();
        }
    }

    /// Overlay the override document, optionally trim, then check closure.
    pub fn finish(mut self, override_document: Option<&Document>, trim: bool) -> Result<Document> {
        if let Some(overlay) = override_document {
            apply_override(&mut self.document, overlay.clone());
        }
        if trim {
            let removed = trim_unused_schemas(&mut self.document)?;
            if removed > 0 {
                tracing::debug!(removed, "trimmed unreferenced component schemas");
            }
        }
        check_closure(&self.document)?;
        Ok(self.document)
    }
}

// =============================================================================
// Merge rules
// =============================================================================

pub fn merge_paths(existing: &mut IndexMap<String, PathItem>, incoming: IndexMap<String, PathItem>) {
    for (route, item) in incoming {
        match existing.get_mut(&route) {
            Some(current) => merge_path_item(current, item),
            None => {
                existing.insert(route, item);
            }
        }
    }
}

pub fn merge_path_item(existing: &mut PathItem, incoming: PathItem) {
    let PathItem {
        summary,
        description,
        get,
        put,
        post,
        delete,
        options,
        head,
        patch,
        trace,
        servers,
        parameters,
        extensions,
    } = incoming;

    replace_if_set(&mut existing.summary, summary);
    replace_if_set(&mut existing.description, description);

    for (slot, op) in [
        (&mut existing.get, get),
        (&mut existing.put, put),
        (&mut existing.post, post),
        (&mut existing.delete, delete),
        (&mut existing.options, options),
        (&mut existing.head, head),
        (&mut existing.patch, patch),
        (&mut existing.trace, trace),
    ] {
        let Some(op) = op else { continue };
        match slot.take() {
            Some(mut current) => {
                merge_operation(&mut current, op);
                *slot = Some(current);
            }
            None => *slot = Some(op),
        }
    }

    merge_servers(&mut existing.servers, servers);
    merge_parameters(&mut existing.parameters, parameters);
    merge_extensions(&mut existing.extensions, extensions);
}

pub fn merge_operation(existing: &mut Operation, incoming: Operation) {
    replace_if_set(&mut existing.summary, incoming.summary);
    replace_if_set(&mut existing.description, incoming.description);
    replace_if_set(&mut existing.operation_id, incoming.operation_id);

    for tag in incoming.tags {
        if !existing.tags.contains(&tag) {
            existing.tags.push(tag);
        }
    }
    merge_parameters(&mut existing.parameters, incoming.parameters);
    merge_servers(&mut existing.servers, incoming.servers);

    if let Some(body) = incoming.request_body.filter(|b| !b.is_empty()) {
        match existing.request_body.as_mut() {
            Some(current) => merge_request_body(current, body),
            None => existing.request_body = Some(body),
        }
    }

    for (status, response) in incoming.responses {
        match existing.responses.get_mut(&status) {
            Some(current) => merge_response(current, response),
            None => {
                existing.responses.insert(status, response);
            }
        }
    }

    if incoming.deprecated.is_some() {
        existing.deprecated = incoming.deprecated;
    }
    if existing.security.is_none() {
        existing.security = incoming.security;
    }
    merge_extensions(&mut existing.extensions, incoming.extensions);
}

/// A non-empty incoming body wins field by field. Media types of the existing
/// body that the incoming one does not mention are kept, so two bindings on
/// one route keep both encodings.
pub fn merge_request_body(existing: &mut RequestBody, incoming: RequestBody) {
    replace_if_set(&mut existing.reference, incoming.reference);
    replace_if_set(&mut existing.description, incoming.description);
    if incoming.required.is_some() {
        existing.required = incoming.required;
    }
    existing.content.extend(incoming.content);
    merge_extensions(&mut existing.extensions, incoming.extensions);
}

pub fn merge_response(existing: &mut Response, incoming: Response) {
    if !incoming.description.is_empty() {
        existing.description = incoming.description;
    }
    if incoming.reference.is_some() {
        existing.reference = incoming.reference;
    }
    for (name, header) in incoming.headers {
        existing.headers.entry(name).or_insert(header);
    }
    for (media, content) in incoming.content {
        existing.content.entry(media).or_insert(content);
    }
    merge_extensions(&mut existing.extensions, incoming.extensions);
}

/// Parameters are identified by `(name, in)`; a match only fills empty fields.
/// A bare `$ref` with neither is identified by its target.
pub fn merge_parameters(existing: &mut Vec<Parameter>, incoming: Vec<Parameter>) {
    for param in incoming {
        let found = existing.iter_mut().find(|p| same_parameter(p, &param));
        match found {
            Some(current) => merge_parameter(current, param),
            None => existing.push(param),
        }
    }
}

fn same_parameter(a: &Parameter, b: &Parameter) -> bool {
    let bare = |p: &Parameter| p.name.is_empty() && p.location.is_none();
    if bare(a) || bare(b) {
        return bare(a) && bare(b) && a.reference == b.reference;
    }
    a.name == b.name && a.location == b.location
}

pub fn merge_parameter(existing: &mut Parameter, incoming: Parameter) {
    fill(&mut existing.reference, incoming.reference);
    fill(&mut existing.description, incoming.description);
    fill(&mut existing.required, incoming.required);
    fill(&mut existing.deprecated, incoming.deprecated);
    fill(&mut existing.style, incoming.style);
    fill(&mut existing.explode, incoming.explode);
    if let Some(schema) = incoming.schema {
        match existing.schema.as_mut() {
            Some(current) => current.fill_from(&schema),
            None => existing.schema = Some(schema),
        }
    }
    for (media, content) in incoming.content {
        existing.content.entry(media).or_insert(content);
    }
    merge_extensions(&mut existing.extensions, incoming.extensions);
}

/// The first record of a tag name is kept; later ones only backfill.
pub fn merge_tags(existing: &mut Vec<Tag>, incoming: Vec<Tag>) {
    for tag in incoming {
        match existing.iter_mut().find(|t| t.name == tag.name) {
            Some(current) => {
                fill(&mut current.description, tag.description);
                merge_extensions(&mut current.extensions, tag.extensions);
            }
            None => existing.push(tag),
        }
    }
}

pub fn merge_servers(existing: &mut Vec<Server>, incoming: Vec<Server>) {
    for server in incoming {
        if !existing.contains(&server) {
            existing.push(server);
        }
    }
}

pub fn merge_extensions(existing: &mut Extensions, incoming: Extensions) {
    for (key, value) in incoming {
        existing.entry(key).or_insert(value);
    }
}

fn replace_if_set(slot: &mut Option<String>, incoming: Option<String>) {
    if let Some(value) = incoming.filter(|v| !v.is_empty()) {
        *slot = Some(value);
    }
}

/// Backfill `slot` when it is unset or blank. Blank incoming values never land.
fn fill<T: Blank>(slot: &mut Option<T>, incoming: Option<T>) {
    if slot.as_ref().is_some_and(|v| !v.is_blank()) {
        return;
    }
    if let Some(value) = incoming.filter(|v| !v.is_blank()) {
        *slot = Some(value);
    }
}

trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for bool {
    fn is_blank(&self) -> bool {
        false
    }
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Blank for IndexMap<K, V> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

// =============================================================================
// Override, trimming, closure
// =============================================================================

/// The override document wins on components and on any top-level field it sets.
pub fn apply_override(document: &mut Document, overlay: Document) {
    let Document {
        openapi,
        info,
        servers,
        paths,
        components,
        security,
        tags,
        extensions,
    } = overlay;

    if !openapi.is_empty() {
        document.openapi = openapi;
    }
    if !info.title.is_empty() {
        document.info.title = info.title;
    }
    if !info.version.is_empty() {
        document.info.version = info.version;
    }
    replace_if_set(&mut document.info.description, info.description);
    document.info.extensions.extend(info.extensions);

    if !servers.is_empty() {
        document.servers = servers;
    }
    if !security.is_empty() {
        document.security = security;
    }
    if !tags.is_empty() {
        for tag in tags {
            match document.tags.iter_mut().find(|t| t.name == tag.name) {
                Some(current) => *current = tag,
                None => document.tags.push(tag),
            }
        }
    }
    merge_paths(&mut document.paths, paths);

    let target = &mut document.components;
    target.schemas.extend(components.schemas);
    target.responses.extend(components.responses);
    target.parameters.extend(components.parameters);
    target.request_bodies.extend(components.request_bodies);
    target.security_schemes.extend(components.security_schemes);
    target.extensions.extend(components.extensions);

    document.extensions.extend(extensions);
}

/// Remove component schemas not reachable from paths or the other component
/// kinds. Returns how many were removed.
pub fn trim_unused_schemas(document: &mut Document) -> Result<usize> {
    let mut roots = IndexSet::new();
    collect_refs(&to_value(&document.paths)?, &mut roots);
    let components = &document.components;
    collect_refs(&to_value(&components.responses)?, &mut roots);
    collect_refs(&to_value(&components.parameters)?, &mut roots);
    collect_refs(&to_value(&components.request_bodies)?, &mut roots);

    let mut reachable = IndexSet::new();
    let mut queue: Vec<String> = roots.into_iter().collect();
    while let Some(name) = queue.pop() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        if let Some(schema) = document.components.schemas.get(&name) {
            let mut nested = IndexSet::new();
            collect_refs(&to_value(schema)?, &mut nested);
            queue.extend(nested.into_iter().filter(|n| !reachable.contains(n)));
        }
    }

    let before = document.components.schemas.len();
    document
        .components
        .schemas
        .retain(|name, _| reachable.contains(name));
    Ok(before - document.components.schemas.len())
}

/// Every `#/components/schemas/...` reference must have a definition.
pub fn check_closure(document: &Document) -> Result<()> {
    let mut refs = IndexSet::new();
    collect_refs(&to_value(document)?, &mut refs);
    match refs
        .into_iter()
        .find(|name| !document.components.schemas.contains_key(name))
    {
        Some(missing) => Err(Error::DanglingReference(missing)),
        None => Ok(()),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Render(e.to_string()))
}

/// Component names of every schema `$ref` inside `value`.
pub fn collect_refs(value: &Value, out: &mut IndexSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "$ref" {
                    if let Some(name) = child.as_str().and_then(|r| r.strip_prefix(SCHEMA_REF_PREFIX)) {
                        out.insert(name.to_string());
                    }
                } else {
                    collect_refs(child, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_refs(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpVerb, MediaType, ParameterLocation};
    use pretty_assertions::assert_eq;

    fn op(id: &str) -> Operation {
        Operation {
            operation_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn json_response(component: &str) -> Response {
        Response {
            description: "ok".to_string(),
            content: [(
                "application/json".to_string(),
                MediaType {
                    schema: Some(Schema::reference(component)),
                    ..Default::default()
                },
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn path_items_merge_by_verb_slot() {
        let mut paths = IndexMap::new();
        paths.insert("/a".to_string(), PathItem::with_operation(HttpVerb::Post, op("a.post")));

        let mut incoming = IndexMap::new();
        incoming.insert("/a".to_string(), PathItem::with_operation(HttpVerb::Get, op("a.get")));
        incoming.insert("/b".to_string(), PathItem::with_operation(HttpVerb::Post, op("b.post")));
        merge_paths(&mut paths, incoming);

        assert_eq!(paths.keys().collect::<Vec<_>>(), vec!["/a", "/b"]);
        let a = &paths["/a"];
        assert_eq!(a.post.as_ref().unwrap().operation_id.as_deref(), Some("a.post"));
        assert_eq!(a.get.as_ref().unwrap().operation_id.as_deref(), Some("a.get"));
    }

    #[test]
    fn operation_merge_keeps_existing_when_incoming_is_empty() {
        let mut existing = Operation {
            summary: Some("kept".to_string()),
            tags: vec!["t1".to_string()],
            extensions: [("x-a".to_string(), Value::from(1))].into_iter().collect(),
            ..op("id")
        };
        existing.responses.insert("200".to_string(), json_response("A"));

        let mut incoming = Operation {
            summary: Some(String::new()),
            description: Some("added".to_string()),
            tags: vec!["t1".to_string(), "t2".to_string()],
            extensions: [("x-a".to_string(), Value::from(2))].into_iter().collect(),
            ..Default::default()
        };
        let mut proto = json_response("A");
        proto.content.insert("application/proto".to_string(), MediaType::default());
        incoming.responses.insert("200".to_string(), proto);
        incoming.responses.insert("default".to_string(), json_response("E"));

        merge_operation(&mut existing, incoming);
        assert_eq!(existing.summary.as_deref(), Some("kept"));
        assert_eq!(existing.description.as_deref(), Some("added"));
        assert_eq!(existing.operation_id.as_deref(), Some("id"));
        assert_eq!(existing.tags, vec!["t1", "t2"]);
        assert_eq!(existing.extensions["x-a"], Value::from(1));
        assert_eq!(existing.responses["200"].content.len(), 2);
        assert!(existing.responses.contains_key("default"));
    }

    #[test]
    fn parameters_match_on_name_and_location() {
        let mut existing = vec![Parameter::new("id", ParameterLocation::Path, Schema::typed("string"))];
        let incoming = vec![
            Parameter::new("id", ParameterLocation::Path, Schema::typed_with_format("integer", "int32"))
                .describe("the id")
                .required(),
            Parameter::new("id", ParameterLocation::Query, Schema::typed("string")),
        ];
        merge_parameters(&mut existing, incoming);

        assert_eq!(existing.len(), 2);
        let id = &existing[0];
        assert_eq!(id.description.as_deref(), Some("the id"));
        assert_eq!(id.required, Some(true));
        let schema = id.schema.as_ref().unwrap();
        assert!(schema.is_type("string"));
        assert_eq!(schema.format.as_deref(), Some("int32"));
    }

    #[test]
    fn parameter_merge_never_overwrites_a_description() {
        let mut existing = vec![
            Parameter::new("id", ParameterLocation::Path, Schema::typed("string")).describe("the id"),
        ];
        let incoming = vec![Parameter::new(
            "id",
            ParameterLocation::Path,
            Schema::typed_with_format("string", "uuid"),
        )
        .describe("")];
        merge_parameters(&mut existing, incoming);

        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].description.as_deref(), Some("the id"));
        assert_eq!(
            existing[0].schema.as_ref().unwrap().format.as_deref(),
            Some("uuid")
        );
    }

    #[test]
    fn blank_parameter_fields_are_backfilled() {
        let mut existing = vec![Parameter::new("id", ParameterLocation::Path, Schema::typed("string")).describe("")];
        merge_parameters(
            &mut existing,
            vec![Parameter::new("id", ParameterLocation::Path, Schema::typed("string")).describe("new")],
        );
        assert_eq!(existing[0].description.as_deref(), Some("new"));
    }

    #[test]
    fn referenced_and_inline_parameters_merge_by_name_and_location() {
        let mut existing = vec![Parameter {
            reference: Some("#/components/parameters/Id".to_string()),
            name: "id".to_string(),
            location: Some(ParameterLocation::Path),
            ..Default::default()
        }];
        merge_parameters(
            &mut existing,
            vec![Parameter::new("id", ParameterLocation::Path, Schema::typed("string")).required()],
        );
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].reference.as_deref(), Some("#/components/parameters/Id"));
        assert_eq!(existing[0].required, Some(true));

        let bare = |target: &str| Parameter {
            reference: Some(format!("#/components/parameters/{target}")),
            ..Default::default()
        };
        merge_parameters(&mut existing, vec![bare("Page"), bare("Size"), bare("Page")]);
        assert_eq!(existing.len(), 3);
    }

    #[test]
    fn fill_treats_empty_values_as_unset() {
        let mut list: Option<Vec<u8>> = Some(Vec::new());
        fill(&mut list, Some(vec![1]));
        assert_eq!(list, Some(vec![1]));
        fill(&mut list, Some(vec![2]));
        assert_eq!(list, Some(vec![1]));

        let mut text = None;
        fill(&mut text, Some(String::new()));
        assert_eq!(text, None);
    }

    #[test]
    fn first_tag_wins_later_ones_backfill() {
        let mut tags = vec![Tag {
            name: "svc".to_string(),
            ..Default::default()
        }];
        merge_tags(
            &mut tags,
            vec![
                Tag {
                    name: "svc".to_string(),
                    description: Some("from later".to_string()),
                    ..Default::default()
                },
                Tag {
                    name: "svc".to_string(),
                    description: Some("ignored".to_string()),
                    ..Default::default()
                },
            ],
        );
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].description.as_deref(), Some("from later"));
    }

    #[test]
    fn override_wins_on_components_and_set_fields() {
        let mut assembler = Assembler::new(None);
        assembler.add_schemas([("A".to_string(), Schema::typed("object"))].into_iter().collect());
        assembler.default_info("Generated", "v1");

        let mut overlay = Document::default();
        overlay.info.title = "Custom".to_string();
        overlay
            .components
            .schemas
            .insert("A".to_string(), Schema::typed("string"));
        let document = assembler.finish(Some(&overlay), false).unwrap();

        assert_eq!(document.info.title, "Custom");
        assert_eq!(document.info.version, "v1");
        assert!(document.components.schemas["A"].is_type("string"));
    }

    #[test]
    fn trimming_keeps_transitively_referenced_schemas() {
        let mut assembler = Assembler::new(None);
        assembler.add_schemas(
            [
                ("Used".to_string(), Schema {
                    properties: [("inner".to_string(), Schema::reference("Inner"))].into_iter().collect(),
                    ..Schema::typed("object")
                }),
                ("Inner".to_string(), Schema::typed("object")),
                ("Orphan".to_string(), Schema::typed("object")),
            ]
            .into_iter()
            .collect(),
        );
        let mut operation = op("x");
        operation.responses.insert("200".to_string(), json_response("Used"));
        assembler.add_paths(
            [("/x".to_string(), PathItem::with_operation(HttpVerb::Post, operation))]
                .into_iter()
                .collect(),
        );
        let document = assembler.finish(None, true).unwrap();
        let names: Vec<&str> = document.components.schemas.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Used", "Inner"]);
    }

    #[test]
    fn dangling_references_are_fatal() {
        let mut assembler = Assembler::new(None);
        assembler.add_schemas(
            [("A".to_string(), Schema::array(Schema::reference("Missing")))]
                .into_iter()
                .collect(),
        );
        assert!(matches!(
            assembler.finish(None, false),
            Err(Error::DanglingReference(name)) if name == "Missing"
        ));
    }
}
