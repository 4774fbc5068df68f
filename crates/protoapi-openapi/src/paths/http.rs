//! `google.api.http` transcoding routes.

use super::{content, media_types, Binding, ErrorSchema, RouteContext, Routes};
use crate::document::merge_path_item;
use crate::error::Result;
use crate::model::{HttpVerb, Parameter, ParameterLocation, PathItem, RequestBody};
use crate::options::Codec;
use crate::template::{render_route, tokenize, variables};
use protoapi_descriptor::{extension, FieldRef, FieldType, MessageRef, MethodRef, ServiceRef};
use serde_json::Value;

const HTTP_RULE: &str = "google.api.http";

/// The method's `(google.api.http)` rule, if any.
fn http_rule<'a>(method: &MethodRef<'a>) -> Option<&'a Value> {
    extension(method.options(), HTTP_RULE)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleHttpBinding;

impl Binding for GoogleHttpBinding {
    fn name(&self) -> &'static str {
        "google-http"
    }

    fn build_routes(
        &self,
        cx: &mut RouteContext<'_, '_>,
        service: &ServiceRef<'_>,
        method: &MethodRef<'_>,
    ) -> Result<Routes> {
        let mut routes = Routes::new();
        let Some(rule) = http_rule(method) else {
            return Ok(routes);
        };
        if method.is_streaming() && !cx.options.with_streaming {
            tracing::debug!(method = %method.full_name(), "skipping streaming method");
            return Ok(routes);
        }

        build_rule(cx, service, method, rule, None, &mut routes)?;
        let additional = rule
            .get("additionalBindings")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for (n, binding) in additional.enumerate() {
            build_rule(cx, service, method, binding, Some(n + 1), &mut routes)?;
        }
        Ok(routes)
    }
}

/// Build one `HttpRule` into `routes`. Malformed rules are logged and skipped.
fn build_rule(
    cx: &mut RouteContext<'_, '_>,
    service: &ServiceRef<'_>,
    method: &MethodRef<'_>,
    rule: &Value,
    binding_index: Option<usize>,
    routes: &mut Routes,
) -> Result<()> {
    let Some((verb, template)) = pattern(rule) else {
        tracing::warn!(method = %method.full_name(), "http rule has no usable pattern; skipped");
        return Ok(());
    };
    let tokens = match tokenize(&template) {
        Ok(tokens) => tokens,
        Err(err) => {
            tracing::warn!(
                method = %method.full_name(),
                template = %template,
                error = %err,
                "invalid path template; skipped"
            );
            return Ok(());
        }
    };

    let media = media_types(cx.options, http_media);
    // The Connect route already owns the plain id.
    let suffix = cx.options.bindings.connect.then_some("http");
    let mut operation = cx.operation(service, method, suffix);
    if let (Some(n), Some(id)) = (binding_index, operation.operation_id.as_mut()) {
        id.push_str(&format!("_{n}"));
    }

    // Path parameters.
    let input = if method.input_type().starts_with("google.protobuf.") {
        None
    } else {
        Some(method.input()?)
    };
    let bound = variables(&tokens);
    for path in &bound {
        let Some(field) = input.as_ref().and_then(|m| resolve_path(m, path)) else {
            tracing::debug!(method = %method.full_name(), field_path = path, "path variable does not name an input field");
            continue;
        };
        let mut schema = cx.schemas.field_schema(&field)?;
        let description = schema.description.take();
        operation.parameters.push(Parameter {
            name: path.to_string(),
            location: Some(ParameterLocation::Path),
            required: Some(true),
            description,
            schema: Some(schema),
            ..Default::default()
        });
    }

    // Body, or query parameters for everything not bound by the path.
    match rule.get("body").and_then(Value::as_str).unwrap_or_default() {
        "" => {
            if let Some(message) = &input {
                let roots: Vec<&str> = bound
                    .iter()
                    .map(|p| p.split('.').next().unwrap_or_default())
                    .collect();
                for field in message.fields() {
                    if roots.contains(&field.name()) {
                        continue;
                    }
                    operation.parameters.push(query_parameter(cx, &field)?);
                }
            }
        }
        "*" => operation.request_body = cx.request_body(method, &media)?,
        name => match input.as_ref().and_then(|m| m.field_by_name(name)) {
            Some(field) => {
                let schema = cx.schemas.field_schema(&field)?;
                operation.request_body = Some(RequestBody {
                    content: content(&media, &schema),
                    required: Some(true),
                    ..Default::default()
                });
            }
            None => tracing::warn!(
                method = %method.full_name(),
                body = name,
                "http rule body does not name an input field; request body omitted"
            ),
        },
    }

    // Response, optionally narrowed to one output field.
    let response_field = rule
        .get("responseBody")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let success = match response_field {
        Some(name) => {
            let output = method.output()?;
            match output.field_by_name(name) {
                Some(field) => Some(cx.schemas.field_schema(&field)?),
                None => {
                    tracing::warn!(
                        method = %method.full_name(),
                        response_body = name,
                        "http rule responseBody does not name an output field; using the whole output"
                    );
                    cx.message_ref(method, false)?
                }
            }
        }
        None => cx.message_ref(method, false)?,
    };
    operation.responses = cx.responses(success, &media, ErrorSchema::Connect);
    cx.annotate(method, &mut operation);

    let route = cx.options.route(&render_route(&tokens));
    let item = PathItem::with_operation(verb, operation);
    match routes.get_mut(&route) {
        Some(existing) => merge_path_item(existing, item),
        None => {
            routes.insert(route, item);
        }
    }
    Ok(())
}

fn http_media(codec: Codec) -> String {
    match codec {
        Codec::Json => "application/json".to_string(),
        Codec::Proto => "application/proto".to_string(),
    }
}

/// `(verb, template)` of an `HttpRule`; `None` when blank or unknown.
fn pattern(rule: &Value) -> Option<(HttpVerb, String)> {
    for key in ["get", "put", "post", "delete", "patch"] {
        if let Some(template) = rule.get(key).and_then(Value::as_str) {
            let verb = HttpVerb::parse(key)?;
            return non_blank(template).map(|t| (verb, t));
        }
    }
    let custom = rule.get("custom")?;
    let kind = custom.get("kind").and_then(Value::as_str)?;
    let verb = HttpVerb::parse(kind.trim())?;
    let template = custom.get("path").and_then(Value::as_str)?;
    non_blank(template).map(|t| (verb, t))
}

fn non_blank(template: &str) -> Option<String> {
    let t = template.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Walk a dotted field path (`book.name`) through nested input messages.
fn resolve_path<'a>(message: &MessageRef<'a>, path: &str) -> Option<FieldRef<'a>> {
    let mut segments = path.split('.');
    let mut field = message.field_by_name(segments.next()?)?;
    for segment in segments {
        if field.kind() != FieldType::Message || field.is_repeated() {
            return None;
        }
        let next = field.resolve_message().ok()?;
        field = next.field_by_name(segment)?;
    }
    Some(field)
}

fn query_parameter(cx: &mut RouteContext<'_, '_>, field: &FieldRef<'_>) -> Result<Parameter> {
    let mut schema = cx.schemas.field_schema(field)?;
    let description = schema.description.take();
    let nested = field.map_entry()?.is_some()
        || (field.kind() == FieldType::Message
            && !field.is_repeated()
            && !field
                .type_name()
                .is_some_and(|t| t.starts_with("google.protobuf.")));
    Ok(Parameter {
        name: cx.options.property_name(field),
        location: Some(ParameterLocation::Query),
        description,
        deprecated: field.is_deprecated().then_some(true),
        style: nested.then(|| "deepObject".to_string()),
        schema: Some(schema),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::AnnotatorChain;
    use crate::model::Schema;
    use crate::options::Options;
    use crate::schema::SchemaBuilder;
    use pretty_assertions::assert_eq;
    use protoapi_descriptor::DescriptorPool;
    use serde_json::json;

    fn pool(rule: Value) -> DescriptorPool {
        DescriptorPool::from_descriptor_set_json(
            &json!({ "file": [{
                "name": "h.proto",
                "package": "lib.v1",
                "messageType": [
                    { "name": "Book", "field": [
                        { "name": "title", "number": 1, "type": "TYPE_STRING", "jsonName": "title" }
                    ] },
                    { "name": "Shelf", "field": [
                        { "name": "id", "number": 1, "type": "TYPE_STRING", "jsonName": "id" }
                    ] },
                    { "name": "UpdateBookRequest", "field": [
                        { "name": "book_id", "number": 1, "type": "TYPE_STRING", "jsonName": "bookId" },
                        { "name": "shelf", "number": 2, "type": "TYPE_MESSAGE", "typeName": ".lib.v1.Shelf", "jsonName": "shelf" },
                        { "name": "book", "number": 3, "type": "TYPE_MESSAGE", "typeName": ".lib.v1.Book", "jsonName": "book" },
                        { "name": "page_size", "number": 4, "type": "TYPE_INT32", "jsonName": "pageSize" }
                    ] }
                ],
                "service": [{ "name": "Library", "method": [
                    { "name": "UpdateBook", "inputType": ".lib.v1.UpdateBookRequest", "outputType": ".lib.v1.Book",
                      "options": { "[google.api.http]": rule } },
                    { "name": "Plain", "inputType": ".lib.v1.Book", "outputType": ".lib.v1.Book" }
                ] }]
            }] })
            .to_string(),
        )
        .unwrap()
    }

    fn routes(rule: Value, method_index: usize) -> Routes {
        routes_with(&Options::default(), rule, method_index)
    }

    fn routes_with(options: &Options, rule: Value, method_index: usize) -> Routes {
        let pool = pool(rule);
        let chain = AnnotatorChain::new();
        let mut schemas = SchemaBuilder::new(options, &chain, &pool);
        let mut cx = RouteContext::new(&mut schemas);
        let file = pool.file("h.proto").unwrap();
        let service = file.services().remove(0);
        let method = service.methods().remove(method_index);
        GoogleHttpBinding.build_routes(&mut cx, &service, &method).unwrap()
    }

    #[test]
    fn path_variables_and_field_body() {
        let routes = routes(
            json!({ "patch": "/v1/shelves/{shelf.id}/books/{book_id}", "body": "book" }),
            0,
        );
        let op = routes["/v1/shelves/{shelf.id}/books/{book_id}"].patch.as_ref().unwrap();
        let params: Vec<(&str, Option<ParameterLocation>)> =
            op.parameters.iter().map(|p| (p.name.as_str(), p.location)).collect();
        assert_eq!(
            params,
            vec![
                ("shelf.id", Some(ParameterLocation::Path)),
                ("book_id", Some(ParameterLocation::Path)),
            ]
        );
        assert_eq!(
            op.request_body.as_ref().unwrap().content["application/json"].schema,
            Some(Schema::reference("lib.v1.Book"))
        );
    }

    #[test]
    fn empty_body_turns_remaining_fields_into_query_parameters() {
        let routes = routes(json!({ "get": "/v1/books/{book_id}" }), 0);
        let op = routes["/v1/books/{book_id}"].get.as_ref().unwrap();
        let query: Vec<(&str, Option<&str>)> = op
            .parameters
            .iter()
            .filter(|p| p.location == Some(ParameterLocation::Query))
            .map(|p| (p.name.as_str(), p.style.as_deref()))
            .collect();
        assert_eq!(
            query,
            vec![("shelf", Some("deepObject")), ("book", Some("deepObject")), ("pageSize", None)]
        );
        assert!(op.request_body.is_none());
    }

    #[test]
    fn additional_bindings_get_numbered_ids() {
        let rule = json!({
            "post": "/v1/books:update", "body": "*",
            "additionalBindings": [ { "put": "/v1/books/{book_id}", "body": "*" } ]
        });
        let mut options = Options::default();
        options.bindings.connect = false;
        let routes = routes_with(&options, rule, 0);
        assert_eq!(routes.len(), 2);
        let extra = routes["/v1/books/{book_id}"].put.as_ref().unwrap();
        assert_eq!(extra.operation_id.as_deref(), Some("lib.v1.Library.UpdateBook_1"));
        let primary = routes["/v1/books:update"].post.as_ref().unwrap();
        assert_eq!(primary.operation_id.as_deref(), Some("lib.v1.Library.UpdateBook"));
    }

    #[test]
    fn ids_step_aside_for_the_connect_route() {
        let routes = routes(
            json!({
                "post": "/v1/books:update", "body": "*",
                "additionalBindings": [ { "put": "/v1/books/{book_id}", "body": "*" } ]
            }),
            0,
        );
        let primary = routes["/v1/books:update"].post.as_ref().unwrap();
        assert_eq!(primary.operation_id.as_deref(), Some("lib.v1.Library.UpdateBook.http"));
        let extra = routes["/v1/books/{book_id}"].put.as_ref().unwrap();
        assert_eq!(extra.operation_id.as_deref(), Some("lib.v1.Library.UpdateBook.http_1"));
    }

    #[test]
    fn custom_verbs_and_response_body() {
        let routes = routes(
            json!({ "custom": { "kind": "HEAD", "path": "/v1/books" }, "responseBody": "title" }),
            0,
        );
        let op = routes["/v1/books"].head.as_ref().unwrap();
        assert_eq!(
            op.responses["200"].content["application/json"].schema,
            Some(Schema::typed("string"))
        );
    }

    #[test]
    fn malformed_rules_are_skipped() {
        assert!(routes(json!({ "get": "  " }), 0).is_empty());
        assert!(routes(json!({ "get": "v1/no-slash" }), 0).is_empty());
        assert!(routes(json!({ "custom": { "kind": "BREW", "path": "/v1/pot" } }), 0).is_empty());
    }

    #[test]
    fn no_annotation_means_no_routes() {
        assert!(routes(json!({ "get": "/v1/x" }), 1).is_empty());
    }
}
