//! RPC methods → `route → PathItem` maps, one builder per binding convention.

mod connect;
mod grpc;
mod http;
mod twirp;

pub use connect::ConnectBinding;
pub use grpc::GrpcBinding;
pub use http::GoogleHttpBinding;
pub use twirp::TwirpBinding;

use crate::annotate::AnnotateContext;
use crate::error::Result;
use crate::model::{MediaType, Operation, PathItem, RequestBody, Response, Schema};
use crate::options::{Codec, Options};
use crate::schema::{well_known, SchemaBuilder};
use indexmap::IndexMap;
use protoapi_descriptor::{MethodRef, ServiceRef};
use serde_json::Value;

pub type Routes = IndexMap<String, PathItem>;

pub trait Binding {
    fn name(&self) -> &'static str;

    fn build_routes(
        &self,
        cx: &mut RouteContext<'_, '_>,
        service: &ServiceRef<'_>,
        method: &MethodRef<'_>,
    ) -> Result<Routes>;
}

/// Every enabled binding, in the order their routes are merged.
pub fn enabled_bindings(options: &Options) -> Vec<Box<dyn Binding>> {
    let mut bindings: Vec<Box<dyn Binding>> = Vec::new();
    if options.bindings.connect {
        bindings.push(Box::new(ConnectBinding));
    }
    if options.bindings.google_http {
        bindings.push(Box::new(GoogleHttpBinding));
    }
    if options.bindings.grpc {
        bindings.push(Box::new(GrpcBinding));
    }
    if options.bindings.twirp {
        bindings.push(Box::new(TwirpBinding));
    }
    bindings
}

pub struct RouteContext<'s, 'a> {
    pub options: &'a Options,
    pub schemas: &'s mut SchemaBuilder<'a>,
}

impl<'s, 'a> RouteContext<'s, 'a> {
    pub fn new(schemas: &'s mut SchemaBuilder<'a>) -> Self {
        Self {
            options: schemas.options(),
            schemas,
        }
    }

    /// Skeleton operation: tag, ids, docs. `suffix` distinguishes variants
    /// of the same method (`get`, `twirp`).
    pub(crate) fn operation(
        &self,
        service: &ServiceRef<'_>,
        method: &MethodRef<'_>,
        suffix: Option<&str>,
    ) -> Operation {
        Operation {
            tags: vec![tag_name(self.options, service)],
            summary: Some(method.name().to_string()),
            description: method.comment().map(str::to_string),
            operation_id: Some(operation_id(self.options, service, method, suffix)),
            deprecated: method.is_deprecated().then_some(true),
            ..Default::default()
        }
    }

    /// Run the operation annotators once the operation is complete.
    pub(crate) fn annotate(&self, method: &MethodRef<'_>, operation: &mut Operation) {
        let cx = AnnotateContext {
            options: self.options,
        };
        self.schemas.annotators().operation(&cx, method, operation);
    }

    /// `$ref` to a method's input or output message; `None` for `Empty`.
    ///
    /// Fails when the message is neither well known nor in the descriptor set.
    pub(crate) fn message_ref(&mut self, method: &MethodRef<'_>, input: bool) -> Result<Option<Schema>> {
        let type_name = if input {
            method.input_type()
        } else {
            method.output_type()
        };
        if !well_known::is_empty(type_name) && well_known::schema(type_name).is_none() {
            if input {
                method.input()?;
            } else {
                method.output()?;
            }
        }
        Ok(self.schemas.reference_message(type_name))
    }

    pub(crate) fn request_body(&mut self, method: &MethodRef<'_>, media: &[String]) -> Result<Option<RequestBody>> {
        Ok(self.message_ref(method, true)?.map(|schema| RequestBody {
            content: content(media, &schema),
            required: Some(true),
            ..Default::default()
        }))
    }

    /// `200` with `success` (unless disabled) plus the `default` error response.
    pub(crate) fn responses(
        &mut self,
        success: Option<Schema>,
        media: &[String],
        error: ErrorSchema,
    ) -> IndexMap<String, Response> {
        let mut responses = IndexMap::new();
        if !self.options.disable_default_response {
            responses.insert(
                "200".to_string(),
                Response {
                    description: "Success".to_string(),
                    content: success
                        .map(|schema| content(media, &schema))
                        .unwrap_or_default(),
                    ..Default::default()
                },
            );
        }
        let error_ref = error.define(self.schemas);
        responses.insert(
            "default".to_string(),
            Response {
                description: "Error".to_string(),
                content: content(&["application/json".to_string()], &error_ref),
                ..Default::default()
            },
        );
        responses
    }
}

pub(crate) fn tag_name(options: &Options, service: &ServiceRef<'_>) -> String {
    if options.short_service_tags {
        service.name().to_string()
    } else {
        service.full_name().to_string()
    }
}

/// `pkg.Service.Method[.suffix]`, or `Service_Method[_suffix]` when short.
pub(crate) fn operation_id(
    options: &Options,
    service: &ServiceRef<'_>,
    method: &MethodRef<'_>,
    suffix: Option<&str>,
) -> String {
    let (base, sep) = if options.short_operation_ids {
        (format!("{}_{}", service.name(), method.name()), '_')
    } else {
        (method.full_name(), '.')
    };
    match suffix {
        Some(s) => format!("{base}{sep}{s}"),
        None => base,
    }
}

/// Connect/gRPC route: `/pkg.Service/Method`.
pub(crate) fn procedure_route(options: &Options, service: &ServiceRef<'_>, method: &MethodRef<'_>) -> String {
    options.route(&format!("/{}/{}", service.full_name(), method.name()))
}

/// One media entry per name, all pointing at the same schema.
pub(crate) fn content(media: &[String], schema: &Schema) -> IndexMap<String, MediaType> {
    media
        .iter()
        .map(|m| {
            (
                m.clone(),
                MediaType {
                    schema: Some(schema.clone()),
                    ..Default::default()
                },
            )
        })
        .collect()
}

pub(crate) fn media_types(options: &Options, name: impl Fn(Codec) -> String) -> Vec<String> {
    options.content_types.iter().map(|&c| name(c)).collect()
}

// =============================================================================
// Error payloads
// =============================================================================

pub const CONNECT_ERROR: &str = "connect.error";
pub const TWIRP_ERROR: &str = "twirp.Error";

const CONNECT_CODES: &[&str] = &[
    "canceled",
    "unknown",
    "invalid_argument",
    "deadline_exceeded",
    "not_found",
    "already_exists",
    "permission_denied",
    "resource_exhausted",
    "failed_precondition",
    "aborted",
    "out_of_range",
    "unimplemented",
    "internal",
    "unavailable",
    "data_loss",
    "unauthenticated",
];

const TWIRP_CODES: &[&str] = &[
    "canceled",
    "unknown",
    "invalid_argument",
    "malformed",
    "deadline_exceeded",
    "not_found",
    "bad_route",
    "already_exists",
    "permission_denied",
    "unauthenticated",
    "resource_exhausted",
    "failed_precondition",
    "aborted",
    "out_of_range",
    "unimplemented",
    "internal",
    "unavailable",
    "dataloss",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorSchema {
    Connect,
    Twirp,
}

impl ErrorSchema {
    fn define(self, schemas: &mut SchemaBuilder<'_>) -> Schema {
        match self {
            Self::Connect => schemas.define(CONNECT_ERROR, connect_error),
            Self::Twirp => schemas.define(TWIRP_ERROR, twirp_error),
        }
    }
}

fn string_enum(values: &[&str]) -> Schema {
    Schema {
        enum_values: values.iter().map(|v| Value::from(*v)).collect(),
        ..Schema::typed("string")
    }
}

fn connect_error() -> Schema {
    let detail = Schema {
        properties: [
            ("type".to_string(), Schema::typed("string")),
            ("value".to_string(), Schema::typed_with_format("string", "byte")),
            ("debug".to_string(), Schema::typed("object")),
        ]
        .into_iter()
        .collect(),
        ..Schema::typed("object")
    };
    Schema {
        title: Some("Connect Error".to_string()),
        description: Some(
            "Error returned by Connect handlers, see https://connectrpc.com/docs/protocol/#error-end-stream"
                .to_string(),
        ),
        properties: [
            ("code".to_string(), string_enum(CONNECT_CODES)),
            ("message".to_string(), Schema::typed("string")),
            ("details".to_string(), Schema::array(detail)),
        ]
        .into_iter()
        .collect(),
        additional_properties: Some(crate::model::AdditionalProperties::Allowed(true)),
        ..Schema::typed("object")
    }
}

fn twirp_error() -> Schema {
    Schema {
        title: Some("Twirp Error".to_string()),
        properties: [
            ("code".to_string(), string_enum(TWIRP_CODES)),
            ("msg".to_string(), Schema::typed("string")),
            ("meta".to_string(), Schema::map(Schema::typed("string"))),
        ]
        .into_iter()
        .collect(),
        required: vec!["code".to_string(), "msg".to_string()],
        additional_properties: Some(crate::model::AdditionalProperties::Allowed(false)),
        ..Schema::typed("object")
    }
}

/// Inline header/query schema with a fixed value set.
pub(crate) fn enum_schema(kind: &str, values: Value) -> Schema {
    Schema {
        enum_values: values.as_array().cloned().unwrap_or_default(),
        ..Schema::typed(kind)
    }
}
