//! Connect protocol routes: `POST /pkg.Service/Method`, plus `GET` for
//! side-effect-free unary methods when enabled.

use super::{enum_schema, media_types, procedure_route, Binding, ErrorSchema, RouteContext, Routes};
use crate::error::Result;
use crate::model::{HttpVerb, MediaType, Parameter, ParameterLocation, PathItem, Schema};
use crate::options::Codec;
use protoapi_descriptor::{MethodRef, ServiceRef};
use serde_json::json;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectBinding;

impl Binding for ConnectBinding {
    fn name(&self) -> &'static str {
        "connect"
    }

    fn build_routes(
        &self,
        cx: &mut RouteContext<'_, '_>,
        service: &ServiceRef<'_>,
        method: &MethodRef<'_>,
    ) -> Result<Routes> {
        let mut routes = Routes::new();
        let streaming = method.is_streaming();
        if streaming && !cx.options.with_streaming {
            tracing::debug!(method = %method.full_name(), "skipping streaming method");
            return Ok(routes);
        }

        let media = if streaming {
            media_types(cx.options, |c| format!("application/connect+{}", c.name()))
        } else {
            media_types(cx.options, unary_media)
        };

        let mut post = cx.operation(service, method, None);
        if !streaming {
            post.parameters = vec![protocol_version_header(), timeout_header()];
        }
        post.request_body = cx.request_body(method, &media)?;
        let output = cx.message_ref(method, false)?;
        post.responses = cx.responses(output.clone(), &media, ErrorSchema::Connect);
        cx.annotate(method, &mut post);

        let mut item = PathItem::with_operation(HttpVerb::Post, post);

        if !streaming && cx.options.allow_get && method.is_side_effect_free() {
            let mut get = cx.operation(service, method, Some("get"));
            let input = cx
                .message_ref(method, true)?
                .unwrap_or_else(|| Schema::typed("object"));
            get.parameters = get_query_parameters(input);
            get.responses = cx.responses(output, &media, ErrorSchema::Connect);
            cx.annotate(method, &mut get);
            item.get = Some(get);
        }

        routes.insert(procedure_route(cx.options, service, method), item);
        Ok(routes)
    }
}

fn unary_media(codec: Codec) -> String {
    format!("application/{}", codec.name())
}

fn protocol_version_header() -> Parameter {
    Parameter::new(
        "Connect-Protocol-Version",
        ParameterLocation::Header,
        enum_schema("integer", json!([1])),
    )
    .describe("Define the version of the Connect protocol")
    .required()
}

fn timeout_header() -> Parameter {
    Parameter::new(
        "Connect-Timeout-Ms",
        ParameterLocation::Header,
        Schema::typed("integer"),
    )
    .describe("Define the timeout, in ms")
}

/// Query parameters of a Connect unary GET request.
fn get_query_parameters(input: Schema) -> Vec<Parameter> {
    let message = Parameter {
        name: "message".to_string(),
        location: Some(ParameterLocation::Query),
        required: Some(true),
        content: [(
            "application/json".to_string(),
            MediaType {
                schema: Some(input),
                ..Default::default()
            },
        )]
        .into_iter()
        .collect(),
        ..Default::default()
    };
    vec![
        message,
        Parameter::new(
            "encoding",
            ParameterLocation::Query,
            enum_schema("string", json!(["proto", "json"])),
        )
        .describe("Define which encoding or 'Message-Codec' to use")
        .required(),
        Parameter::new("base64", ParameterLocation::Query, Schema::typed("boolean"))
            .describe("Specifies if the message query param is base64 encoded, which may be required for binary data"),
        Parameter::new(
            "compression",
            ParameterLocation::Query,
            enum_schema("string", json!(["identity", "gzip", "br"])),
        )
        .describe("Which compression algorithm to use for this request"),
        Parameter::new(
            "connect",
            ParameterLocation::Query,
            enum_schema("string", json!(["v1"])),
        )
        .describe("Define the version of the Connect protocol"),
    ]
}
