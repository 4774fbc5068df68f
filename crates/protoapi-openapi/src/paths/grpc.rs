use super::{media_types, procedure_route, Binding, ErrorSchema, RouteContext, Routes};
use crate::error::Result;
use crate::model::{HttpVerb, Parameter, ParameterLocation, PathItem, Schema};
use protoapi_descriptor::{MethodRef, ServiceRef};

/// gRPC over HTTP/2: `POST /pkg.Service/Method` with `application/grpc+<codec>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcBinding;

impl Binding for GrpcBinding {
    fn name(&self) -> &'static str {
        "grpc"
    }

    fn build_routes(
        &self,
        cx: &mut RouteContext<'_, '_>,
        service: &ServiceRef<'_>,
        method: &MethodRef<'_>,
    ) -> Result<Routes> {
        let mut routes = Routes::new();
        if method.is_streaming() && !cx.options.with_streaming {
            return Ok(routes);
        }

        let media = media_types(cx.options, |c| format!("application/grpc+{}", c.name()));
        let mut operation = cx.operation(service, method, None);
        operation.parameters = vec![timeout_header()];
        operation.request_body = cx.request_body(method, &media)?;
        let output = cx.message_ref(method, false)?;
        operation.responses = cx.responses(output, &media, ErrorSchema::Connect);
        cx.annotate(method, &mut operation);

        routes.insert(
            procedure_route(cx.options, service, method),
            PathItem::with_operation(HttpVerb::Post, operation),
        );
        Ok(routes)
    }
}

fn timeout_header() -> Parameter {
    Parameter::new(
        "grpc-timeout",
        ParameterLocation::Header,
        Schema {
            pattern: Some("^[0-9]{1,8}[HMSmun]$".to_string()),
            ..Schema::typed("string")
        },
    )
    .describe("Deadline of the call, as an amount and a unit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::AnnotatorChain;
    use crate::options::{Codec, Options};
    use crate::schema::SchemaBuilder;
    use pretty_assertions::assert_eq;
    use protoapi_descriptor::DescriptorPool;
    use serde_json::json;

    #[test]
    fn grpc_media_types_and_timeout_header() {
        let pool = DescriptorPool::from_descriptor_set_json(
            &json!({ "file": [{
                "name": "g.proto", "package": "p",
                "messageType": [ { "name": "M" } ],
                "service": [{ "name": "S", "method": [
                    { "name": "Call", "inputType": ".p.M", "outputType": ".google.protobuf.Empty" }
                ] }]
            }] })
            .to_string(),
        )
        .unwrap();
        let options = Options {
            content_types: vec![Codec::Proto],
            ..Options::default()
        };
        let chain = AnnotatorChain::new();
        let mut schemas = SchemaBuilder::new(&options, &chain, &pool);
        let mut cx = RouteContext::new(&mut schemas);
        let file = pool.file("g.proto").unwrap();
        let service = file.services().remove(0);
        let method = service.methods().remove(0);

        let routes = GrpcBinding.build_routes(&mut cx, &service, &method).unwrap();
        let op = routes["/p.S/Call"].post.as_ref().unwrap();
        assert_eq!(op.parameters[0].name, "grpc-timeout");
        assert_eq!(
            op.request_body.as_ref().unwrap().content.keys().collect::<Vec<_>>(),
            vec!["application/grpc+proto"]
        );
        // Empty output: a 200 without content.
        assert!(op.responses["200"].content.is_empty());
    }
}
