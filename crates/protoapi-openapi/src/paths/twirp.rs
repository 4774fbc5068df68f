use super::{media_types, Binding, ErrorSchema, RouteContext, Routes};
use crate::error::Result;
use crate::model::{HttpVerb, PathItem};
use crate::options::Codec;
use protoapi_descriptor::{MethodRef, ServiceRef};

/// Twirp: `POST /twirp/pkg.Service/Method`. Twirp has no streaming.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwirpBinding;

impl Binding for TwirpBinding {
    fn name(&self) -> &'static str {
        "twirp"
    }

    fn build_routes(
        &self,
        cx: &mut RouteContext<'_, '_>,
        service: &ServiceRef<'_>,
        method: &MethodRef<'_>,
    ) -> Result<Routes> {
        let mut routes = Routes::new();
        if method.is_streaming() {
            return Ok(routes);
        }

        let media = media_types(cx.options, |c| match c {
            Codec::Json => "application/json".to_string(),
            Codec::Proto => "application/protobuf".to_string(),
        });
        let mut operation = cx.operation(service, method, Some("twirp"));
        operation.request_body = cx.request_body(method, &media)?;
        let output = cx.message_ref(method, false)?;
        operation.responses = cx.responses(output, &media, ErrorSchema::Twirp);
        cx.annotate(method, &mut operation);

        let route = cx
            .options
            .route(&format!("/twirp/{}/{}", service.full_name(), method.name()));
        routes.insert(route, PathItem::with_operation(HttpVerb::Post, operation));
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::AnnotatorChain;
    use crate::model::Schema;
    use crate::options::Options;
    use crate::paths::TWIRP_ERROR;
    use crate::schema::SchemaBuilder;
    use pretty_assertions::assert_eq;
    use protoapi_descriptor::DescriptorPool;
    use serde_json::json;

    #[test]
    fn twirp_route_and_closed_error_schema() {
        let pool = DescriptorPool::from_descriptor_set_json(
            &json!({ "file": [{
                "name": "t.proto", "package": "haberdasher",
                "messageType": [ { "name": "Size" }, { "name": "Hat" } ],
                "service": [{ "name": "Haberdasher", "method": [
                    { "name": "MakeHat", "inputType": ".haberdasher.Size", "outputType": ".haberdasher.Hat" },
                    { "name": "Stream", "inputType": ".haberdasher.Size", "outputType": ".haberdasher.Hat",
                      "clientStreaming": true }
                ] }]
            }] })
            .to_string(),
        )
        .unwrap();
        let options = Options {
            with_streaming: true,
            ..Options::default()
        };
        let chain = AnnotatorChain::new();
        let mut schemas = SchemaBuilder::new(&options, &chain, &pool);
        let file = pool.file("t.proto").unwrap();
        let service = file.services().remove(0);
        let methods = service.methods();

        let mut cx = RouteContext::new(&mut schemas);
        let routes = TwirpBinding.build_routes(&mut cx, &service, &methods[0]).unwrap();
        assert!(TwirpBinding.build_routes(&mut cx, &service, &methods[1]).unwrap().is_empty());

        let op = routes["/twirp/haberdasher.Haberdasher/MakeHat"].post.as_ref().unwrap();
        assert_eq!(op.operation_id.as_deref(), Some("haberdasher.Haberdasher.MakeHat.twirp"));
        assert_eq!(
            op.responses["default"].content["application/json"].schema,
            Some(Schema::reference(TWIRP_ERROR))
        );

        let error = serde_json::to_value(&schemas.schemas()[TWIRP_ERROR]).unwrap();
        assert_eq!(error["additionalProperties"], json!(false));
        assert_eq!(error["properties"]["msg"], json!({ "type": "string" }));
        assert!(error["properties"]["code"]["enum"]
            .as_array()
            .unwrap()
            .contains(&json!("bad_route")));
    }
}
