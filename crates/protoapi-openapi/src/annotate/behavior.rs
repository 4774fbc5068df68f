use super::{AnnotateContext, Annotator};
use crate::model::Schema;
use protoapi_descriptor::{extension, FieldRef};
use serde_json::Value;

const FIELD_BEHAVIOR: &str = "google.api.field_behavior";

/// `google.api.field_behavior` markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldBehaviorAnnotator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Required,
    OutputOnly,
    InputOnly,
    Other,
}

impl Behavior {
    /// protojson may render enum values by name or by number.
    fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => match s.as_str() {
                "REQUIRED" => Self::Required,
                "OUTPUT_ONLY" => Self::OutputOnly,
                "INPUT_ONLY" => Self::InputOnly,
                _ => Self::Other,
            },
            Value::Number(n) => match n.as_i64() {
                Some(2) => Self::Required,
                Some(3) => Self::OutputOnly,
                Some(4) => Self::InputOnly,
                _ => Self::Other,
            },
            _ => Self::Other,
        }
    }
}

impl Annotator for FieldBehaviorAnnotator {
    fn field(
        &self,
        cx: &AnnotateContext<'_>,
        field: &FieldRef<'_>,
        schema: &mut Schema,
        parent: &mut Schema,
    ) {
        let Some(Value::Array(values)) = extension(field.options(), FIELD_BEHAVIOR) else {
            return;
        };
        for behavior in values.iter().map(Behavior::from_value) {
            match behavior {
                Behavior::Required => parent.require(&cx.options.property_name(field)),
                Behavior::OutputOnly => schema.read_only = Some(true),
                Behavior::InputOnly => schema.write_only = Some(true),
                Behavior::Other => {}
            }
        }
    }
}
