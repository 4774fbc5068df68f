//! Metadata overlays applied while schemas and operations are built.
//!
//! Each annotator reads one family of custom options and mutates the node it
//! is handed. The builders only know the [`Annotator`] trait; the concrete
//! option shapes live in the submodules.
//!
//! A field that must be marked required cannot do that on its own schema, so
//! field hooks also receive the enclosing message schema as `parent`.

mod behavior;
mod gnostic;
mod validate;

pub use behavior::FieldBehaviorAnnotator;
pub use gnostic::GnosticAnnotator;
pub use validate::ValidateAnnotator;

use crate::model::{Document, Operation, Schema};
use crate::options::Options;
use protoapi_descriptor::{FieldRef, FileRef, MessageRef, MethodRef};

/// Run-scoped inputs every annotator may consult.
#[derive(Debug, Clone, Copy)]
pub struct AnnotateContext<'a> {
    pub options: &'a Options,
}

pub trait Annotator {
    /// A message schema, after all of its properties were built.
    fn message(&self, _cx: &AnnotateContext<'_>, _message: &MessageRef<'_>, _schema: &mut Schema) {
    }

    /// The complete schema of a field (array and map wrappers included).
    fn field(
        &self,
        _cx: &AnnotateContext<'_>,
        _field: &FieldRef<'_>,
        _schema: &mut Schema,
        _parent: &mut Schema,
    ) {
    }

    /// A `$ref` node for a message or enum value: the field itself, each array
    /// item, or each map value. `field` is always the property's own field.
    fn field_reference(
        &self,
        _cx: &AnnotateContext<'_>,
        _field: &FieldRef<'_>,
        _schema: &mut Schema,
        _parent: &mut Schema,
    ) {
    }

    fn operation(&self, _cx: &AnnotateContext<'_>, _method: &MethodRef<'_>, _operation: &mut Operation) {
    }

    /// Called once per compiled file with the document it is folded into.
    fn document(&self, _cx: &AnnotateContext<'_>, _file: &FileRef<'_>, _document: &mut Document) {}
}

/// Ordered list of annotators; each hook runs them front to back.
#[derive(Default)]
pub struct AnnotatorChain {
    annotators: Vec<Box<dyn Annotator>>,
}

impl AnnotatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, annotator: impl Annotator + 'static) -> Self {
        self.annotators.push(Box::new(annotator));
        self
    }

    pub fn len(&self) -> usize {
        self.annotators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotators.is_empty()
    }
}

impl std::fmt::Debug for AnnotatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotatorChain")
            .field("len", &self.annotators.len())
            .finish()
    }
}

/// validate, then field behavior, then gnostic (gnostic has the last word).
pub fn default_chain() -> AnnotatorChain {
    AnnotatorChain::new()
        .with(ValidateAnnotator)
        .with(FieldBehaviorAnnotator)
        .with(GnosticAnnotator)
}

impl Annotator for AnnotatorChain {
    fn message(&self, cx: &AnnotateContext<'_>, message: &MessageRef<'_>, schema: &mut Schema) {
        for a in &self.annotators {
            a.message(cx, message, schema);
        }
    }

    fn field(
        &self,
        cx: &AnnotateContext<'_>,
        field: &FieldRef<'_>,
        schema: &mut Schema,
        parent: &mut Schema,
    ) {
        for a in &self.annotators {
            a.field(cx, field, schema, parent);
        }
    }

    fn field_reference(
        &self,
        cx: &AnnotateContext<'_>,
        field: &FieldRef<'_>,
        schema: &mut Schema,
        parent: &mut Schema,
    ) {
        for a in &self.annotators {
            a.field_reference(cx, field, schema, parent);
        }
    }

    fn operation(&self, cx: &AnnotateContext<'_>, method: &MethodRef<'_>, operation: &mut Operation) {
        for a in &self.annotators {
            a.operation(cx, method, operation);
        }
    }

    fn document(&self, cx: &AnnotateContext<'_>, file: &FileRef<'_>, document: &mut Document) {
        for a in &self.annotators {
            a.document(cx, file, document);
        }
    }
}

/// Parse the `{ yaml: "..." }` wrapper gnostic uses for free-form values.
/// Plain JSON values are passed through.
pub(crate) fn any_value(raw: &serde_json::Value) -> Option<serde_json::Value> {
    match raw.get("yaml").and_then(|v| v.as_str()) {
        Some(text) => match serde_yaml::from_str::<serde_json::Value>(text) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unparseable yaml value in annotation");
                None
            }
        },
        None => Some(raw.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(&'static str, Rc<RefCell<Vec<&'static str>>>);

    impl Annotator for Recorder {
        fn operation(&self, _: &AnnotateContext<'_>, _: &MethodRef<'_>, op: &mut Operation) {
            self.1.borrow_mut().push(self.0);
            op.tags.push(self.0.to_string());
        }
    }

    #[test]
    fn chain_runs_in_insertion_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let chain = AnnotatorChain::new()
            .with(Recorder("first", log.clone()))
            .with(Recorder("second", log.clone()));
        assert_eq!(chain.len(), 2);

        let pool = protoapi_descriptor::DescriptorPool::from_descriptor_set_json(
            &serde_json::json!({
                "file": [{
                    "name": "a.proto", "package": "a",
                    "messageType": [{ "name": "M" }],
                    "service": [{ "name": "S", "method": [{ "name": "Do", "inputType": ".a.M", "outputType": ".a.M" }] }]
                }]
            })
            .to_string(),
        )
        .unwrap();
        let file = pool.file("a.proto").unwrap();
        let method = file.services()[0].methods().remove(0);
        let options = Options::default();
        let mut op = Operation::default();
        chain.operation(&AnnotateContext { options: &options }, &method, &mut op);

        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(op.tags, vec!["first", "second"]);
    }

    #[test]
    fn yaml_wrapped_values_are_parsed() {
        let raw = serde_json::json!({ "yaml": "{ id: 7, tags: [a, b] }" });
        assert_eq!(
            any_value(&raw),
            Some(serde_json::json!({ "id": 7, "tags": ["a", "b"] }))
        );
        assert_eq!(any_value(&serde_json::json!(3)), Some(serde_json::json!(3)));
    }

    #[test]
    fn default_chain_has_three_annotators() {
        assert_eq!(default_chain().len(), 3);
    }
}
