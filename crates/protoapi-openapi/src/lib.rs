//! Protobuf descriptors → OpenAPI 3.1.
//!
//! The pipeline for one file:
//!
//! 1. `schema` turns every message and enum into a component schema,
//!    queueing referenced types from other files for later,
//! 2. `annotate` lets option readers (`buf.validate`, `google.api.field_behavior`,
//!    gnostic `openapi.v3`) refine schemas, operations and the document,
//! 3. `paths` produces routes for each enabled binding
//!    (Connect, `google.api.http`, gRPC, Twirp),
//! 4. `document` merges everything into the base document, applies the
//!    override, optionally trims unused schemas and checks that every
//!    `$ref` resolves,
//! 5. `render` writes YAML or JSON.
//!
//! `compiler` drives the whole thing for a `CodeGeneratorRequest`.

pub mod annotate;
pub mod compiler;
pub mod document;
pub mod error;
pub mod model;
pub mod options;
pub mod paths;
pub mod render;
pub mod schema;
pub mod template;

pub use annotate::{default_chain, Annotator, AnnotatorChain};
pub use compiler::{compile, compile_with, output_name, GeneratedFile, Resources};
pub use error::{Error, Result};
pub use model::Document;
pub use options::{Codec, Format, Options};
