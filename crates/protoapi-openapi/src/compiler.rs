//! One compilation run: request in, rendered documents out.

use crate::annotate::{default_chain, AnnotateContext, Annotator};
use crate::document::Assembler;
use crate::error::{Error, Result};
use crate::model::{Document, Tag};
use crate::options::Options;
use crate::paths::{enabled_bindings, tag_name, Binding, RouteContext};
use crate::render::{parse_document, render};
use crate::schema::SchemaBuilder;
use protoapi_descriptor::{CodeGeneratorRequest, DescriptorPool, FileRef};
use std::collections::HashMap;

const DEFAULT_VERSION: &str = "0.0.1";

/// Documents referenced by `base=` / `override=`, keyed by the path given in
/// the options. The compiler itself never touches the filesystem.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    documents: HashMap<String, Vec<u8>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.documents.insert(path.into(), bytes);
    }

    pub fn with(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(path, bytes);
        self
    }

    fn document(&self, kind: &'static str, path: Option<&str>) -> Result<Option<Document>> {
        let Some(path) = path else {
            return Ok(None);
        };
        let bytes = self.documents.get(path).ok_or_else(|| Error::MissingDocument {
            kind,
            path: path.to_string(),
        })?;
        parse_document(kind, bytes).map(Some)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub content: String,
}

/// Compile a plugin request with the default annotator chain.
pub fn compile(request: &CodeGeneratorRequest, resources: &Resources) -> Result<Vec<GeneratedFile>> {
    let options = Options::parse(request.parameter.as_deref().unwrap_or_default())?;
    let pool = DescriptorPool::from_request(request)?;
    let chain = default_chain();
    compile_with(&pool, &request.file_to_generate, &options, resources, &chain)
}

/// Compile `files` out of `pool`.
///
/// Configuration problems (base/override documents) and unknown files fail
/// before any file is processed.
pub fn compile_with(
    pool: &DescriptorPool,
    files: &[String],
    options: &Options,
    resources: &Resources,
    annotators: &dyn Annotator,
) -> Result<Vec<GeneratedFile>> {
    let base = resources.document("base", options.base.as_deref())?;
    let overlay = resources.document("override", options.override_document.as_deref())?;
    let targets = files
        .iter()
        .map(|name| pool.file(name))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let bindings = enabled_bindings(options);

    let run = Run {
        options,
        annotators,
        bindings: &bindings,
    };

    if let Some(path) = &options.output_path {
        let mut builder = SchemaBuilder::new(options, annotators, pool);
        let mut assembler = Assembler::new(base);
        for file in &targets {
            run.compile_file(file, &mut builder, &mut assembler)?;
        }
        let document = run.finish(builder, assembler, overlay.as_ref())?;
        return Ok(vec![GeneratedFile {
            name: path.clone(),
            content: render(&document, options.format)?,
        }]);
    }

    let mut generated = Vec::with_capacity(targets.len());
    for file in &targets {
        let mut builder = SchemaBuilder::new(options, annotators, pool);
        let mut assembler = Assembler::new(base.clone());
        run.compile_file(file, &mut builder, &mut assembler)?;
        let document = run.finish(builder, assembler, overlay.as_ref())?;
        generated.push(GeneratedFile {
            name: output_name(file.name(), options),
            content: render(&document, options.format)?,
        });
    }
    Ok(generated)
}

/// `acme/v1/things.proto` → `acme/v1/things.openapi.yaml`.
pub fn output_name(proto_file: &str, options: &Options) -> String {
    let stem = proto_file.strip_suffix(".proto").unwrap_or(proto_file);
    format!("{stem}.{}", options.format.extension())
}

struct Run<'r> {
    options: &'r Options,
    annotators: &'r dyn Annotator,
    bindings: &'r [Box<dyn Binding>],
}

impl<'r> Run<'r> {
    fn compile_file(
        &self,
        file: &FileRef<'r>,
        builder: &mut SchemaBuilder<'r>,
        assembler: &mut Assembler,
    ) -> Result<()> {
        let _span = tracing::debug_span!("compile", file = file.name()).entered();
        builder.build_file(file)?;

        let services: Vec<_> = file
            .services()
            .into_iter()
            .filter(|s| {
                let allowed = self.options.allows_service(s.full_name());
                if !allowed {
                    tracing::debug!(service = %s.full_name(), "service filtered out");
                }
                allowed
            })
            .collect();

        let mut tags = Vec::new();
        let mut route_count = 0usize;
        for service in &services {
            tags.push(Tag {
                name: tag_name(self.options, service),
                description: service.comment().map(str::to_string),
                ..Default::default()
            });
            for method in service.methods() {
                for binding in self.bindings {
                    let mut cx = RouteContext::new(builder);
                    let routes = binding.build_routes(&mut cx, service, &method)?;
                    tracing::trace!(
                        binding = binding.name(),
                        method = %method.full_name(),
                        routes = routes.len(),
                        "routes built"
                    );
                    route_count += routes.len();
                    assembler.add_paths(routes);
                }
            }
        }
        assembler.add_tags(tags);

        let cx = AnnotateContext {
            options: self.options,
        };
        self.annotators.document(&cx, file, assembler.document_mut());

        let title = if services.is_empty() {
            file.name().to_string()
        } else {
            services
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        assembler.default_info(&title, &package_version(file.package()));

        if self.options.with_service_descriptions {
            let descriptions: Vec<&str> = services.iter().filter_map(|s| s.comment()).collect();
            let info = &mut assembler.document_mut().info;
            if info.description.is_none() && !descriptions.is_empty() {
                info.description = Some(descriptions.join("\n\n"));
            }
        }

        if self.options.debug {
            tracing::info!(
                file = file.name(),
                services = services.len(),
                routes = route_count,
                schemas = builder.schemas().len(),
                "compiled file"
            );
        }
        Ok(())
    }

    fn finish(
        &self,
        mut builder: SchemaBuilder<'r>,
        mut assembler: Assembler,
        overlay: Option<&Document>,
    ) -> Result<Document> {
        builder.drain_external()?;
        assembler.add_schemas(builder.take());
        assembler.finish(overlay, self.options.trim_unused_types)
    }
}

/// `acme.billing.v2` → `v2`; anything else gets a placeholder version.
fn package_version(package: &str) -> String {
    let last = package.rsplit('.').next().unwrap_or_default();
    let is_version = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().next().is_some_and(|c| c.is_ascii_digit());
    if is_version {
        last.to_string()
    } else {
        DEFAULT_VERSION.to_string()
    }
}
