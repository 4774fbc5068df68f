//! protoapi CLI
//!
//! Runs the OpenAPI compiler over a JSON-encoded `CodeGeneratorRequest` (from
//! `--request` or stdin) or over a JSON descriptor set plus an explicit file
//! list. Output goes to `--out-dir`, or to stdout as a JSON
//! `CodeGeneratorResponse` with `--response`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use protoapi_descriptor::{CodeGeneratorRequest, CodeGeneratorResponse, FileDescriptorSet, ResponseFile};
use protoapi_openapi::{compile, GeneratedFile, Options, Resources};
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "protoc-gen-protoapi")]
#[command(author, version, about = "Compile protobuf descriptors into OpenAPI 3.1 documents")]
struct Cli {
    /// JSON `CodeGeneratorRequest`. Read from stdin when neither this nor
    /// `--descriptor-set` is given.
    #[arg(long, conflicts_with = "descriptor_set")]
    request: Option<PathBuf>,

    /// JSON `FileDescriptorSet` (e.g. `buf build -o set.json`).
    #[arg(long, requires = "file")]
    descriptor_set: Option<PathBuf>,

    /// File to generate, as named in the descriptor set. Repeatable.
    #[arg(long)]
    file: Vec<String>,

    /// Plugin option (`allow-get`, `format=json`, ...). Repeatable; appended
    /// to the request's own parameter.
    #[arg(long = "opt")]
    opts: Vec<String>,

    /// Directory generated files are written under.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Print a JSON `CodeGeneratorResponse` to stdout instead of writing files.
    #[arg(long)]
    response: bool,

    /// Log at debug level.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let request = load_request(&cli)?;
    let debug = cli.verbose
        || Options::parse(request.parameter.as_deref().unwrap_or_default())
            .map(|o| o.debug)
            .unwrap_or(false);
    init_tracing(debug);

    if cli.response {
        let response = match run(&request) {
            Ok(files) => CodeGeneratorResponse {
                error: None,
                file: files
                    .into_iter()
                    .map(|f| ResponseFile {
                        name: f.name,
                        content: f.content,
                    })
                    .collect(),
            },
            Err(err) => CodeGeneratorResponse {
                error: Some(format!("{err:#}")),
                file: Vec::new(),
            },
        };
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    let files = run(&request)?;
    for file in &files {
        let path = write_file(&cli.out_dir, file)?;
        eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
    }
    if files.is_empty() {
        eprintln!("{} nothing to generate", "info:".yellow().bold());
    }
    Ok(())
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Build the request from whichever input the user gave, then fold `--opt`
/// values into its parameter.
fn load_request(cli: &Cli) -> Result<CodeGeneratorRequest> {
    let mut request = if let Some(path) = &cli.descriptor_set {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read descriptor set {}", path.display()))?;
        let set: FileDescriptorSet = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse descriptor set {}", path.display()))?;
        CodeGeneratorRequest {
            file_to_generate: cli.file.clone(),
            parameter: None,
            proto_file: set.file,
        }
    } else {
        let text = match &cli.request {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("failed to read request {}", path.display()))?,
            None => {
                let mut text = String::new();
                io::stdin()
                    .read_to_string(&mut text)
                    .context("failed to read request from stdin")?;
                text
            }
        };
        let mut request: CodeGeneratorRequest =
            serde_json::from_str(&text).context("failed to parse CodeGeneratorRequest")?;
        if !cli.file.is_empty() {
            request.file_to_generate = cli.file.clone();
        }
        request
    };

    request.parameter = join_parameter(request.parameter.take(), &cli.opts);
    Ok(request)
}

fn join_parameter(existing: Option<String>, opts: &[String]) -> Option<String> {
    let parts: Vec<&str> = existing
        .as_deref()
        .into_iter()
        .chain(opts.iter().map(String::as_str))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(","))
}

fn run(request: &CodeGeneratorRequest) -> Result<Vec<GeneratedFile>> {
    let options = Options::parse(request.parameter.as_deref().unwrap_or_default())?;
    let resources = load_resources(&options)?;
    let files = compile(request, &resources)?;
    tracing::debug!(files = files.len(), "compilation finished");
    Ok(files)
}

/// Read the base/override documents named by the options, keyed by the
/// path exactly as written in the option.
fn load_resources(options: &Options) -> Result<Resources> {
    let mut resources = Resources::new();
    for (kind, path) in [
        ("base", options.base.as_deref()),
        ("override", options.override_document.as_deref()),
    ] {
        let Some(path) = path else { continue };
        let bytes = fs::read(path).with_context(|| format!("failed to read {kind} document {path}"))?;
        resources.insert(path, bytes);
    }
    Ok(resources)
}

/// Generated names are relative and stay under `out_dir`.
fn write_file(out_dir: &Path, file: &GeneratedFile) -> Result<PathBuf> {
    let name = Path::new(&file.name);
    let escapes = name
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_absolute() || escapes {
        bail!("refusing to write {} outside the output directory", file.name);
    }
    let path = out_dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, &file.content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
