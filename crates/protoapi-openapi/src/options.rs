//! Plugin parameter parsing.
//!
//! The host hands us a single string such as
//! `format=json,allow-get,services=acme.v1.*,twirp=true`. Tokens are comma
//! separated, each either `key` or `key=value`. Anything unrecognized is a hard
//! error: silently ignoring a typo would produce a different document.

use crate::error::{Error, Result};
use protoapi_descriptor::FieldRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

impl Format {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }

    /// Suffix replacing `.proto` on generated file names.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "openapi.yaml",
            Self::Json => "openapi.json",
        }
    }
}

/// A wire codec a route can be served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Json,
    Proto,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Proto => "proto",
        }
    }
}

/// Independent switches for each binding convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bindings {
    pub connect: bool,
    pub google_http: bool,
    pub grpc: bool,
    pub twirp: bool,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            connect: true,
            google_http: true,
            grpc: false,
            twirp: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub format: Format,
    pub allow_get: bool,
    pub with_streaming: bool,
    pub include_number_enum_values: bool,
    pub with_proto_names: bool,
    pub base: Option<String>,
    pub override_document: Option<String>,
    /// Merge every input file into this single output.
    pub output_path: Option<String>,
    pub path_prefix: String,
    pub services: Vec<glob::Pattern>,
    pub short_service_tags: bool,
    pub short_operation_ids: bool,
    pub full_message_titles: bool,
    pub with_service_descriptions: bool,
    pub bindings: Bindings,
    pub disable_default_response: bool,
    pub content_types: Vec<Codec>,
    pub trim_unused_types: bool,
    pub debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            format: Format::default(),
            allow_get: false,
            with_streaming: false,
            include_number_enum_values: false,
            with_proto_names: false,
            base: None,
            override_document: None,
            output_path: None,
            path_prefix: String::new(),
            services: Vec::new(),
            short_service_tags: false,
            short_operation_ids: false,
            full_message_titles: false,
            with_service_descriptions: false,
            bindings: Bindings::default(),
            disable_default_response: false,
            content_types: vec![Codec::Json],
            trim_unused_types: false,
            debug: false,
        }
    }
}

impl Options {
    pub fn parse(parameter: &str) -> Result<Self> {
        let mut options = Options::default();
        let mut content_types: Option<Vec<Codec>> = None;

        for token in parameter.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (token, None),
            };

            match key {
                "format" => options.format = Format::parse(required(token, value)?)?,
                "allow-get" => options.allow_get = flag(token, value)?,
                "with-streaming" => options.with_streaming = flag(token, value)?,
                "include-number-enum-values" => {
                    options.include_number_enum_values = flag(token, value)?
                }
                "with-proto-names" => options.with_proto_names = flag(token, value)?,
                "base" => options.base = Some(required(token, value)?.to_string()),
                "override" => {
                    options.override_document = Some(required(token, value)?.to_string())
                }
                "path" => options.output_path = Some(required(token, value)?.to_string()),
                "path-prefix" => options.path_prefix = normalize_prefix(required(token, value)?),
                "services" => {
                    let pattern = required(token, value)?;
                    let compiled = glob::Pattern::new(pattern)
                        .map_err(|e| Error::option(token, e.to_string()))?;
                    options.services.push(compiled);
                }
                "short-service-tags" => options.short_service_tags = flag(token, value)?,
                "short-operation-ids" => options.short_operation_ids = flag(token, value)?,
                "full-message-titles" => options.full_message_titles = flag(token, value)?,
                "with-service-descriptions" => {
                    options.with_service_descriptions = flag(token, value)?
                }
                "connect" => options.bindings.connect = flag(token, value)?,
                "google-http" => options.bindings.google_http = flag(token, value)?,
                "grpc" => options.bindings.grpc = flag(token, value)?,
                "twirp" => options.bindings.twirp = flag(token, value)?,
                "disable-default-response" => {
                    options.disable_default_response = flag(token, value)?
                }
                "content-types" => {
                    let mut codecs = Vec::new();
                    for name in required(token, value)?.split(';').map(str::trim) {
                        let codec = match name {
                            "json" => Codec::Json,
                            "proto" => Codec::Proto,
                            other => {
                                return Err(Error::option(
                                    token,
                                    format!("unknown content type `{other}`"),
                                ))
                            }
                        };
                        if !codecs.contains(&codec) {
                            codecs.push(codec);
                        }
                    }
                    content_types = Some(codecs);
                }
                "trim-unused-types" => options.trim_unused_types = flag(token, value)?,
                "debug" => options.debug = flag(token, value)?,
                _ => return Err(Error::option(token, "unrecognized option")),
            }
        }

        if let Some(codecs) = content_types {
            options.content_types = codecs;
        }
        Ok(options)
    }

    /// Services pass when no pattern is configured or any pattern matches.
    pub fn allows_service(&self, full_name: &str) -> bool {
        self.services.is_empty() || self.services.iter().any(|p| p.matches(full_name))
    }

    /// Property name of a field in the output schema.
    pub fn property_name(&self, field: &FieldRef<'_>) -> String {
        if self.with_proto_names {
            field.name().to_string()
        } else {
            field.json_name()
        }
    }

    /// Prepend the configured prefix to a route.
    pub fn route(&self, path: &str) -> String {
        format!("{}{}", self.path_prefix, path)
    }
}

fn required<'a>(token: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::option(token, "expected a value")),
    }
}

fn flag(token: &str, value: Option<&str>) -> Result<bool> {
    match value {
        None | Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(Error::option(token, format!("expected a boolean, got `{other}`"))),
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_parameter_gives_defaults() {
        let options = Options::parse("").unwrap();
        assert_eq!(options.format, Format::Yaml);
        assert!(options.bindings.connect);
        assert!(options.bindings.google_http);
        assert!(!options.bindings.twirp);
        assert_eq!(options.content_types, vec![Codec::Json]);
        assert!(options.allows_service("anything.Goes"));
    }

    #[test]
    fn parses_every_kind_of_token() {
        let options = Options::parse(
            "format=json, allow-get,with-streaming,path-prefix=api/,services=acme.*.Things,\
             connect=false,twirp,content-types=proto;json,base=base.yaml,path=all.json",
        )
        .unwrap();
        assert_eq!(options.format, Format::Json);
        assert!(options.allow_get);
        assert!(options.with_streaming);
        assert_eq!(options.path_prefix, "/api");
        assert_eq!(options.route("/x.Y/Z"), "/api/x.Y/Z");
        assert!(!options.bindings.connect);
        assert!(options.bindings.twirp);
        assert_eq!(options.content_types, vec![Codec::Proto, Codec::Json]);
        assert_eq!(options.base.as_deref(), Some("base.yaml"));
        assert_eq!(options.output_path.as_deref(), Some("all.json"));
        assert!(options.allows_service("acme.v1.Things"));
        assert!(!options.allows_service("acme.v1.Other"));
    }

    #[test]
    fn unknown_tokens_are_fatal() {
        let err = Options::parse("allow-get,frobnicate").unwrap_err();
        assert!(matches!(err, Error::InvalidOption { token, .. } if token == "frobnicate"));
    }

    #[test]
    fn bad_values_are_fatal() {
        assert!(matches!(
            Options::parse("format=xml"),
            Err(Error::UnknownFormat(f)) if f == "xml"
        ));
        assert!(Options::parse("allow-get=maybe").is_err());
        assert!(Options::parse("base=").is_err());
        assert!(Options::parse("content-types=xml").is_err());
        assert!(Options::parse("services=a**b").is_err());
    }

    #[test]
    fn output_extension_follows_format() {
        assert_eq!(Format::Yaml.extension(), "openapi.yaml");
        assert_eq!(Format::Json.extension(), "openapi.json");
    }
}
