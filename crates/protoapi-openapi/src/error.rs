use protoapi_descriptor::DescriptorError;

/// Run-level failures. Anything recoverable is logged instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid option `{token}`: {reason}")]
    InvalidOption { token: String, reason: String },

    #[error("unknown output format `{0}` (expected `yaml` or `json`)")]
    UnknownFormat(String),

    #[error("{kind} document `{path}` is named in options but was not supplied")]
    MissingDocument { kind: &'static str, path: String },

    #[error("failed to parse {kind} document: {message}")]
    InvalidDocument { kind: &'static str, message: String },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("schema reference `{0}` has no component definition")]
    DanglingReference(String),

    #[error("failed to render document: {0}")]
    Render(String),
}

impl Error {
    pub(crate) fn option(token: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
