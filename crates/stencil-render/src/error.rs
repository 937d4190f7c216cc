//! Error types for rendering and stream processing.
//!
//! Three layers of errors exist, mirroring how failures are handled:
//!
//! - [`RenderError`]: a single template phase failed. The processor logs it and
//!   skips only that phase's write; it never aborts a run.
//! - [`ConfigError`]: the configuration is unusable (missing setting, unknown
//!   encoding, unreadable file). Always fatal.
//! - [`ProcessError`]: everything that aborts the run, including wrapped
//!   configuration errors, malformed input, and output I/O failures.

use std::fmt;
use std::path::PathBuf;

/// Error type for template rendering operations.
///
/// This error type provides a stable API that doesn't expose implementation details
/// of the underlying template engine. The `detail` carried by some variants is the
/// engine's full diagnostic (including the offending template excerpt when known).
#[derive(Debug)]
pub enum RenderError {
    /// An attribute or variable could not be resolved.
    ///
    /// Wrapped records never produce this for missing fields; it shows up when a
    /// template reaches for a top-level name that is not in the render scope.
    Undefined(String),

    /// Template syntax error, failing helper call, or other runtime failure.
    TemplateError { message: String, detail: String },

    /// Template not found in the template directory.
    TemplateNotFound(String),

    /// I/O error (e.g., reading template from disk).
    IoError(std::io::Error),
}

impl RenderError {
    /// Returns the most detailed description available, for logging.
    pub fn detail(&self) -> String {
        match self {
            RenderError::TemplateError { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this is an attribute-resolution failure.
    pub fn is_undefined(&self) -> bool {
        matches!(self, RenderError::Undefined(_))
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Undefined(msg) => write!(f, "undefined value: {}", msg),
            RenderError::TemplateError { message, .. } => write!(f, "template error: {}", message),
            RenderError::TemplateNotFound(name) => write!(f, "template not found: {}", name),
            RenderError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::IoError(err)
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        match err.kind() {
            ErrorKind::TemplateNotFound => RenderError::TemplateNotFound(err.to_string()),
            ErrorKind::UndefinedError => RenderError::Undefined(err.to_string()),
            _ => RenderError::TemplateError {
                message: err.to_string(),
                // alternate formatting appends the template excerpt
                detail: format!("{:#}", err),
            },
        }
    }
}

/// Configuration errors. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("setting '{key}' is not configured for stream {stream} (neither globally nor in stream_configs)")]
    MissingSetting { key: &'static str, stream: String },

    #[error("unsupported output encoding '{0}'")]
    UnknownEncoding(String),

    #[error("unsupported output line ending {0:?}")]
    UnknownLineEnding(String),

    #[error("invalid template syntax configuration: {0}")]
    Syntax(#[source] RenderError),

    #[error("invalid output file name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("template '{name}' could not be loaded: {source}")]
    Template {
        name: String,
        #[source]
        source: RenderError,
    },
}

/// Fatal errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("unable to parse line {line:?}: {source}")]
    InvalidJson {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("line is missing required key '{key}': {line}")]
    MissingKey { key: &'static str, line: String },

    #[error("key '{key}' has an unexpected shape in line: {line}")]
    InvalidField { key: &'static str, line: String },

    #[error("unknown message type {kind} in message {line}")]
    UnknownType { kind: String, line: String },

    #[error("a record for stream {0} was encountered before a corresponding schema")]
    RecordBeforeSchema(String),

    #[error("key_properties field is required (stream {0})")]
    MissingKeyProperties(String),

    #[error("invalid schema for stream {stream}: {message}")]
    InvalidSchema { stream: String, message: String },

    #[error("record {record_number} of stream {stream} does not match its schema: {message}")]
    Validation {
        stream: String,
        record_number: u64,
        message: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to read input: {0}")]
    Input(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::TemplateNotFound("foo".to_string());
        assert!(err.to_string().contains("template not found"));
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let render_err: RenderError = io_err.into();
        assert!(matches!(render_err, RenderError::IoError(_)));
    }

    #[test]
    fn test_from_minijinja_template_not_found() {
        let mj_err = minijinja::Error::new(
            minijinja::ErrorKind::TemplateNotFound,
            "template 'foo' not found",
        );
        let render_err: RenderError = mj_err.into();
        assert!(matches!(render_err, RenderError::TemplateNotFound(_)));
    }

    #[test]
    fn test_from_minijinja_undefined() {
        let mj_err = minijinja::Error::new(minijinja::ErrorKind::UndefinedError, "nope");
        let render_err: RenderError = mj_err.into();
        assert!(render_err.is_undefined());
    }

    #[test]
    fn test_other_minijinja_errors_keep_detail() {
        let mj_err = minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, "bad call");
        let render_err: RenderError = mj_err.into();
        assert!(!render_err.is_undefined());
        assert!(render_err.detail().contains("bad call"));
    }

    #[test]
    fn test_process_error_wraps_config_error() {
        let err: ProcessError = ConfigError::UnknownEncoding("klingon".into()).into();
        assert!(err.to_string().contains("klingon"));
    }
}
