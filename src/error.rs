use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by option resolution and the operations built on it.
#[derive(Debug, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum ResolveError {
    #[error("No config definition exists for {label}.")]
    UndefinedConfigEntry { label: String },

    #[error("Required config {label} not provided.")]
    RequiredOptionMissing { label: String },

    #[error("Config {label} from '{origin}' has an invalid value.")]
    InvalidOptionValue {
        label: String,
        origin: String,
        #[source]
        source: CoerceError,
        #[cfg_attr(feature = "rich-errors", help)]
        help: Option<String>,
    },

    #[error("Unsupported configuration file type for {path}: {kind}")]
    UnsupportedConfigType { path: PathBuf, kind: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error reading config file ({path}) line {line}: {reason}")]
    ConfigFileParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Missing or invalid definitions file {path}: {reason}")]
    DefinitionsFile { path: PathBuf, reason: String },

    #[error("Unknown field '{field}' in definitions file {path} (line {line})")]
    UnknownDefinitionField {
        field: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Unknown fields in definitions file")]
    UnknownDefinitionFields(Vec<ResolveError>),

    #[error("app_name is required")]
    AppNameRequired,

    #[error("No config file is active")]
    NoConfigFile,

    #[error("Unhandled error when retrieving '{name}'.")]
    Unhandled {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ResolveError {
    pub(crate) fn invalid_value(label: String, origin: String, source: CoerceError) -> Self {
        let help = match &source {
            CoerceError::InvalidChoice { valid, .. } => Some(format!("Valid values are: {valid}")),
            _ => None,
        };
        ResolveError::InvalidOptionValue {
            label,
            origin,
            source,
            help,
        }
    }

    /// The "Valid values are" text for choice failures, if this is one.
    pub fn help_text(&self) -> Option<&str> {
        match self {
            ResolveError::InvalidOptionValue { help, .. } => help.as_deref(),
            _ => None,
        }
    }
}

/// A value could not be converted to the requested semantic type.
#[derive(Debug, Error)]
pub enum CoerceError {
    #[error("Invalid value provided for '{type_tag}': {value}")]
    InvalidValue { type_tag: String, value: String },

    #[error("Invalid value {value}, valid values are: {valid}")]
    InvalidChoice { value: String, valid: String },

    #[error("Failed to create temporary directory under {path}: {source}")]
    TempDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A container could not answer a lookup for one key.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LookupError {
    #[error("value for config entry {0} contains invalid characters")]
    Encoding(String),
    #[error("cli argument '{key}' could not be read: {reason}")]
    Argument { key: String, reason: String },
}
