use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::error::ResolveError;

/// Semantic type an option's value is coerced to.
///
/// Parsed case-insensitively from a definition's `type` field. Unknown or
/// absent tags become [`Passthrough`](ValueType::Passthrough), which leaves
/// the value untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    Boolean,
    Integer,
    Float,
    List,
    None,
    Path,
    TempPath,
    PathSpec,
    PathList,
    Dictionary,
    String,
    #[default]
    Passthrough,
}

impl ValueType {
    pub fn parse(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => ValueType::Boolean,
            "integer" | "int" => ValueType::Integer,
            "float" => ValueType::Float,
            "list" => ValueType::List,
            "none" => ValueType::None,
            "path" => ValueType::Path,
            "temppath" | "tmppath" | "tmp" => ValueType::TempPath,
            "pathspec" => ValueType::PathSpec,
            "pathlist" => ValueType::PathList,
            "dictionary" | "dict" => ValueType::Dictionary,
            "string" | "str" => ValueType::String,
            _ => ValueType::Passthrough,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::List => "list",
            ValueType::None => "none",
            ValueType::Path => "path",
            ValueType::TempPath => "temppath",
            ValueType::PathSpec => "pathspec",
            ValueType::PathList => "pathlist",
            ValueType::Dictionary => "dictionary",
            ValueType::String => "string",
            ValueType::Passthrough => "passthrough",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(tag.as_deref().map(ValueType::parse).unwrap_or_default())
    }
}

/// Which definition set an option is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope<'a> {
    /// Global options.
    #[default]
    Base,
    /// Options shared by every plugin of one type.
    PluginType(&'a str),
    /// Options of one named plugin.
    Plugin { kind: &'a str, name: &'a str },
}

impl<'a> Scope<'a> {
    pub fn plugin(kind: &'a str, name: &'a str) -> Self {
        Scope::Plugin { kind, name }
    }

    pub fn plugin_type(self) -> Option<&'a str> {
        match self {
            Scope::Base => None,
            Scope::PluginType(kind) | Scope::Plugin { kind, .. } => Some(kind),
        }
    }

    /// Human-readable label for an option in this scope, e.g.
    /// `'timeout' for 'ssh' connection plugin`.
    pub fn label(self, option: &str) -> String {
        match self {
            Scope::Base => format!("'{option}'"),
            Scope::PluginType(kind) => format!("'{option}' for {kind} plugin"),
            Scope::Plugin { kind, name } => format!("'{option}' for '{name}' {kind} plugin"),
        }
    }
}

/// Config file formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Ini,
    Yaml,
}

impl FileFormat {
    /// `.ini`/`.cfg` are INI, `.yaml`/`.yml` are YAML; anything else is unsupported.
    pub fn from_path(path: &Path) -> Result<Self, ResolveError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        match ext.as_str() {
            "ini" | "cfg" => Ok(FileFormat::Ini),
            "yaml" | "yml" => Ok(FileFormat::Yaml),
            _ => Err(ResolveError::UnsupportedConfigType {
                path: path.to_path_buf(),
                kind: format!("extension '.{ext}'"),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileFormat::Ini => "ini",
            FileFormat::Yaml => "yaml",
        }
    }
}

/// Which source produced a resolved value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The `CONFIG_FILE` pseudo-option.
    ConfigFile,
    Direct,
    Var(String),
    Keyword(String),
    Cli(String),
    Env(String),
    File(PathBuf),
    Default,
    /// A required option exempted from the missing-value check.
    Unresolved,
}

impl Origin {
    pub fn is_default(&self) -> bool {
        matches!(self, Origin::Default)
    }

    pub fn is_env(&self) -> bool {
        matches!(self, Origin::Env(_))
    }

    /// Description stored in the provenance tag of a resolved value.
    pub fn tag_description(&self) -> String {
        format!("<Config {self}>")
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::ConfigFile => Ok(()),
            Origin::Direct => write!(f, "Direct"),
            Origin::Var(name) => write!(f, "var: {name}"),
            Origin::Keyword(name) => write!(f, "keyword: {name}"),
            Origin::Cli(name) => write!(f, "cli: {name}"),
            Origin::Env(name) => write!(f, "env: {name}"),
            Origin::File(path) => write!(f, "{}", path.display()),
            Origin::Default => write!(f, "default"),
            Origin::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// A config operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Every option definition in scope with its description.
    List,
    /// Every option in scope resolved, with its origin.
    Dump { only_changed: bool },
    /// One option resolved, with its origin.
    Get { key: String },
    /// The raw text of the active config file.
    View,
}
