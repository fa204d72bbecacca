//! Config operations: listing definitions, dumping resolved values, single
//! key lookup and viewing the active file.
//!
//! Provides the logic behind `config list`, `config dump`, `config get` and
//! `config view`, and the [`ConfigResult`] enum callers display.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::definition::CONFIG_FILE;
use crate::error::ResolveError;
use crate::resolve::{ResolveRequest, Resolver};
use crate::types::{ConfigAction, Scope};
use crate::value::Value;

/// One definition as shown by `config list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefinitionSummary {
    pub name: String,
    pub value_type: String,
    pub default: Value,
    pub description: Vec<String>,
}

/// One resolved option as shown by `config dump` and `config get`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntry {
    pub name: String,
    pub value: Value,
    pub origin: String,
}

/// Result of a config operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigResult {
    Definitions { entries: Vec<DefinitionSummary> },
    Dump { entries: Vec<ResolvedEntry> },
    KeyValue {
        entry: ResolvedEntry,
        description: Vec<String>,
    },
    FileContents { path: PathBuf, content: String },
}

impl ConfigResult {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ResolvedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.origin.is_empty() {
            write!(f, "{} = {}", self.name, self.value)
        } else {
            write!(f, "{}({}) = {}", self.name, self.origin, self.value)
        }
    }
}

impl fmt::Display for ConfigResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigResult::Definitions { entries } => {
                for (i, def) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{} ({}, default: {})", def.name, def.value_type, def.default)?;
                    for line in &def.description {
                        write!(f, "\n    {line}")?;
                    }
                }
                Ok(())
            }
            ConfigResult::Dump { entries } => {
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{entry}")?;
                }
                Ok(())
            }
            ConfigResult::KeyValue { entry, description } => {
                for line in description {
                    writeln!(f, "# {line}")?;
                }
                write!(f, "{entry}")
            }
            ConfigResult::FileContents { content, .. } => write!(f, "{content}"),
        }
    }
}

/// Carry out `action` against the options of `scope`.
pub fn handle(
    resolver: &Resolver,
    action: &ConfigAction,
    scope: Scope<'_>,
) -> Result<ConfigResult, ResolveError> {
    let request = ResolveRequest::new().scope(scope);
    match action {
        ConfigAction::List => {
            let entries = resolver
                .list_definitions(scope)
                .into_values()
                .map(|def| DefinitionSummary {
                    name: def.name,
                    value_type: def.value_type.to_string(),
                    default: def.default,
                    description: def.description,
                })
                .collect();
            Ok(ConfigResult::Definitions { entries })
        }
        ConfigAction::Dump { only_changed } => {
            let mut entries = Vec::new();
            for name in resolver.list_definitions(scope).into_keys() {
                let resolved = resolver.resolve(&name, &request)?;
                let unset = name == CONFIG_FILE && resolver.config_file().is_none();
                if *only_changed && (resolved.origin.is_default() || unset) {
                    continue;
                }
                entries.push(ResolvedEntry {
                    name,
                    value: resolved.value.into_value(),
                    origin: resolved.origin.to_string(),
                });
            }
            Ok(ConfigResult::Dump { entries })
        }
        ConfigAction::Get { key } => {
            let resolved = resolver.resolve(key, &request)?;
            let description = resolver
                .registry()
                .lookup(key, scope)
                .map(|def| def.description)
                .unwrap_or_default();
            Ok(ConfigResult::KeyValue {
                entry: ResolvedEntry {
                    name: key.clone(),
                    value: resolved.value.into_value(),
                    origin: resolved.origin.to_string(),
                },
                description,
            })
        }
        ConfigAction::View => {
            let path = resolver.config_file().ok_or(ResolveError::NoConfigFile)?;
            let content =
                std::fs::read_to_string(path).map_err(|source| ResolveError::ConfigFileRead {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(ConfigResult::FileContents {
                path: path.to_path_buf(),
                content,
            })
        }
    }
}

impl Resolver {
    /// Handle a [`ConfigAction`] (list / dump / get / view).
    pub fn handle(&self, action: &ConfigAction, scope: Scope<'_>) -> Result<ConfigResult, ResolveError> {
        handle(self, action, scope)
    }

    /// Handle a [`ConfigAction`] and print the result to stdout.
    pub fn handle_and_print(&self, action: &ConfigAction, scope: Scope<'_>) -> Result<(), ResolveError> {
        let result = self.handle(action, scope)?;
        println!("{result}");
        Ok(())
    }
}
