//! Option definitions: the schema every resolution is driven by.
//!
//! Definitions are plain data, usually loaded from a YAML or TOML file mapping
//! option names to records:
//!
//! ```yaml
//! RETRIES:
//!   type: integer
//!   default: 3
//!   env: [{name: APP_RETRIES}]
//!   ini: [{section: defaults, key: retries}]
//! ```
//!
//! Loading can be strict: fields the schema doesn't know are reported with
//! their file path and best-effort line number, like unknown keys in a config
//! file would be.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::error::ResolveError;
use crate::types::{FileFormat, ValueType};
use crate::value::Value;

/// Name of the always-defined pseudo-option that reports the active config file.
pub const CONFIG_FILE: &str = "CONFIG_FILE";

/// Options whose name starts with this prefix exist for tests only.
pub const PRIVATE_PREFIX: &str = "_Z_";

/// Deprecation notice attached to a whole option or a single source entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Deprecation {
    #[serde(default)]
    pub why: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub removed_in: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub removed_at_date: Option<String>,
    #[serde(default)]
    pub alternative: Option<String>,
    #[serde(default)]
    pub alternatives: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
}

/// One lookup descriptor within a source kind.
///
/// Env/var/cli/keyword entries use `name`; file entries use `section` + `key`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub deprecated: Option<Deprecation>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub version_added: Option<String>,
}

impl Entry {
    pub fn named(name: &str) -> Self {
        Entry {
            name: Some(name.to_string()),
            ..Entry::default()
        }
    }

    pub fn ini(section: &str, key: &str) -> Self {
        Entry {
            section: Some(section.to_string()),
            key: Some(key.to_string()),
            ..Entry::default()
        }
    }

    pub fn deprecated(mut self, info: Deprecation) -> Self {
        self.deprecated = Some(info);
        self
    }

    /// INI section, `defaults` when unset.
    pub fn ini_section(&self) -> &str {
        self.section.as_deref().unwrap_or("defaults")
    }

    /// INI key, empty when unset.
    pub fn ini_key(&self) -> &str {
        self.key.as_deref().unwrap_or("")
    }
}

/// The restricted set of values an option accepts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Choices {
    /// Keys are the valid values; the values are descriptions.
    Map(IndexMap<String, Value>),
    List(Vec<Value>),
    /// Comma-delimited.
    Delimited(String),
}

impl Choices {
    pub fn contains(&self, value: &Value) -> bool {
        match self {
            Choices::Map(map) => value.as_str().is_some_and(|s| map.contains_key(s)),
            Choices::List(items) => items.contains(value),
            Choices::Delimited(text) => value
                .as_str()
                .is_some_and(|s| text.split(',').any(|c| c.trim() == s)),
        }
    }

    /// "Valid values are: …" rendering.
    pub fn describe(&self) -> String {
        match self {
            Choices::Map(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
            Choices::List(items) => items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            Choices::Delimited(text) => text.clone(),
        }
    }
}

/// Describes one configurable setting.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OptionDefinition {
    /// Identifier, unique within its scope. Filled from the definitions map key.
    #[serde(skip)]
    pub name: String,
    /// Display name.
    #[serde(default, rename = "name")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "description_lines")]
    pub description: Vec<String>,
    #[serde(default, rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub choices: Option<Choices>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub cli: Vec<Entry>,
    #[serde(default)]
    pub env: Vec<Entry>,
    #[serde(default)]
    pub vars: Vec<Entry>,
    #[serde(default)]
    pub keyword: Vec<Entry>,
    #[serde(default)]
    pub ini: Vec<Entry>,
    #[serde(default)]
    pub yaml: Vec<Entry>,
    #[serde(default)]
    pub deprecated: Option<Deprecation>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub version_added: Option<String>,
}

impl OptionDefinition {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        OptionDefinition {
            name: name.to_string(),
            value_type,
            ..OptionDefinition::default()
        }
    }

    /// The implicit definition behind [`CONFIG_FILE`].
    pub fn config_file() -> Self {
        OptionDefinition::new(CONFIG_FILE, ValueType::Path)
    }

    /// Entries for the given config file format.
    pub fn file_entries(&self, format: FileFormat) -> &[Entry] {
        match format {
            FileFormat::Ini => &self.ini,
            FileFormat::Yaml => &self.yaml,
        }
    }

    /// Every entry that may carry a deprecation tied to a collection.
    pub(crate) fn sourced_entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.ini
            .iter_mut()
            .chain(self.env.iter_mut())
            .chain(self.vars.iter_mut())
    }
}

/// Definitions keyed by option name, in file order.
pub type DefinitionSet = IndexMap<String, OptionDefinition>;

/// Result of loading a definitions file.
#[derive(Debug, Default)]
pub struct LoadedDefinitions {
    pub definitions: DefinitionSet,
    /// Unknown fields found in lenient mode, already formatted for display.
    pub warnings: Vec<String>,
}

/// Read and parse a definitions file. YAML or TOML is chosen by extension.
///
/// In `strict` mode unknown fields fail the load; otherwise they are returned
/// as warnings.
pub fn load_definitions(path: &Path, strict: bool) -> Result<LoadedDefinitions, ResolveError> {
    let content = std::fs::read_to_string(path).map_err(|e| ResolveError::DefinitionsFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let is_toml = path.extension().is_some_and(|e| e == "toml");
    parse_definitions(&content, path, is_toml, strict)
}

/// Parse definitions from text. `path` is only used for error messages.
pub fn parse_definitions(
    content: &str,
    path: &Path,
    is_toml: bool,
    strict: bool,
) -> Result<LoadedDefinitions, ResolveError> {
    if content.trim().is_empty() {
        return Ok(LoadedDefinitions::default());
    }

    let mut unknown: Vec<String> = Vec::new();
    let parsed: Result<Option<DefinitionSet>, String> = if is_toml {
        let de = toml::Deserializer::new(content);
        serde_ignored::deserialize(de, |p| unknown.push(p.to_string())).map_err(|e| e.to_string())
    } else {
        let de = serde_yaml::Deserializer::from_str(content);
        serde_ignored::deserialize(de, |p| unknown.push(p.to_string())).map_err(|e| e.to_string())
    };
    let mut definitions = parsed
        .map_err(|reason| ResolveError::DefinitionsFile {
            path: path.to_path_buf(),
            reason,
        })?
        .unwrap_or_default();

    for (name, def) in definitions.iter_mut() {
        def.name = name.clone();
    }

    let unknown: Vec<String> = unknown.iter().map(|p| clean_path(p)).collect();

    if !unknown.is_empty() && strict {
        let errors = unknown
            .into_iter()
            .map(|field| {
                let line = find_field_line(content, &field);
                ResolveError::UnknownDefinitionField {
                    field,
                    path: path.to_path_buf(),
                    line,
                }
            })
            .collect();
        return Err(ResolveError::UnknownDefinitionFields(errors));
    }

    let warnings = unknown
        .into_iter()
        .map(|field| {
            let line = find_field_line(content, &field);
            format!(
                "Unknown field '{field}' in definitions file {} (line {line})",
                path.display()
            )
        })
        .collect();

    Ok(LoadedDefinitions {
        definitions,
        warnings,
    })
}

/// Drop the `?` markers `serde_ignored` puts in paths for `Option` layers.
fn clean_path(path: &str) -> String {
    path.split('.')
        .filter(|segment| *segment != "?")
        .collect::<Vec<_>>()
        .join(".")
}

/// Find the 1-indexed line of a dotted field path such as `RETRIES.env.0.nmae`.
///
/// Walks the path segments in order, each search starting after the line the
/// previous segment matched. Numeric segments (sequence indices) are skipped.
/// Handles `key:` (YAML), `key =` and `[key]` (TOML). Returns 0 when not found.
fn find_field_line(content: &str, dotted: &str) -> usize {
    let lines: Vec<&str> = content.lines().collect();
    let mut cursor = 0;
    let mut found = 0;

    for segment in dotted.split('.') {
        if segment.is_empty() || segment.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let hit = lines
            .iter()
            .enumerate()
            .skip(cursor)
            .find(|(_, line)| line_declares(line, segment));
        match hit {
            Some((i, _)) => {
                cursor = i + 1;
                found = i + 1;
            }
            None => return 0,
        }
    }
    found
}

fn line_declares(line: &str, segment: &str) -> bool {
    let trimmed = line.trim().trim_start_matches("- ").trim_start();
    if let Some(rest) = trimmed.strip_prefix(segment) {
        let rest = rest.trim_start();
        return rest.starts_with(':') || rest.starts_with('=');
    }
    let header = trimmed.trim_start_matches('[').trim_end_matches(']');
    trimmed.starts_with('[') && header.rsplit('.').next() == Some(segment)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::None) => None,
        Some(Value::Str(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn description_lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lines {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<Lines>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Lines::One(line)) => vec![line],
        Some(Lines::Many(lines)) => lines,
    })
}
