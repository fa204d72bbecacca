//! Minimal INI parser for config files.
//!
//! Supports what real-world config files use:
//!
//! - `[section]` headers (case-sensitive); a `[DEFAULT]` section supplies
//!   fallbacks for every other section.
//! - `key = value` or `key: value`, split at the first delimiter. Keys are
//!   lowercased, keys and values trimmed.
//! - Whole-line comments starting with `#` or `;`, and inline comments
//!   starting with `;` preceded by whitespace.
//! - Continuation lines: an indented line extends the previous value,
//!   joined with a newline.
//!
//! No interpolation is performed. Duplicate sections or keys, keys outside a
//! section, and lines without a delimiter are parse errors.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::ResolveError;

const DEFAULT_SECTION: &str = "DEFAULT";

/// A parsed config file that answers `(section, key)` lookups.
pub trait ConfigFile: fmt::Debug + Send + Sync {
    /// The raw string value, or `None` if the section or key is missing.
    fn get_value(&self, section: &str, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct IniFile {
    defaults: IndexMap<String, String>,
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl IniFile {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ResolveError> {
        let mut ini = IniFile::default();
        let mut section: Option<String> = None;
        let mut last_key: Option<String> = None;

        let error = |line: usize, reason: String| ResolveError::ConfigFileParse {
            path: path.to_path_buf(),
            line,
            reason,
        };

        for (i, raw) in content.lines().enumerate() {
            let lineno = i + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                last_key = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            let line = strip_inline_comment(raw);

            if raw.starts_with([' ', '\t'])
                && let (Some(sect), Some(key)) = (&section, &last_key)
            {
                let value = ini
                    .section_mut(sect)
                    .get_mut(key)
                    .ok_or_else(|| error(lineno, "continuation without a key".into()))?;
                value.push('\n');
                value.push_str(line.trim());
                continue;
            }

            let line = line.trim();
            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| error(lineno, format!("malformed section header '{line}'")))?
                    .trim()
                    .to_string();
                if name != DEFAULT_SECTION && ini.sections.contains_key(&name) {
                    return Err(error(lineno, format!("section '{name}' already exists")));
                }
                if name != DEFAULT_SECTION {
                    ini.sections.insert(name.clone(), IndexMap::new());
                }
                section = Some(name);
                last_key = None;
                continue;
            }

            let Some(sect) = &section else {
                return Err(error(lineno, "key found before any section header".into()));
            };
            let split = line
                .find(['=', ':'])
                .ok_or_else(|| error(lineno, format!("expected 'key = value', got '{line}'")))?;
            let key = line[..split].trim().to_lowercase();
            let value = line[split + 1..].trim().to_string();
            if key.is_empty() {
                return Err(error(lineno, "empty key".into()));
            }

            let entries = ini.section_mut(sect);
            if entries.contains_key(&key) {
                return Err(error(
                    lineno,
                    format!("option '{key}' in section '{sect}' already exists"),
                ));
            }
            entries.insert(key.clone(), value);
            last_key = Some(key);
        }

        Ok(ini)
    }

    fn section_mut(&mut self, name: &str) -> &mut IndexMap<String, String> {
        if name == DEFAULT_SECTION {
            &mut self.defaults
        } else {
            self.sections.entry(name.to_string()).or_default()
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

impl ConfigFile for IniFile {
    fn get_value(&self, section: &str, key: &str) -> Option<String> {
        let key = key.to_lowercase();
        if section == DEFAULT_SECTION {
            return self.defaults.get(&key).cloned();
        }
        let entries = self.sections.get(section)?;
        entries.get(&key).or_else(|| self.defaults.get(&key)).cloned()
    }
}

fn strip_inline_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b';' && i > 0 && bytes[i - 1].is_ascii_whitespace() {
            return &line[..i];
        }
    }
    line
}
