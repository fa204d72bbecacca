//! Convert raw values to an option's declared [`ValueType`].
//!
//! Conversion is permissive where the source is text (env vars, INI files,
//! CLI strings) and strict about anything that cannot be represented in the
//! target type:
//!
//! | Type | Accepts |
//! |------|---------|
//! | boolean | anything; `y yes on 1 true t` (any case), `1`, `1.0` are true |
//! | integer | ints, bools, floats and decimal strings with no fractional part |
//! | float | floats, ints, bools, float strings |
//! | list | lists; strings split on `,`, items trimmed and unquoted |
//! | none | only the string `None` |
//! | path | strings, expanded (`{{CWD}}`, `$VAR`, `~`) and made absolute |
//! | temppath | like path, then a fresh private directory is created inside |
//! | pathspec | strings split on the OS path separator, or lists of strings |
//! | pathlist | strings split on `,`, or lists of strings |
//! | dictionary | maps |
//! | string | strings, bools, numbers, secrets (decrypted) |
//!
//! `None` is never converted, and [`ValueType::Passthrough`] returns the value
//! untouched.

use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;

use crate::error::CoerceError;
use crate::types::{FileFormat, ValueType};
use crate::value::{Tagged, Value, format_float};

#[cfg(windows)]
const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: char = ':';

const TRUTHY: [&str; 6] = ["y", "yes", "on", "1", "true", "t"];

/// A temporary directory created by temp-path coercion.
///
/// The directory and its contents are removed when the handle is dropped.
#[derive(Debug)]
pub struct TempPath(TempDir);

impl TempPath {
    pub fn path(&self) -> &Path {
        self.0.path()
    }
}

/// Output of a coercion: the converted value and, for temp paths, the handle
/// that owns the created directory.
#[derive(Debug)]
pub struct Coerced {
    pub value: Tagged,
    pub temp_dir: Option<TempPath>,
}

/// Performs type coercion. Holds the prefix used for temp-path directories.
#[derive(Debug, Clone)]
pub struct Coercer {
    temp_prefix: String,
}

impl Default for Coercer {
    fn default() -> Self {
        Coercer::new("layerconf")
    }
}

impl Coercer {
    /// Temp directories are named `{app_name}-local-{pid}…`.
    pub fn new(app_name: &str) -> Self {
        Coercer {
            temp_prefix: format!("{app_name}-local-{}", std::process::id()),
        }
    }

    /// Convert `value` to `value_type`.
    ///
    /// `origin` is the origin string of the value; when it names an existing
    /// absolute path (a config file), relative paths resolve against it.
    /// With `format == Some(Ini)`, a string result loses one layer of quotes.
    /// The original value's provenance tag is carried over, except for temp
    /// paths which are always fresh.
    pub fn ensure_type(
        &self,
        value: Tagged,
        value_type: ValueType,
        origin: Option<&str>,
        format: Option<FileFormat>,
    ) -> Result<Coerced, CoerceError> {
        if value.value.is_none() {
            return Ok(Coerced {
                value: Tagged::from(Value::None),
                temp_dir: None,
            });
        }

        let basedir = origin
            .map(Path::new)
            .filter(|p| p.is_absolute() && p.exists());
        let Tagged { value: raw, tag } = value;
        let (converted, temp_dir) = self.convert(raw, value_type, basedir)?;

        let tag = if value_type == ValueType::TempPath { None } else { tag };
        let converted = match (converted, format) {
            (Value::Str(s), Some(FileFormat::Ini)) => Value::Str(unquote(&s).to_string()),
            (other, _) => other,
        };

        Ok(Coerced {
            value: Tagged {
                value: converted,
                tag,
            },
            temp_dir,
        })
    }

    fn convert(
        &self,
        value: Value,
        value_type: ValueType,
        basedir: Option<&Path>,
    ) -> Result<(Value, Option<TempPath>), CoerceError> {
        let invalid = |value: &Value| CoerceError::InvalidValue {
            type_tag: value_type.to_string(),
            value: value.repr(),
        };

        let converted = match (value_type, &value) {
            (ValueType::Boolean, v) => Value::Bool(truthy(v)),

            (ValueType::Integer, Value::Int(i)) => Value::Int(*i),
            (ValueType::Integer, Value::Bool(b)) => Value::Int(i64::from(*b)),
            (ValueType::Integer, Value::Float(f)) => {
                float_to_int(*f).map(Value::Int).ok_or_else(|| invalid(&value))?
            }
            (ValueType::Integer, Value::Str(s)) => {
                parse_exact_integer(s).map(Value::Int).ok_or_else(|| invalid(&value))?
            }

            (ValueType::Float, Value::Float(f)) => Value::Float(*f),
            (ValueType::Float, Value::Int(i)) => Value::Float(*i as f64),
            (ValueType::Float, Value::Bool(b)) => Value::Float(if *b { 1.0 } else { 0.0 }),
            (ValueType::Float, Value::Str(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| invalid(&value))?,

            (ValueType::List, Value::List(_)) => value.clone(),
            (ValueType::List, Value::Str(s)) => Value::List(
                s.split(',')
                    .map(|item| Value::from(unquote(item.trim())))
                    .collect(),
            ),

            (ValueType::None, Value::Str(s)) if s == "None" => Value::None,

            (ValueType::Path, Value::Str(s)) => Value::Str(path_string(resolve_path(s, basedir))),

            (ValueType::TempPath, Value::Str(s)) => {
                let temp = self.make_temp_dir(&resolve_path(s, basedir))?;
                let path = path_string(temp.path().to_path_buf());
                return Ok((Value::Str(path), Some(temp)));
            }

            (ValueType::PathSpec, Value::Str(s)) => {
                resolve_all(s.split(PATH_LIST_SEPARATOR), basedir)
            }
            (ValueType::PathSpec | ValueType::PathList, Value::List(items)) => {
                let strings: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
                let strings = strings.ok_or_else(|| invalid(&value))?;
                resolve_all(strings.into_iter(), basedir)
            }
            (ValueType::PathList, Value::Str(s)) => resolve_all(s.split(',').map(str::trim), basedir),

            (ValueType::Dictionary, Value::Map(_)) => value.clone(),

            (ValueType::String, Value::Str(_)) => value.clone(),
            (ValueType::String, Value::Bool(_) | Value::Int(_)) => Value::Str(value.to_string()),
            (ValueType::String, Value::Float(f)) => Value::Str(format_float(*f)),
            (ValueType::String, Value::Secret(secret)) => Value::Str(secret.decrypt()),

            (ValueType::Passthrough, _) => value.clone(),

            _ => return Err(invalid(&value)),
        };

        Ok((converted, None))
    }

    fn make_temp_dir(&self, parent: &Path) -> Result<TempPath, CoerceError> {
        let io_err = |source| CoerceError::TempDir {
            path: parent.to_path_buf(),
            source,
        };
        if !parent.exists() {
            create_private_dir(parent).map_err(io_err)?;
        }
        let dir = tempfile::Builder::new()
            .prefix(&self.temp_prefix)
            .tempdir_in(parent)
            .map_err(io_err)?;
        tracing::debug!(path = %dir.path().display(), "created temp config directory");
        Ok(TempPath(dir))
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(i) => *i == 1,
        Value::Float(f) => *f == 1.0,
        Value::Str(s) => TRUTHY.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

fn float_to_int(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Digits in `i64::MIN`.
const MAX_INTEGER_DIGITS: usize = 19;

/// Parse a decimal literal (`42`, `-3.000`, `1.5e2`) that denotes a whole
/// number. Fails on any non-zero fractional part.
fn parse_exact_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => (&unsigned[..pos], unsigned[pos + 1..].parse::<i32>().ok()?),
        None => (unsigned, 0),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let joined = format!("{whole}{fraction}");
    let owned;
    let mut digits = joined.trim_start_matches('0');
    if digits.is_empty() {
        return Some(0);
    }
    let scale = exponent.checked_sub(i32::try_from(fraction.len()).ok()?)?;
    if scale >= 0 {
        let scale = usize::try_from(scale).ok()?;
        if digits.len().checked_add(scale)? > MAX_INTEGER_DIGITS {
            return None;
        }
        owned = format!("{digits}{}", "0".repeat(scale));
        digits = &owned;
    } else {
        let cut = digits.len().checked_sub(usize::try_from(-i64::from(scale)).ok()?)?;
        let (kept, dropped) = digits.split_at(cut);
        if dropped.bytes().any(|b| b != b'0') {
            return None;
        }
        digits = kept;
    }

    let signed = if negative {
        format!("-{digits}")
    } else {
        digits.to_string()
    };
    signed.parse().ok()
}

/// Strip one layer of matching single or double quotes.
pub fn unquote(text: &str) -> &str {
    let bytes = text.as_bytes();
    let quoted = bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[0] == bytes[bytes.len() - 1]
        && bytes[bytes.len() - 2] != b'\\';
    if quoted { &text[1..text.len() - 1] } else { text }
}

fn resolve_all<'a>(paths: impl Iterator<Item = &'a str>, basedir: Option<&Path>) -> Value {
    Value::List(
        paths
            .map(|p| Value::Str(path_string(resolve_path(p, basedir))))
            .collect(),
    )
}

fn path_string(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

/// Resolve a configured path.
///
/// `{{CWD}}` becomes the working directory, then `$VAR`/`${VAR}` and a leading
/// `~` are expanded. A relative result is joined to `basedir` (its parent if it
/// is a file) or the working directory, and normalized lexically. Symlinks are
/// not followed.
pub fn resolve_path(path: &str, basedir: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_default();
    let mut text = path.to_string();
    if text.contains("{{CWD}}") {
        text = text.replace("{{CWD}}", &cwd.to_string_lossy());
    }
    let expanded = expand_user(&expand_vars(&text));

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        let base = match basedir {
            Some(dir) if dir.is_file() => dir.parent().map(Path::to_path_buf).unwrap_or(cwd),
            Some(dir) => dir.to_path_buf(),
            None => cwd,
        };
        base.join(expanded)
    };
    normalize(&absolute)
}

/// Expand `$NAME` and `${NAME}`. Unknown variables are left as written.
fn expand_vars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match std::env::var(name).ok().filter(|_| !name.is_empty()) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &after[consumed..];
    }
    out.push_str(rest);
    out
}

fn expand_user(text: &str) -> PathBuf {
    let home = || directories::UserDirs::new().map(|u| u.home_dir().to_path_buf());
    if text == "~" {
        if let Some(home) = home() {
            return home;
        }
    } else if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = home()
    {
        return home.join(rest);
    }
    PathBuf::from(text)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
