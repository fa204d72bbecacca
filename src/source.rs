//! Key-lookup containers that values are read from.
//!
//! Every source kind (variables, keywords, direct overrides, CLI arguments,
//! the environment) is just something that answers "what is the value for
//! this key?". Maps implement [`Source`] directly; [`EnvSource`] wraps the
//! process environment, or a fixed set of pairs so tests never touch the real
//! one.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use indexmap::IndexMap;

use crate::error::LookupError;
use crate::value::{Tagged, Value};

/// A mapping-like container consulted during resolution.
pub trait Source {
    /// Look up `key`. `Ok(None)` means the key is absent; a present key may
    /// still hold [`Value::None`].
    fn get(&self, key: &str) -> Result<Option<Tagged>, LookupError>;

    /// Every key/value pair, for rendering templates against. Containers that
    /// cannot enumerate return an empty map.
    fn snapshot(&self) -> IndexMap<String, Value> {
        IndexMap::new()
    }
}

impl<S: BuildHasher> Source for HashMap<String, Value, S> {
    fn get(&self, key: &str) -> Result<Option<Tagged>, LookupError> {
        Ok(HashMap::get(self, key).cloned().map(Tagged::from))
    }

    fn snapshot(&self) -> IndexMap<String, Value> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl<S: BuildHasher> Source for HashMap<String, Tagged, S> {
    fn get(&self, key: &str) -> Result<Option<Tagged>, LookupError> {
        Ok(HashMap::get(self, key).cloned())
    }

    fn snapshot(&self) -> IndexMap<String, Value> {
        self.iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }
}

impl<S: BuildHasher> Source for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Result<Option<Tagged>, LookupError> {
        Ok(HashMap::get(self, key).map(|s| Tagged::from(Value::from(s.as_str()))))
    }

    fn snapshot(&self) -> IndexMap<String, Value> {
        self.iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect()
    }
}

impl Source for IndexMap<String, Value> {
    fn get(&self, key: &str) -> Result<Option<Tagged>, LookupError> {
        Ok(IndexMap::get(self, key).cloned().map(Tagged::from))
    }

    fn snapshot(&self) -> IndexMap<String, Value> {
        self.clone()
    }
}

impl Source for BTreeMap<String, Value> {
    fn get(&self, key: &str) -> Result<Option<Tagged>, LookupError> {
        Ok(BTreeMap::get(self, key).cloned().map(Tagged::from))
    }

    fn snapshot(&self) -> IndexMap<String, Value> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// The environment as a [`Source`].
///
/// [`EnvSource::process`] reads the live process environment; values that are
/// not valid UTF-8 produce [`LookupError::Encoding`].
/// [`EnvSource::from_vars`] holds a fixed set of pairs.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    fixed: Option<HashMap<String, String>>,
}

impl EnvSource {
    pub fn process() -> Self {
        EnvSource { fixed: None }
    }

    /// Takes an iterator so tests can pass synthetic data instead of `std::env::vars()`.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        EnvSource {
            fixed: Some(vars.into_iter().collect()),
        }
    }
}

impl Source for EnvSource {
    fn get(&self, key: &str) -> Result<Option<Tagged>, LookupError> {
        if let Some(fixed) = &self.fixed {
            return Ok(fixed.get(key).map(|v| Tagged::from(Value::from(v.as_str()))));
        }
        match std::env::var(key) {
            Ok(v) => Ok(Some(Tagged::from(Value::Str(v)))),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(LookupError::Encoding(key.to_string())),
        }
    }

    fn snapshot(&self) -> IndexMap<String, Value> {
        match &self.fixed {
            Some(fixed) => fixed
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect(),
            None => std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, Value::Str(v.into_string().ok()?))))
                .collect(),
        }
    }
}
