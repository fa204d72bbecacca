//! Clap adapter for layerconf.
//!
//! Compiled only when the `clap` Cargo feature is enabled (on by default).
//! It provides two things:
//!
//! - [`ConfigArgs`] / [`ConfigSubcommand`], derive types to embed in an
//!   application's parser for `config list|dump|get|view`.
//! - [`ClapArgs`], which exposes parsed [`ArgMatches`] as a [`Source`] so
//!   options with `cli` entries can read from the command line.
//!
//! Applications on another parser skip this module and build
//! [`ConfigAction`] values and their own [`Source`] directly.

use clap::parser::{MatchesError, ValueSource};
use clap::{ArgMatches, Args, Subcommand};

use crate::error::LookupError;
use crate::source::Source;
use crate::types::ConfigAction;
use crate::value::{Tagged, Value};

/// Clap-derived args for the `config` subcommand group.
///
/// ```ignore
/// #[derive(Subcommand)]
/// enum Commands {
///     Config(ConfigArgs),
/// }
/// ```
#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigSubcommand>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// List every option with its type, default and description.
    List,
    /// Show every option's resolved value and where it came from.
    Dump {
        /// Hide options still at their default.
        #[arg(long)]
        only_changed: bool,
    },
    /// Show the resolved value and description of one option.
    Get {
        /// Option name (e.g. "RETRIES").
        key: String,
    },
    /// Print the active config file.
    View,
}

impl ConfigArgs {
    /// Bare `config` and `config list` both map to [`ConfigAction::List`].
    pub fn into_action(self) -> ConfigAction {
        match self.action {
            None | Some(ConfigSubcommand::List) => ConfigAction::List,
            Some(ConfigSubcommand::Dump { only_changed }) => ConfigAction::Dump { only_changed },
            Some(ConfigSubcommand::Get { key }) => ConfigAction::Get { key },
            Some(ConfigSubcommand::View) => ConfigAction::View,
        }
    }
}

/// Parsed command-line arguments as a [`Source`].
///
/// Keys are clap argument ids. Arguments that were not given on the command
/// line (or through clap's own env support) are absent, so a clap-side
/// default never shadows the option's own default.
#[derive(Debug, Clone)]
pub struct ClapArgs(ArgMatches);

impl ClapArgs {
    pub fn new(matches: ArgMatches) -> Self {
        ClapArgs(matches)
    }
}

impl From<ArgMatches> for ClapArgs {
    fn from(matches: ArgMatches) -> Self {
        ClapArgs(matches)
    }
}

impl ClapArgs {
    fn read(&self, key: &str) -> Result<Value, MatchesError> {
        match self.0.try_get_one::<bool>(key) {
            Ok(Some(b)) => return Ok(Value::Bool(*b)),
            Ok(None) => return Ok(Value::None),
            Err(MatchesError::Downcast { .. }) => {}
            Err(e) => return Err(e),
        }
        match self.0.try_get_one::<i64>(key) {
            Ok(Some(i)) => return Ok(Value::Int(*i)),
            Ok(None) => return Ok(Value::None),
            Err(MatchesError::Downcast { .. }) => {}
            Err(e) => return Err(e),
        }
        let Some(values) = self.0.try_get_many::<String>(key)? else {
            return Ok(Value::None);
        };
        let mut values: Vec<Value> = values.map(|s| Value::from(s.as_str())).collect();
        Ok(match values.len() {
            1 => values.remove(0),
            _ => Value::List(values),
        })
    }
}

impl Source for ClapArgs {
    fn get(&self, key: &str) -> Result<Option<Tagged>, LookupError> {
        if !matches!(self.0.try_contains_id(key), Ok(true)) {
            return Ok(None);
        }
        if matches!(self.0.value_source(key), Some(ValueSource::DefaultValue) | None) {
            return Ok(None);
        }
        self.read(key)
            .map(|value| Some(Tagged::from(value)))
            .map_err(|e| LookupError::Argument {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}
