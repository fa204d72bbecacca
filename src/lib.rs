//! Layered, provenance-tracking option resolution for applications with
//! plugins.
//!
//! An application declares its options once, as [`OptionDefinition`]s (in
//! code or in a YAML definitions file). Each definition names its type, its
//! default, and the places a value may come from: variables, keywords,
//! command-line arguments, environment variables and keys of an INI config
//! file. A [`Resolver`] answers "what is the value of option X, and where
//! did it come from?" for the base application, for every plugin of a type,
//! or for one named plugin.
//!
//! ```ignore
//! let resolver = Resolver::builder()
//!     .app_name("myapp")
//!     .definitions_file("options.yml")
//!     .build()?;
//! let retries = resolver.get_value("RETRIES", &ResolveRequest::new())?;
//! ```
//!
//! # Precedence
//!
//! For each option, the first source that yields a value wins:
//!
//! ```text
//! Direct overrides      ResolveRequest::direct, by name then alias
//!        ↓ then
//! Variables             `vars` entries, last match wins
//!        ↓ then
//! Keywords              `keyword` entries, then the option's own name
//!        ↓ then
//! Command line          `cli` entries
//!        ↓ then
//! Environment           `env` entries, last match wins
//!        ↓ then
//! Config file           `ini` entries of the active file
//!        ↓ then
//! Default               templated against the variables when needed
//! ```
//!
//! The raw value is then coerced to the declared [`ValueType`], checked
//! against the option's choices, and tagged with its [`Origin`].
//!
//! # Provenance
//!
//! A resolved value carries a [`ProvenanceTag`] describing its origin, unless
//! the source already supplied one. The tag covers the value as a whole: the
//! elements of a list result are plain [`Value`]s and carry no tags of their
//! own.
//!
//! # Deprecations
//!
//! Using a deprecated entry or option never fails resolution. Each use is
//! recorded in the shared [`DeprecationLedger`], along with warnings such as
//! a skipped world-writable config file, for the application to report.
//!
//! # Config files
//!
//! Without an explicit path the builder looks for `{APP}_CONFIG`, then
//! `./{app}.cfg`, `~/.{app}.cfg` and `/etc/{app}/{app}.cfg`. Files are parsed
//! lazily, once per path, and shared between threads.
//!
//! # Features
//!
//! - `clap` (default): [`ConfigArgs`] subcommands and the [`ClapArgs`] source.
//! - `templating` (default): minijinja-rendered defaults.
//! - `rich-errors`: `miette::Diagnostic` on [`ResolveError`].

pub mod definition;
pub mod error;
pub mod source;
pub mod types;
pub mod value;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod coerce;
mod file;
mod ini;
mod ledger;
mod ops;
mod registry;
mod resolve;
mod scan;
mod template;

#[cfg(test)]
mod fixtures;

pub use builder::ResolverBuilder;
#[cfg(feature = "clap")]
pub use cli::{ClapArgs, ConfigArgs, ConfigSubcommand};
pub use coerce::{Coerced, Coercer, TempPath, resolve_path, unquote};
pub use definition::{
    CONFIG_FILE, Choices, DefinitionSet, Deprecation, Entry, LoadedDefinitions, OptionDefinition,
    load_definitions, parse_definitions,
};
pub use error::{CoerceError, LookupError, ResolveError};
pub use file::{ConfigFileCache, Located, load_config_file, locate_config_file, override_var};
pub use ini::{ConfigFile, IniFile};
pub use ledger::{DeferredError, DeprecationLedger};
pub use ops::{ConfigResult, DefinitionSummary, ResolvedEntry};
pub use registry::DefinitionRegistry;
pub use resolve::{ResolveRequest, Resolved, Resolver};
pub use scan::{ScanHit, scan_entries, scan_file_entries};
pub use source::{EnvSource, Source};
#[cfg(feature = "templating")]
pub use template::MiniJinjaRenderer;
pub use template::{RenderError, TemplateRenderer, is_template};
pub use types::{ConfigAction, FileFormat, Origin, Scope, ValueType};
pub use value::{Decryptable, ProvenanceTag, Secret, Tagged, Value};
