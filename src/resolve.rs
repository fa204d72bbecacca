//! The resolution pipeline: one option, every source, one answer.
//!
//! Sources are consulted in fixed precedence order, highest first, and the
//! first one that produces a non-null value ends the search:
//!
//! ```text
//! Direct overrides     exact name, then aliases (an explicit None counts)
//! Variables            the option's `vars` entries
//! Keywords             the option's `keyword` entries, then its name and aliases
//! CLI arguments        the option's `cli` entries
//! Environment          the option's `env` entries
//! Config file          the option's `ini` entries
//! Default              declared default, rendered if it is a template
//! ```
//!
//! The winner is then coerced to the option's type, checked against its
//! choices, recorded in the ledger if the option is deprecated, and tagged
//! with its origin.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::builder::ResolverBuilder;
use crate::coerce::{Coercer, TempPath};
use crate::definition::{CONFIG_FILE, DefinitionSet, OptionDefinition};
use crate::error::{CoerceError, ResolveError};
use crate::file::ConfigFileCache;
use crate::ledger::DeprecationLedger;
use crate::registry::DefinitionRegistry;
use crate::scan::{ScanHit, scan_entries, scan_file_entries};
use crate::source::Source;
use crate::template::{TemplateRenderer, is_template};
use crate::types::{FileFormat, Origin, Scope, ValueType};
use crate::value::{Tagged, Value};

/// Per-call inputs of a resolution. Everything is optional.
#[derive(Clone, Copy, Default)]
pub struct ResolveRequest<'a> {
    /// Config file to read instead of the resolver's active one.
    pub config_file: Option<&'a Path>,
    pub scope: Scope<'a>,
    pub keywords: Option<&'a dyn Source>,
    pub variables: Option<&'a dyn Source>,
    pub direct: Option<&'a dyn Source>,
}

impl<'a> ResolveRequest<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_file(mut self, path: &'a Path) -> Self {
        self.config_file = Some(path);
        self
    }

    pub fn scope(mut self, scope: Scope<'a>) -> Self {
        self.scope = scope;
        self
    }

    pub fn keywords(mut self, keywords: &'a dyn Source) -> Self {
        self.keywords = Some(keywords);
        self
    }

    pub fn variables(mut self, variables: &'a dyn Source) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn direct(mut self, direct: &'a dyn Source) -> Self {
        self.direct = Some(direct);
        self
    }
}

/// A resolved value and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Tagged,
    pub origin: Origin,
}

/// Resolves option values against definitions and sources.
///
/// Created with [`Resolver::builder`]. A resolver is `Send + Sync`; parsed
/// config files, the ledger and temp-path handles are shared across calls.
pub struct Resolver {
    pub(crate) registry: Arc<DefinitionRegistry>,
    pub(crate) ledger: Arc<DeprecationLedger>,
    pub(crate) config_file: Option<PathBuf>,
    pub(crate) files: ConfigFileCache,
    pub(crate) cli: Option<Arc<dyn Source + Send + Sync>>,
    pub(crate) env: Arc<dyn Source + Send + Sync>,
    pub(crate) renderer: Option<Box<dyn TemplateRenderer>>,
    pub(crate) coercer: Coercer,
    pub(crate) exemptions: HashMap<String, Vec<String>>,
    pub(crate) temp_paths: Mutex<Vec<TempPath>>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config_file", &self.config_file)
            .field("has_cli", &self.cli.is_some())
            .field("renderer", &self.renderer)
            .field("exemptions", &self.exemptions)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::new()
    }

    pub fn registry(&self) -> &Arc<DefinitionRegistry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<DeprecationLedger> {
        &self.ledger
    }

    /// The active config file, if one was found or configured.
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Resolve `option` and return only its value.
    pub fn get_value(&self, option: &str, request: &ResolveRequest<'_>) -> Result<Value, ResolveError> {
        self.resolve(option, request).map(|r| r.value.into_value())
    }

    /// Resolve `option` to its value and origin.
    pub fn resolve(&self, option: &str, request: &ResolveRequest<'_>) -> Result<Resolved, ResolveError> {
        let config_file = request.config_file.or(self.config_file.as_deref());

        if option == CONFIG_FILE {
            let path = config_file.map(|p| p.to_string_lossy().into_owned());
            return Ok(Resolved {
                value: Tagged::from(Value::from(path)),
                origin: Origin::ConfigFile,
            });
        }

        let scope = request.scope;
        let label = scope.label(option);
        let def = self
            .registry
            .lookup(option, scope)
            .ok_or_else(|| ResolveError::UndefinedConfigEntry {
                label: label.clone(),
            })?;

        let (raw, origin, format) = match self.find_value(&def, request, config_file)? {
            Some(found) => found,
            None => self.fallback(&def, request, &label)?,
        };

        let (value, origin) = self.coerce(&def, raw, &origin, format, &label)?;

        if let Some(choices) = &def.choices
            && !value.value.is_none()
        {
            let accepted = match (&def.value_type, &value.value) {
                (ValueType::List, Value::List(items)) => items.iter().all(|v| choices.contains(v)),
                (_, v) => choices.contains(v),
            };
            if !accepted {
                return Err(ResolveError::invalid_value(
                    label,
                    origin.to_string(),
                    CoerceError::InvalidChoice {
                        value: value.value.to_string(),
                        valid: choices.describe(),
                    },
                ));
            }
        }

        if let Some(info) = &def.deprecated
            && !matches!(origin, Origin::Default | Origin::Unresolved)
        {
            self.ledger.record_deprecated_usage(option, info);
        }

        let value = if value.value.is_none() {
            value
        } else {
            value.tag_if_untagged(origin.tag_description())
        };

        tracing::debug!(option, origin = %origin, "resolved config value");
        Ok(Resolved { value, origin })
    }

    /// Walk the sources from direct overrides down to the config file.
    fn find_value(
        &self,
        def: &OptionDefinition,
        request: &ResolveRequest<'_>,
        config_file: Option<&Path>,
    ) -> Result<Option<(Tagged, Origin, Option<FileFormat>)>, ResolveError> {
        let found = |hit: Option<ScanHit>, origin: fn(String) -> Origin| {
            hit.map(|h| (h.value, origin(h.entry), None))
        };

        if let Some(direct) = request.direct {
            let keys = std::iter::once(&def.name).chain(&def.aliases);
            for key in keys {
                if let Some(value) = self.lookup_key(direct, key) {
                    return Ok(Some((value, Origin::Direct, None)));
                }
            }
        }

        if let Some(variables) = request.variables
            && !def.vars.is_empty()
            && let Some(hit) = found(scan_entries(variables, &def.vars, &self.ledger), Origin::Var)
        {
            return Ok(Some(hit));
        }

        if let Some(keywords) = request.keywords {
            if !def.keyword.is_empty()
                && let Some(hit) = found(scan_entries(keywords, &def.keyword, &self.ledger), Origin::Keyword)
            {
                return Ok(Some(hit));
            }
            let keys = std::iter::once(&def.name).chain(&def.aliases);
            for key in keys {
                if let Some(value) = self.lookup_key(keywords, key)
                    && !value.value.is_none()
                {
                    return Ok(Some((value, Origin::Keyword(key.clone()), None)));
                }
            }
        }

        if let Some(cli) = &self.cli
            && !def.cli.is_empty()
            && let Some(hit) = found(scan_entries(cli.as_ref(), &def.cli, &self.ledger), Origin::Cli)
        {
            return Ok(Some(hit));
        }

        if !def.env.is_empty()
            && let Some(hit) = found(scan_entries(self.env.as_ref(), &def.env, &self.ledger), Origin::Env)
        {
            return Ok(Some(hit));
        }

        if let Some(path) = config_file {
            let format = FileFormat::from_path(path)?;
            let entries = def.file_entries(format);
            // YAML files cannot be read at all, whatever the option declares.
            if format == FileFormat::Yaml || !entries.is_empty() {
                let parsed = self.files.get_or_load(path)?;
                if let Some(hit) = scan_file_entries(parsed.as_ref(), entries, &self.ledger) {
                    return Ok(Some((hit.value, Origin::File(path.to_path_buf()), Some(format))));
                }
            }
        }

        Ok(None)
    }

    /// Presence lookup that turns lookup errors into ledger warnings.
    fn lookup_key(&self, container: &dyn Source, key: &str) -> Option<Tagged> {
        match container.get(key) {
            Ok(found) => found,
            Err(e) => {
                self.ledger.record_warning(format!("{e}, ignoring..."));
                None
            }
        }
    }

    /// No source had a value: required check, then the (templated) default.
    fn fallback(
        &self,
        def: &OptionDefinition,
        request: &ResolveRequest<'_>,
        label: &str,
    ) -> Result<(Tagged, Origin, Option<FileFormat>), ResolveError> {
        if def.required {
            let exempt = request.scope.plugin_type().is_some_and(|kind| {
                self.exemptions
                    .get(kind)
                    .is_some_and(|names| names.iter().any(|n| *n == def.name))
            });
            if !exempt {
                return Err(ResolveError::RequiredOptionMissing {
                    label: label.to_string(),
                });
            }
            return Ok((Tagged::default(), Origin::Unresolved, None));
        }

        let mut default = def.default.clone();
        if let (Some(variables), Some(renderer)) = (request.variables, &self.renderer)
            && is_template(&default)
            && let Some(template) = default.as_str().map(str::to_owned)
        {
            match renderer.render(&template, &variables.snapshot()) {
                Ok(rendered) => default = rendered,
                Err(e) => self
                    .ledger
                    .record_error(format!("Failed to template default for config {label}."), e),
            }
        }
        Ok((Tagged::from(default), Origin::Default, None))
    }

    /// Coerce to the declared type, with the empty-env-var retry.
    fn coerce(
        &self,
        def: &OptionDefinition,
        raw: Tagged,
        origin: &Origin,
        format: Option<FileFormat>,
        label: &str,
    ) -> Result<(Tagged, Origin), ResolveError> {
        let empty_env = origin.is_env() && raw.value.as_str() == Some("");
        let origin_text = origin.to_string();

        match self
            .coercer
            .ensure_type(raw, def.value_type, Some(&origin_text), format)
        {
            Ok(coerced) => Ok((self.keep_temp(coerced.value, coerced.temp_dir), origin.clone())),
            Err(CoerceError::InvalidValue { .. }) if empty_env => {
                let default = Tagged::from(def.default.clone());
                let coerced = self
                    .coercer
                    .ensure_type(default, def.value_type, Some("default"), format)
                    .map_err(|e| self.coerce_error(def, label, &Origin::Default, e))?;
                Ok((self.keep_temp(coerced.value, coerced.temp_dir), Origin::Default))
            }
            Err(e) => Err(self.coerce_error(def, label, origin, e)),
        }
    }

    fn coerce_error(&self, def: &OptionDefinition, label: &str, origin: &Origin, e: CoerceError) -> ResolveError {
        match e {
            CoerceError::TempDir { .. } => ResolveError::Unhandled {
                name: def.name.clone(),
                source: Box::new(e),
            },
            other => ResolveError::invalid_value(label.to_string(), origin.to_string(), other),
        }
    }

    fn keep_temp(&self, value: Tagged, temp: Option<TempPath>) -> Tagged {
        if let Some(temp) = temp {
            self.temp_paths.lock().push(temp);
        }
        value
    }

    /// Delete every temp-path directory created so far. Returns how many.
    pub fn release_temp_paths(&self) -> usize {
        let released: Vec<TempPath> = std::mem::take(&mut *self.temp_paths.lock());
        let count = released.len();
        drop(released);
        count
    }

    /// Resolve every option of plugin `name` of type `kind`. The request's
    /// scope is replaced by the plugin scope.
    pub fn get_plugin_options(
        &self,
        kind: &str,
        name: &str,
        request: &ResolveRequest<'_>,
    ) -> Result<IndexMap<String, Value>, ResolveError> {
        let scope = Scope::plugin(kind, name);
        let request = ResolveRequest { scope, ..*request };
        self.registry
            .list_definitions(scope, false)
            .keys()
            .map(|option| Ok((option.clone(), self.get_value(option, &request)?)))
            .collect()
    }

    /// Every variable name a plugin's options read from.
    pub fn get_plugin_vars(&self, kind: &str, name: &str) -> Vec<String> {
        self.registry.plugin_vars(kind, name)
    }

    /// Names of a plugin's options that read from variable `var`.
    pub fn get_plugin_options_from_var(&self, kind: &str, name: &str, var: &str) -> Vec<String> {
        self.registry.plugin_options_from_var(kind, name, var)
    }

    /// The declared default of an option, unresolved and uncoerced.
    pub fn get_config_default(&self, option: &str, scope: Scope<'_>) -> Result<Value, ResolveError> {
        self.registry.default_value(option, scope)
    }

    /// Every definition in `scope`, without private test options.
    pub fn list_definitions(&self, scope: Scope<'_>) -> DefinitionSet {
        self.registry.list_definitions(scope, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Choices, Deprecation, Entry};
    use crate::fixtures;
    use crate::source::EnvSource;
    use std::fs;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> EnvSource {
        EnvSource::from_vars(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    fn resolver(defs: DefinitionSet, env_pairs: &[(&str, &str)]) -> Resolver {
        Resolver::builder()
            .app_name("demo")
            .definitions(defs)
            .no_config_file()
            .env(env(env_pairs))
            .build()
            .unwrap()
    }

    fn with_file(defs: DefinitionSet, env_pairs: &[(&str, &str)], path: &Path) -> Resolver {
        Resolver::builder()
            .app_name("demo")
            .definitions(defs)
            .config_file(path)
            .env(env(env_pairs))
            .build()
            .unwrap()
    }

    fn map(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn single(name: &str, def: OptionDefinition) -> DefinitionSet {
        let mut defs = DefinitionSet::new();
        defs.insert(name.to_string(), OptionDefinition { name: name.into(), ..def });
        defs
    }

    // --- end to end ---

    #[test]
    fn env_outranks_config_file() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("demo.cfg");
        fs::write(&cfg, "[defaults]\nretries = 7\n").unwrap();

        let r = with_file(fixtures::base_definitions(), &[], &cfg);
        let got = r.resolve("RETRIES", &ResolveRequest::new()).unwrap();
        assert_eq!(got.value, Value::Int(7));
        assert_eq!(got.origin, Origin::File(cfg.clone()));
        assert_eq!(got.origin.to_string(), cfg.display().to_string());

        let r = with_file(fixtures::base_definitions(), &[("APP_RETRIES", "10")], &cfg);
        let got = r.resolve("RETRIES", &ResolveRequest::new()).unwrap();
        assert_eq!(got.value, Value::Int(10));
        assert_eq!(got.origin.to_string(), "env: APP_RETRIES");
    }

    #[test]
    fn default_fallback() {
        let r = resolver(fixtures::base_definitions(), &[]);
        let got = r.resolve("RETRIES", &ResolveRequest::new()).unwrap();
        assert_eq!(got.value, Value::Int(3));
        assert_eq!(got.origin, Origin::Default);
        assert_eq!(got.value.tag.unwrap().description, "<Config default>");
    }

    #[test]
    fn full_precedence_ladder() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("demo.cfg");
        fs::write(&cfg, "[defaults]\nlevel = file\n").unwrap();
        let defs = fixtures::precedence_definitions();

        let cli = map(&[("level", Value::from("cli"))]);
        let env_pairs = [("APP_LEVEL", "env")];
        let r = Resolver::builder()
            .app_name("demo")
            .definitions(defs)
            .config_file(&cfg)
            .env(env(&env_pairs))
            .cli_args(cli)
            .build()
            .unwrap();

        let direct = map(&[("LEVEL", Value::from("direct"))]);
        let vars = map(&[("app_level", Value::from("var"))]);
        let keys = map(&[("level_kw", Value::from("keyword"))]);

        let full = ResolveRequest::new().direct(&direct).variables(&vars).keywords(&keys);
        let get = |req: &ResolveRequest<'_>| r.resolve("LEVEL", req).unwrap().origin.to_string();

        assert_eq!(get(&full), "Direct");
        assert_eq!(get(&ResolveRequest::new().variables(&vars).keywords(&keys)), "var: app_level");
        assert_eq!(get(&ResolveRequest::new().keywords(&keys)), "keyword: level_kw");
        assert_eq!(get(&ResolveRequest::new()), "cli: level");
    }

    #[test]
    fn env_and_file_when_cli_absent() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("demo.cfg");
        fs::write(&cfg, "[defaults]\nlevel = file\n").unwrap();

        let r = with_file(fixtures::precedence_definitions(), &[("APP_LEVEL", "env")], &cfg);
        let got = r.resolve("LEVEL", &ResolveRequest::new()).unwrap();
        assert_eq!(got.origin.to_string(), "env: APP_LEVEL");

        let r = with_file(fixtures::precedence_definitions(), &[], &cfg);
        let got = r.resolve("LEVEL", &ResolveRequest::new()).unwrap();
        assert_eq!(got.value, Value::from("file"));
    }

    #[test]
    fn last_env_entry_wins() {
        let def = OptionDefinition {
            env: vec![Entry::named("A"), Entry::named("B")],
            ..OptionDefinition::new("X", ValueType::String)
        };
        let r = resolver(single("X", def), &[("A", "a"), ("B", "b")]);
        let got = r.resolve("X", &ResolveRequest::new()).unwrap();
        assert_eq!(got.value, Value::from("b"));
        assert_eq!(got.origin, Origin::Env("B".into()));
    }

    // --- direct and keywords ---

    #[test]
    fn direct_none_short_circuits() {
        let r = resolver(fixtures::base_definitions(), &[("APP_RETRIES", "10")]);
        let direct = map(&[("RETRIES", Value::None)]);
        let got = r.resolve("RETRIES", &ResolveRequest::new().direct(&direct)).unwrap();
        assert!(got.value.value.is_none());
        assert!(!got.value.is_tagged());
        assert_eq!(got.origin, Origin::Direct);
    }

    #[test]
    fn direct_alias() {
        let r = resolver(fixtures::base_definitions(), &[]);
        let direct = map(&[("retry_count", Value::Int(9))]);
        let got = r.resolve("RETRIES", &ResolveRequest::new().direct(&direct)).unwrap();
        assert_eq!(got.value, Value::Int(9));
        assert_eq!(got.origin, Origin::Direct);
    }

    #[test]
    fn implicit_keyword_by_name_then_alias() {
        let r = resolver(fixtures::base_definitions(), &[]);
        let by_alias = map(&[("retry_count", Value::from("4"))]);
        let got = r.resolve("RETRIES", &ResolveRequest::new().keywords(&by_alias)).unwrap();
        assert_eq!(got.value, Value::Int(4));
        assert_eq!(got.origin.to_string(), "keyword: retry_count");

        let both = map(&[("retry_count", Value::from("4")), ("RETRIES", Value::from("5"))]);
        let got = r.resolve("RETRIES", &ResolveRequest::new().keywords(&both)).unwrap();
        assert_eq!(got.origin.to_string(), "keyword: RETRIES");
    }

    #[test]
    fn variables_ignored_without_vars_entries() {
        let r = resolver(fixtures::base_definitions(), &[]);
        let vars = map(&[("RETRIES", Value::Int(99))]);
        let got = r.resolve("RETRIES", &ResolveRequest::new().variables(&vars)).unwrap();
        assert_eq!(got.origin, Origin::Default);
    }

    // --- failures ---

    #[test]
    fn undefined_option() {
        let r = resolver(fixtures::base_definitions(), &[]);
        let err = r
            .resolve("timeout", &ResolveRequest::new().scope(Scope::plugin("connection", "ssh")))
            .unwrap_err();
        match err {
            ResolveError::UndefinedConfigEntry { label } => {
                assert_eq!(label, "'timeout' for 'ssh' connection plugin")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn required_missing() {
        let def = OptionDefinition {
            required: true,
            ..OptionDefinition::new("TOKEN", ValueType::String)
        };
        let r = resolver(single("TOKEN", def), &[]);
        assert!(matches!(
            r.resolve("TOKEN", &ResolveRequest::new()),
            Err(ResolveError::RequiredOptionMissing { .. })
        ));
    }

    #[test]
    fn required_exemption_for_lookup_terms() {
        let r = resolver(DefinitionSet::new(), &[]);
        r.registry().register("lookup", "file", fixtures::lookup_type_definitions());
        let scope = Scope::plugin("lookup", "file");
        let got = r.resolve("_terms", &ResolveRequest::new().scope(scope)).unwrap();
        assert!(got.value.value.is_none());
        assert_eq!(got.origin, Origin::Unresolved);
        assert!(r.ledger().deprecated().is_empty());

        r.registry().register("filter", "file", fixtures::lookup_type_definitions());
        let scope = Scope::plugin("filter", "file");
        assert!(matches!(
            r.resolve("_terms", &ResolveRequest::new().scope(scope)),
            Err(ResolveError::RequiredOptionMissing { .. })
        ));
    }

    #[test]
    fn invalid_type_reports_origin() {
        let r = resolver(fixtures::base_definitions(), &[("APP_RETRIES", "many")]);
        match r.resolve("RETRIES", &ResolveRequest::new()).unwrap_err() {
            ResolveError::InvalidOptionValue { origin, source, .. } => {
                assert_eq!(origin, "env: APP_RETRIES");
                assert!(matches!(source, CoerceError::InvalidValue { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_env_falls_back_to_default() {
        let def = OptionDefinition {
            default: Value::Int(5),
            env: vec![Entry::named("APP_WORKERS")],
            ..OptionDefinition::new("WORKERS", ValueType::Integer)
        };
        let r = resolver(single("WORKERS", def), &[("APP_WORKERS", "")]);
        let got = r.resolve("WORKERS", &ResolveRequest::new()).unwrap();
        assert_eq!(got.value, Value::Int(5));
        assert_eq!(got.origin, Origin::Default);
    }

    #[test]
    fn empty_string_from_file_is_still_an_error() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("demo.cfg");
        fs::write(&cfg, "[defaults]\nretries =\n").unwrap();
        let r = with_file(fixtures::base_definitions(), &[], &cfg);
        assert!(matches!(
            r.resolve("RETRIES", &ResolveRequest::new()),
            Err(ResolveError::InvalidOptionValue { .. })
        ));
    }

    // --- choices ---

    fn mode_def(value_type: ValueType) -> DefinitionSet {
        let def = OptionDefinition {
            default: Value::from("a"),
            choices: Some(Choices::List(vec![Value::from("a"), Value::from("b")])),
            env: vec![Entry::named("APP_MODE")],
            ..OptionDefinition::new("MODE", value_type)
        };
        single("MODE", def)
    }

    #[test]
    fn choice_rejected_with_valid_values() {
        let r = resolver(mode_def(ValueType::String), &[("APP_MODE", "c")]);
        let err = r.resolve("MODE", &ResolveRequest::new()).unwrap_err();
        assert!(matches!(
            &err,
            ResolveError::InvalidOptionValue {
                source: CoerceError::InvalidChoice { .. },
                ..
            }
        ));
        assert_eq!(err.help_text(), Some("Valid values are: a, b"));
    }

    #[test]
    fn list_choices_check_every_element() {
        let r = resolver(mode_def(ValueType::List), &[("APP_MODE", "a, b")]);
        assert!(r.resolve("MODE", &ResolveRequest::new()).is_ok());

        let r = resolver(mode_def(ValueType::List), &[("APP_MODE", "a, c")]);
        assert!(r.resolve("MODE", &ResolveRequest::new()).is_err());
    }

    #[test]
    fn boolean_choices_are_plain_membership() {
        let def = OptionDefinition {
            default: Value::Bool(false),
            choices: Some(Choices::List(vec![Value::Bool(true)])),
            ..OptionDefinition::new("FLAG", ValueType::Boolean)
        };
        let r = resolver(single("FLAG", def), &[]);
        assert!(r.resolve("FLAG", &ResolveRequest::new()).is_err());
    }

    // --- deprecation ---

    fn deprecated_def() -> DefinitionSet {
        let def = OptionDefinition {
            default: Value::from("x"),
            env: vec![Entry::named("APP_OLD")],
            deprecated: Some(Deprecation {
                why: "superseded".into(),
                ..Deprecation::default()
            }),
            ..OptionDefinition::new("OLD", ValueType::String)
        };
        single("OLD", def)
    }

    #[test]
    fn deprecated_option_recorded_once_when_not_default() {
        let r = resolver(deprecated_def(), &[("APP_OLD", "y")]);
        r.resolve("OLD", &ResolveRequest::new()).unwrap();
        let recorded = r.ledger().deprecated();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "OLD");
    }

    #[test]
    fn deprecated_option_not_recorded_from_default() {
        let r = resolver(deprecated_def(), &[]);
        r.resolve("OLD", &ResolveRequest::new()).unwrap();
        assert!(r.ledger().deprecated().is_empty());
    }

    // --- CONFIG_FILE ---

    #[test]
    fn config_file_short_circuits() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("demo.cfg");
        fs::write(&cfg, "[defaults]\nconfig_file = /elsewhere.cfg\n").unwrap();

        let def = OptionDefinition {
            env: vec![Entry::named("APP_CONFIG_FILE")],
            ini: vec![Entry::ini("defaults", "config_file")],
            ..OptionDefinition::config_file()
        };
        let r = with_file(single(CONFIG_FILE, def), &[("APP_CONFIG_FILE", "/env.cfg")], &cfg);
        let got = r.resolve(CONFIG_FILE, &ResolveRequest::new()).unwrap();
        assert_eq!(got.value, Value::from(cfg.to_string_lossy().into_owned()));
        assert_eq!(got.origin.to_string(), "");
        assert!(!r.files.is_loaded(&cfg));

        let none = resolver(DefinitionSet::new(), &[]);
        let got = none.resolve(CONFIG_FILE, &ResolveRequest::new()).unwrap();
        assert!(got.value.value.is_none());
    }

    // --- config file handling ---

    #[test]
    fn file_is_parsed_only_when_reached() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("demo.cfg");
        fs::write(&cfg, "[defaults]\nretries = 7\n").unwrap();
        let r = with_file(fixtures::base_definitions(), &[("APP_RETRIES", "1")], &cfg);
        r.resolve("RETRIES", &ResolveRequest::new()).unwrap();
        assert!(!r.files.is_loaded(&cfg));
    }

    #[test]
    fn request_can_target_another_file() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("main.cfg");
        let other = dir.path().join("other.ini");
        fs::write(&main, "[defaults]\nretries = 1\n").unwrap();
        fs::write(&other, "[defaults]\nretries = 2\n").unwrap();
        let r = with_file(fixtures::base_definitions(), &[], &main);
        let got = r.resolve("RETRIES", &ResolveRequest::new().config_file(&other)).unwrap();
        assert_eq!(got.value, Value::Int(2));
    }

    #[test]
    fn yaml_config_file_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("demo.yml");
        fs::write(&cfg, "retries: 7\n").unwrap();
        let mut defs = fixtures::base_definitions();
        if let Some(def) = defs.get_mut("RETRIES") {
            def.yaml = vec![Entry::named("retries")];
        }
        let r = with_file(defs, &[], &cfg);
        assert!(matches!(
            r.resolve("RETRIES", &ResolveRequest::new()),
            Err(ResolveError::UnsupportedConfigType { .. })
        ));
    }

    #[test]
    fn yaml_config_file_fails_options_without_yaml_entries() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("demo.yaml");
        fs::write(&cfg, "retries: 7\n").unwrap();
        let r = with_file(fixtures::base_definitions(), &[], &cfg);
        assert!(matches!(
            r.resolve("RETRIES", &ResolveRequest::new()),
            Err(ResolveError::UnsupportedConfigType { .. })
        ));

        let r = with_file(fixtures::base_definitions(), &[("APP_RETRIES", "4")], &cfg);
        assert_eq!(r.get_value("RETRIES", &ResolveRequest::new()).unwrap(), Value::Int(4));
    }

    #[test]
    fn ini_values_are_unquoted() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("demo.cfg");
        fs::write(&cfg, "[defaults]\nlevel = \"quoted\"\n").unwrap();
        let r = with_file(fixtures::precedence_definitions(), &[], &cfg);
        assert_eq!(
            r.get_value("LEVEL", &ResolveRequest::new()).unwrap(),
            Value::from("quoted")
        );
    }

    #[test]
    fn relative_paths_resolve_against_config_file() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("demo.cfg");
        fs::write(&cfg, "[defaults]\nroles_path = roles\n").unwrap();
        let def = OptionDefinition {
            ini: vec![Entry::ini("defaults", "roles_path")],
            ..OptionDefinition::new("ROLES", ValueType::Path)
        };
        let r = with_file(single("ROLES", def), &[], &cfg);
        let got = r.get_value("ROLES", &ResolveRequest::new()).unwrap();
        assert_eq!(got, Value::from(dir.path().join("roles").to_string_lossy().into_owned()));
    }

    // --- provenance ---

    #[test]
    fn existing_tag_is_kept() {
        let r = resolver(fixtures::base_definitions(), &[]);
        let mut direct: HashMap<String, Tagged> = HashMap::new();
        direct.insert("RETRIES".into(), Tagged::new("8", "inventory"));
        let got = r.resolve("RETRIES", &ResolveRequest::new().direct(&direct)).unwrap();
        assert_eq!(got.value, Value::Int(8));
        assert_eq!(got.value.tag.unwrap().description, "inventory");
    }

    #[test]
    fn untagged_value_gets_origin_tag() {
        let r = resolver(fixtures::base_definitions(), &[("APP_RETRIES", "2")]);
        let got = r.resolve("RETRIES", &ResolveRequest::new()).unwrap();
        assert_eq!(got.value.tag.unwrap().description, "<Config env: APP_RETRIES>");
    }

    // --- templating ---

    #[cfg(feature = "templating")]
    #[test]
    fn templated_default_rendered_with_variables() {
        let def = OptionDefinition {
            default: Value::from("{{ base ~ '/cache' }}"),
            ..OptionDefinition::new("CACHE", ValueType::String)
        };
        let r = resolver(single("CACHE", def), &[]);

        let vars = map(&[("base", Value::from("/srv"))]);
        let got = r.get_value("CACHE", &ResolveRequest::new().variables(&vars)).unwrap();
        assert_eq!(got, Value::from("/srv/cache"));

        let raw = r.get_value("CACHE", &ResolveRequest::new()).unwrap();
        assert_eq!(raw, Value::from("{{ base ~ '/cache' }}"));
    }

    #[cfg(feature = "templating")]
    #[test]
    fn template_failure_is_deferred() {
        let def = OptionDefinition {
            default: Value::from("{{ missing }}"),
            ..OptionDefinition::new("CACHE", ValueType::String)
        };
        let r = resolver(single("CACHE", def), &[]);
        let vars = map(&[]);
        let got = r.get_value("CACHE", &ResolveRequest::new().variables(&vars)).unwrap();
        assert_eq!(got, Value::from("{{ missing }}"));
        let errors = r.ledger().errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("'CACHE'"));
    }

    // --- temp paths ---

    #[test]
    fn temp_paths_live_until_released() {
        let root = TempDir::new().unwrap();
        let def = OptionDefinition {
            default: Value::from(root.path().join("tmp").to_string_lossy().into_owned()),
            ..OptionDefinition::new("LOCAL_TMP", ValueType::TempPath)
        };
        let r = resolver(single("LOCAL_TMP", def), &[]);

        let first = r.get_value("LOCAL_TMP", &ResolveRequest::new()).unwrap();
        let second = r.get_value("LOCAL_TMP", &ResolveRequest::new()).unwrap();
        assert_ne!(first, second);
        let first = PathBuf::from(first.as_str().unwrap());
        assert!(first.is_dir());

        assert_eq!(r.release_temp_paths(), 2);
        assert!(!first.exists());
    }

    // --- plugin helpers ---

    #[test]
    fn plugin_options_resolved_in_plugin_scope() {
        let r = resolver(fixtures::base_definitions(), &[("APP_SSH_TIMEOUT", "30")]);
        r.registry().register("connection", "ssh", fixtures::ssh_definitions());

        let vars = map(&[("remote_user", Value::from("deploy"))]);
        let opts = r
            .get_plugin_options("connection", "ssh", &ResolveRequest::new().variables(&vars))
            .unwrap();
        assert_eq!(opts["timeout"], Value::Int(30));
        assert_eq!(opts["remote_user"], Value::from("deploy"));

        assert_eq!(
            r.get_plugin_options_from_var("connection", "ssh", "ssh_timeout"),
            ["timeout"]
        );
        assert_eq!(r.get_plugin_vars("connection", "ssh").len(), 3);
        assert_eq!(
            r.get_config_default("timeout", Scope::plugin("connection", "ssh")).unwrap(),
            Value::Int(10)
        );
    }

    #[test]
    fn encoding_errors_become_warnings() {
        struct Broken;
        impl Source for Broken {
            fn get(&self, key: &str) -> Result<Option<Tagged>, crate::error::LookupError> {
                Err(crate::error::LookupError::Encoding(key.into()))
            }
        }
        let r = resolver(fixtures::base_definitions(), &[]);
        let got = r.resolve("RETRIES", &ResolveRequest::new().direct(&Broken)).unwrap();
        assert_eq!(got.origin, Origin::Default);
        assert!(!r.ledger().warnings().is_empty());
    }

    #[test]
    fn resolver_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Resolver>();
    }
}
