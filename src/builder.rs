use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::coerce::Coercer;
use crate::definition::{DefinitionSet, load_definitions};
use crate::error::ResolveError;
use crate::file::{ConfigFileCache, locate_config_file};
use crate::ledger::DeprecationLedger;
use crate::registry::DefinitionRegistry;
use crate::resolve::Resolver;
use crate::source::{EnvSource, Source};
use crate::template::TemplateRenderer;

#[derive(Debug, Clone, Default)]
enum ConfigFileChoice {
    #[default]
    Discover,
    Path(PathBuf),
    Disabled,
}

/// Builder for a [`Resolver`].
///
/// Only [`app_name()`](Self::app_name) is required. It drives config file
/// discovery (`{APP}_CONFIG`, `./{app}.cfg`, `~/.{app}.cfg`,
/// `/etc/{app}/{app}.cfg`) and names temp-path directories.
pub struct ResolverBuilder {
    app_name: Option<String>,
    definitions: Option<DefinitionSet>,
    definitions_file: Option<PathBuf>,
    strict: bool,
    registry: Option<Arc<DefinitionRegistry>>,
    ledger: Option<Arc<DeprecationLedger>>,
    config_file: ConfigFileChoice,
    env: Option<Arc<dyn Source + Send + Sync>>,
    cli: Option<Arc<dyn Source + Send + Sync>>,
    renderer: Option<Box<dyn TemplateRenderer>>,
    templating: bool,
    exemptions: HashMap<String, Vec<String>>,
    collection: Option<String>,
}

impl ResolverBuilder {
    pub(crate) fn new() -> Self {
        let mut exemptions = HashMap::new();
        exemptions.insert("lookup".to_string(), vec!["_terms".to_string()]);
        Self {
            app_name: None,
            definitions: None,
            definitions_file: None,
            strict: true,
            registry: None,
            ledger: None,
            config_file: ConfigFileChoice::default(),
            env: None,
            cli: None,
            renderer: None,
            templating: true,
            exemptions,
            collection: None,
        }
    }

    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// Base definitions. Combined with [`definitions_file`](Self::definitions_file)
    /// if both are given, these winning on name clashes.
    pub fn definitions(mut self, definitions: DefinitionSet) -> Self {
        self.definitions = Some(definitions);
        self
    }

    /// Load base definitions from a YAML or TOML file at build time.
    pub fn definitions_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.definitions_file = Some(path.into());
        self
    }

    /// Enable or disable strict mode (default: `true`).
    /// In strict mode, unknown fields in the definitions file produce errors;
    /// otherwise they become ledger warnings.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Share an existing registry instead of creating a new one.
    pub fn registry(mut self, registry: Arc<DefinitionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share an existing ledger instead of creating a new one.
    pub fn ledger(mut self, ledger: Arc<DeprecationLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Use this config file instead of discovering one.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = ConfigFileChoice::Path(path.into());
        self
    }

    /// Resolve without any config file.
    pub fn no_config_file(mut self) -> Self {
        self.config_file = ConfigFileChoice::Disabled;
        self
    }

    /// Environment source (default: the process environment).
    pub fn env(mut self, env: impl Source + Send + Sync + 'static) -> Self {
        self.env = Some(Arc::new(env));
        self
    }

    /// Parsed command-line arguments, consulted for options with `cli` entries.
    pub fn cli_args(mut self, cli: impl Source + Send + Sync + 'static) -> Self {
        self.cli = Some(Arc::new(cli));
        self
    }

    /// Renderer for templated defaults. With the `templating` feature the
    /// default is a minijinja renderer.
    pub fn renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Leave templated defaults unrendered.
    pub fn no_templating(mut self) -> Self {
        self.templating = false;
        self.renderer = None;
        self
    }

    /// Let `option` of every plugin of type `kind` stay unresolved even when
    /// it is required. `lookup` plugins' `_terms` is exempt by default.
    pub fn required_exemption(mut self, kind: &str, option: &str) -> Self {
        self.exemptions
            .entry(kind.to_string())
            .or_default()
            .push(option.to_string());
        self
    }

    pub fn clear_required_exemptions(mut self) -> Self {
        self.exemptions.clear();
        self
    }

    /// Attribute base-definition deprecations to this collection.
    pub fn collection(mut self, name: &str) -> Self {
        self.collection = Some(name.to_string());
        self
    }

    pub fn build(self) -> Result<Resolver, ResolveError> {
        let app_name = self.app_name.ok_or(ResolveError::AppNameRequired)?;
        let ledger = self.ledger.unwrap_or_default();
        let registry = self.registry.unwrap_or_default();

        let mut base = None;
        if let Some(path) = &self.definitions_file {
            let loaded = load_definitions(path, self.strict)?;
            for warning in loaded.warnings {
                ledger.record_warning(warning);
            }
            base = Some(loaded.definitions);
        }
        if let Some(defs) = self.definitions {
            base.get_or_insert_with(DefinitionSet::new).extend(defs);
        }
        if let Some(base) = base {
            registry.set_base(base);
        }
        if let Some(collection) = &self.collection {
            registry.annotate_collection(collection);
        }

        let config_file = match self.config_file {
            ConfigFileChoice::Discover => {
                let located = locate_config_file(&app_name);
                for warning in located.warnings {
                    ledger.record_warning(warning);
                }
                located.path
            }
            ConfigFileChoice::Path(path) => Some(path),
            ConfigFileChoice::Disabled => None,
        };
        match &config_file {
            Some(path) => tracing::info!(path = %path.display(), "using config file"),
            None => tracing::info!("no config file in use"),
        }

        let renderer = match self.renderer {
            Some(renderer) => Some(renderer),
            None if self.templating => default_renderer(),
            None => None,
        };

        Ok(Resolver {
            registry,
            ledger,
            config_file,
            files: ConfigFileCache::new(),
            cli: self.cli,
            env: self.env.unwrap_or_else(|| Arc::new(EnvSource::process())),
            renderer,
            coercer: Coercer::new(&app_name),
            exemptions: self.exemptions,
            temp_paths: Default::default(),
        })
    }
}

#[cfg(feature = "templating")]
fn default_renderer() -> Option<Box<dyn TemplateRenderer>> {
    Some(Box::new(crate::template::MiniJinjaRenderer::default()))
}

#[cfg(not(feature = "templating"))]
fn default_renderer() -> Option<Box<dyn TemplateRenderer>> {
    None
}
