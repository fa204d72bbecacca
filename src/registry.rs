//! Definition storage for every scope.
//!
//! Three tiers are kept apart: base (global) options, options shared by every
//! plugin of a type, and options of a single named plugin. Registration
//! replaces the whole set for its scope; lookups never mutate anything.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::definition::{CONFIG_FILE, DefinitionSet, Deprecation, OptionDefinition, PRIVATE_PREFIX};
use crate::error::ResolveError;
use crate::types::Scope;
use crate::value::Value;

#[derive(Debug, Default)]
struct Tiers {
    base: DefinitionSet,
    plugin_types: HashMap<String, DefinitionSet>,
    plugins: HashMap<String, HashMap<String, DefinitionSet>>,
}

impl Tiers {
    fn select(&self, scope: Scope<'_>) -> Option<&DefinitionSet> {
        match scope {
            Scope::Base => Some(&self.base),
            Scope::PluginType(kind) => self.plugin_types.get(kind),
            Scope::Plugin { kind, name } => self.plugins.get(kind)?.get(name),
        }
    }
}

/// Thread-safe registry of option definitions.
///
/// The [`CONFIG_FILE`] option is always present in the base tier.
#[derive(Debug)]
pub struct DefinitionRegistry {
    tiers: RwLock<Tiers>,
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new(DefinitionSet::new())
    }
}

impl DefinitionRegistry {
    pub fn new(base: DefinitionSet) -> Self {
        let registry = DefinitionRegistry {
            tiers: RwLock::new(Tiers::default()),
        };
        registry.set_base(base);
        registry
    }

    /// Replace the base definitions.
    pub fn set_base(&self, mut base: DefinitionSet) {
        base.entry(CONFIG_FILE.to_string())
            .or_insert_with(OptionDefinition::config_file);
        tracing::debug!(options = base.len(), "registered base definitions");
        self.tiers.write().base = base;
    }

    /// Replace the option set of plugin `name` of type `kind`.
    pub fn register(&self, kind: &str, name: &str, definitions: DefinitionSet) {
        tracing::debug!(kind, name, options = definitions.len(), "registered plugin definitions");
        self.tiers
            .write()
            .plugins
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), definitions);
    }

    /// Replace the options shared by every plugin of type `kind`.
    pub fn register_plugin_type(&self, kind: &str, definitions: DefinitionSet) {
        tracing::debug!(kind, options = definitions.len(), "registered plugin type definitions");
        self.tiers
            .write()
            .plugin_types
            .insert(kind.to_string(), definitions);
    }

    pub fn lookup(&self, option: &str, scope: Scope<'_>) -> Option<OptionDefinition> {
        self.tiers.read().select(scope)?.get(option).cloned()
    }

    /// Copy of every definition in `scope`, optionally without the
    /// private (`_Z_`-prefixed) test options. Unknown scopes are empty.
    pub fn list_definitions(&self, scope: Scope<'_>, ignore_private: bool) -> DefinitionSet {
        let tiers = self.tiers.read();
        let Some(set) = tiers.select(scope) else {
            return DefinitionSet::new();
        };
        set.iter()
            .filter(|(name, _)| !(ignore_private && name.starts_with(PRIVATE_PREFIX)))
            .map(|(name, def)| (name.clone(), def.clone()))
            .collect()
    }

    /// Whether plugin `name` of type `kind` has registered definitions.
    pub fn has(&self, kind: &str, name: &str) -> bool {
        self.tiers
            .read()
            .plugins
            .get(kind)
            .is_some_and(|named| named.contains_key(name))
    }

    /// Attribute every base deprecation to `collection`, leaving existing
    /// attributions alone. Covers whole-option deprecations and those on ini,
    /// env and vars entries.
    pub fn annotate_collection(&self, collection: &str) {
        let annotate = |info: &mut Deprecation| {
            info.collection_name
                .get_or_insert_with(|| collection.to_string());
        };
        let mut tiers = self.tiers.write();
        for def in tiers.base.values_mut() {
            if let Some(info) = def.deprecated.as_mut() {
                annotate(info);
            }
            for entry in def.sourced_entries_mut() {
                if let Some(info) = entry.deprecated.as_mut() {
                    annotate(info);
                }
            }
        }
    }

    /// The `vars` entry names declared by every option of a plugin, in order.
    pub fn plugin_vars(&self, kind: &str, name: &str) -> Vec<String> {
        let tiers = self.tiers.read();
        let Some(set) = tiers.select(Scope::plugin(kind, name)) else {
            return Vec::new();
        };
        set.values()
            .flat_map(|def| def.vars.iter().filter_map(|e| e.name.clone()))
            .collect()
    }

    /// Options of a plugin that read from the variable `var`.
    pub fn plugin_options_from_var(&self, kind: &str, name: &str, var: &str) -> Vec<String> {
        let tiers = self.tiers.read();
        let Some(set) = tiers.select(Scope::plugin(kind, name)) else {
            return Vec::new();
        };
        set.iter()
            .filter(|(_, def)| def.vars.iter().any(|e| e.name.as_deref() == Some(var)))
            .map(|(option, _)| option.clone())
            .collect()
    }

    /// The declared default of an option.
    pub fn default_value(&self, option: &str, scope: Scope<'_>) -> Result<Value, ResolveError> {
        self.lookup(option, scope)
            .map(|def| def.default)
            .ok_or_else(|| ResolveError::UndefinedConfigEntry {
                label: scope.label(option),
            })
    }
}
