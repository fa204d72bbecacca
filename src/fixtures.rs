//! Shared definition sets for unit tests.

use crate::definition::{DefinitionSet, Deprecation, Entry, OptionDefinition};
use crate::types::ValueType;
use crate::value::Value;

pub const DEFINITIONS_YAML: &str = r#"
RETRIES:
  description: How many times to retry a failed connection.
  type: integer
  default: 3
  env:
    - name: APP_RETRIES
  ini:
    - section: defaults
      key: retries
COLOR:
  description: Output color.
  type: string
  default: yellow
  choices: [red, green, yellow]
  env:
    - name: APP_COLOR
"#;

fn set(defs: impl IntoIterator<Item = OptionDefinition>) -> DefinitionSet {
    defs.into_iter().map(|d| (d.name.clone(), d)).collect()
}

/// `RETRIES`: integer, default 3, alias `retry_count`, env `APP_RETRIES`,
/// ini `[defaults] retries`.
pub fn base_definitions() -> DefinitionSet {
    set([OptionDefinition {
        description: vec!["How many times to retry a failed connection.".into()],
        default: Value::Int(3),
        aliases: vec!["retry_count".into()],
        env: vec![Entry::named("APP_RETRIES")],
        ini: vec![Entry::ini("defaults", "retries")],
        ..OptionDefinition::new("RETRIES", ValueType::Integer)
    }])
}

/// `LEVEL`: a string with an entry in every source kind.
pub fn precedence_definitions() -> DefinitionSet {
    set([OptionDefinition {
        default: Value::from("default"),
        vars: vec![Entry::named("app_level")],
        keyword: vec![Entry::named("level_kw")],
        cli: vec![Entry::named("level")],
        env: vec![Entry::named("APP_LEVEL")],
        ini: vec![Entry::ini("defaults", "level")],
        ..OptionDefinition::new("LEVEL", ValueType::String)
    }])
}

/// `_terms`: the required terms option of lookup plugins.
pub fn lookup_type_definitions() -> DefinitionSet {
    set([OptionDefinition {
        required: true,
        ..OptionDefinition::new("_terms", ValueType::List)
    }])
}

/// Options of an ssh connection plugin.
pub fn ssh_definitions() -> DefinitionSet {
    set([
        OptionDefinition {
            default: Value::Int(10),
            env: vec![Entry::named("APP_SSH_TIMEOUT")],
            vars: vec![
                Entry::named("ssh_timeout"),
                Entry::named("connection_timeout"),
            ],
            ..OptionDefinition::new("timeout", ValueType::Integer)
        },
        OptionDefinition {
            vars: vec![Entry::named("remote_user")],
            ..OptionDefinition::new("remote_user", ValueType::String)
        },
    ])
}

/// `OLD_COLOR`: deprecated as a whole, plus a deprecated env entry.
pub fn deprecated_definitions() -> DefinitionSet {
    set([OptionDefinition {
        default: Value::from("yellow"),
        env: vec![
            Entry::named("APP_OLD_COLOUR").deprecated(Deprecation {
                why: "misspelled".into(),
                removed_in: Some("2.0".into()),
                alternatives: Some("APP_OLD_COLOR".into()),
                ..Deprecation::default()
            }),
            Entry::named("APP_OLD_COLOR"),
        ],
        deprecated: Some(Deprecation {
            why: "replaced by COLOR".into(),
            removed_in: Some("2.0".into()),
            alternatives: Some("COLOR".into()),
            ..Deprecation::default()
        }),
        ..OptionDefinition::new("OLD_COLOR", ValueType::String)
    }])
}
