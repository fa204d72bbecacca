//! Rendering of templated defaults.
//!
//! A default such as `"{{ base_dir }}/cache"` is rendered against the
//! variables supplied for the resolution. Only strings that start with `{{`
//! and end with `}}` are treated as templates.

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;

use crate::value::Value;

pub type RenderError = Box<dyn Error + Send + Sync>;

/// Renders a template string against a set of variables.
pub trait TemplateRenderer: fmt::Debug + Send + Sync {
    fn render(&self, template: &str, variables: &IndexMap<String, Value>) -> Result<Value, RenderError>;
}

/// Whether `value` looks like a template expression.
pub fn is_template(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.starts_with("{{") && s.ends_with("}}"))
}

/// [`TemplateRenderer`] backed by `minijinja`. Undefined variables are errors.
#[cfg(feature = "templating")]
#[derive(Debug)]
pub struct MiniJinjaRenderer {
    env: minijinja::Environment<'static>,
}

#[cfg(feature = "templating")]
impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        let mut env = minijinja::Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        MiniJinjaRenderer { env }
    }
}

#[cfg(feature = "templating")]
impl TemplateRenderer for MiniJinjaRenderer {
    fn render(&self, template: &str, variables: &IndexMap<String, Value>) -> Result<Value, RenderError> {
        let rendered = self.env.render_str(template, variables)?;
        Ok(Value::Str(rendered))
    }
}
