//! Accumulator for deprecation notices, warnings and deferred errors.
//!
//! Resolution never prints anything. Whatever a reporting layer should show
//! later lands here: the sources and options that were used despite being
//! deprecated, free-text warnings (deduplicated), and errors that were
//! swallowed so resolution could continue. The ledger only grows.

use indexmap::IndexSet;
use parking_lot::Mutex;

use crate::definition::Deprecation;

/// Label used in removal notices when no collection owns the option.
pub const CORE_LABEL: &str = "core";

/// An error that was recorded instead of raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredError {
    pub message: String,
    pub cause: String,
}

/// Thread-safe, append-only diagnostics shared by every resolution.
#[derive(Debug, Default)]
pub struct DeprecationLedger {
    deprecated: Mutex<Vec<(String, Deprecation)>>,
    warnings: Mutex<IndexSet<String>>,
    errors: Mutex<Vec<DeferredError>>,
}

impl DeprecationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a deprecated-usage record. Duplicates are kept.
    pub fn record_deprecated_usage(&self, identifier: &str, info: &Deprecation) {
        tracing::debug!(identifier, why = %info.why, "deprecated config source used");
        self.deprecated
            .lock()
            .push((identifier.to_string(), info.clone()));
    }

    /// Add a warning. Returns `false` if the same text was already recorded.
    pub fn record_warning(&self, text: impl Into<String>) -> bool {
        self.warnings.lock().insert(text.into())
    }

    pub fn record_error(&self, message: impl Into<String>, cause: impl ToString) {
        let error = DeferredError {
            message: message.into(),
            cause: cause.to_string(),
        };
        tracing::warn!(message = %error.message, cause = %error.cause, "deferred config error");
        self.errors.lock().push(error);
    }

    pub fn deprecated(&self) -> Vec<(String, Deprecation)> {
        self.deprecated.lock().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().iter().cloned().collect()
    }

    pub fn errors(&self) -> Vec<DeferredError> {
        self.errors.lock().clone()
    }

    /// Compose the user-facing text for a deprecation.
    ///
    /// With `include_removal`, a date-based removal wins over a version-based
    /// one; a version-based removal names `collection_name` if given, else the
    /// core distribution. Alternatives fall back from `alternatives` to
    /// `alternative` to `none`.
    pub fn format_deprecation_message(
        info: &Deprecation,
        include_removal: bool,
        collection_name: Option<&str>,
    ) -> String {
        let mut removal = String::new();
        if include_removal {
            let version = info.removed_in.as_deref().unwrap_or("");
            removal = match (&info.removed_at_date, collection_name) {
                (Some(date), _) => format!("Will be removed in a release after {date}\n\t"),
                (None, Some(collection)) => format!("Will be removed in: {collection} {version}\n\t"),
                (None, None) => format!("Will be removed in: {CORE_LABEL} {version}\n\t"),
            };
        }
        let alternatives = info
            .alternatives
            .as_deref()
            .or(info.alternative.as_deref())
            .unwrap_or("none");
        format!("Reason: {}\n\t{removal}Alternatives: {alternatives}", info.why)
    }
}
