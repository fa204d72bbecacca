//! Walk one source kind's entry list against its container.
//!
//! Entries are listed low to high precedence: the last entry with a non-null
//! value wins. Deprecated entries are recorded as soon as they supply a value,
//! even if a later entry overrides them.

use crate::definition::Entry;
use crate::ini::ConfigFile;
use crate::ledger::DeprecationLedger;
use crate::source::Source;
use crate::value::{Tagged, Value};

/// The winning value of a scan and the name of the entry that supplied it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanHit {
    pub value: Tagged,
    pub entry: String,
}

/// Scan `entries` (by `name`) against `container`.
///
/// Returns `None` if no entry matched a non-null value. Lookup failures on a
/// single entry become ledger warnings and count as no match.
pub fn scan_entries(
    container: &dyn Source,
    entries: &[Entry],
    ledger: &DeprecationLedger,
) -> Option<ScanHit> {
    let mut hit = None;

    for entry in entries {
        let Some(name) = entry.name.as_deref() else {
            continue;
        };
        let found = match container.get(name) {
            Ok(found) => found,
            Err(e) => {
                ledger.record_warning(format!("{e}, ignoring..."));
                continue;
            }
        };
        let Some(value) = found.filter(|v| !v.value.is_none()) else {
            continue;
        };

        if let Some(info) = &entry.deprecated {
            ledger.record_deprecated_usage(name, info);
        }
        hit = Some(ScanHit {
            value,
            entry: name.to_string(),
        });
    }

    hit
}

/// Scan file entries (by `section` + `key`) against a parsed config file.
///
/// Same rules as [`scan_entries`]; deprecated entries are recorded as
/// `[section]key`.
pub fn scan_file_entries(
    file: &dyn ConfigFile,
    entries: &[Entry],
    ledger: &DeprecationLedger,
) -> Option<ScanHit> {
    let mut hit = None;

    for entry in entries {
        let (section, key) = (entry.ini_section(), entry.ini_key());
        let Some(raw) = file.get_value(section, key) else {
            continue;
        };
        let id = format!("[{section}]{key}");
        if let Some(info) = &entry.deprecated {
            ledger.record_deprecated_usage(&id, info);
        }
        hit = Some(ScanHit {
            value: Tagged::from(Value::Str(raw)),
            entry: id,
        });
    }

    hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Deprecation;
    use crate::error::LookupError;
    use crate::ini::IniFile;
    use crate::source::EnvSource;
    use std::path::Path;

    fn env(pairs: &[(&str, &str)]) -> EnvSource {
        EnvSource::from_vars(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    fn dep() -> Deprecation {
        Deprecation {
            why: "old name".into(),
            ..Deprecation::default()
        }
    }

    #[test]
    fn no_match_returns_none() {
        let ledger = DeprecationLedger::new();
        let hit = scan_entries(&env(&[]), &[Entry::named("A")], &ledger);
        assert!(hit.is_none());
    }

    #[test]
    fn last_match_wins() {
        let ledger = DeprecationLedger::new();
        let entries = [Entry::named("A"), Entry::named("B")];
        let hit = scan_entries(&env(&[("A", "1"), ("B", "2")]), &entries, &ledger).unwrap();
        assert_eq!(hit.value, Value::from("2"));
        assert_eq!(hit.entry, "B");
    }

    #[test]
    fn earlier_match_kept_when_later_absent() {
        let ledger = DeprecationLedger::new();
        let entries = [Entry::named("A"), Entry::named("B")];
        let hit = scan_entries(&env(&[("A", "1")]), &entries, &ledger).unwrap();
        assert_eq!(hit.entry, "A");
    }

    #[test]
    fn deprecated_entry_recorded_even_when_overridden() {
        let ledger = DeprecationLedger::new();
        let entries = [Entry::named("OLD").deprecated(dep()), Entry::named("NEW")];
        let hit = scan_entries(&env(&[("OLD", "1"), ("NEW", "2")]), &entries, &ledger).unwrap();
        assert_eq!(hit.entry, "NEW");
        let recorded = ledger.deprecated();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "OLD");
    }

    #[test]
    fn deprecated_entry_not_recorded_without_value() {
        let ledger = DeprecationLedger::new();
        let entries = [Entry::named("OLD").deprecated(dep())];
        scan_entries(&env(&[]), &entries, &ledger);
        assert!(ledger.deprecated().is_empty());
    }

    struct Broken;

    impl Source for Broken {
        fn get(&self, key: &str) -> Result<Option<Tagged>, LookupError> {
            if key == "BAD" {
                Err(LookupError::Encoding(key.to_string()))
            } else {
                Ok(Some(Tagged::from(Value::from("ok"))))
            }
        }
    }

    #[test]
    fn encoding_error_becomes_warning_and_scan_continues() {
        let ledger = DeprecationLedger::new();
        let entries = [Entry::named("GOOD"), Entry::named("BAD")];
        let hit = scan_entries(&Broken, &entries, &ledger).unwrap();
        assert_eq!(hit.entry, "GOOD");
        let warnings = ledger.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("BAD"));
    }

    fn ini(content: &str) -> IniFile {
        IniFile::parse(content, Path::new("/etc/demo/demo.cfg")).unwrap()
    }

    #[test]
    fn file_scan_last_match_wins() {
        let ledger = DeprecationLedger::new();
        let file = ini("[defaults]\nretries = 7\n[legacy]\nretry_count = 2\n");
        let entries = [Entry::ini("defaults", "retries"), Entry::ini("legacy", "retry_count")];
        let hit = scan_file_entries(&file, &entries, &ledger).unwrap();
        assert_eq!(hit.value, Value::from("2"));
        assert_eq!(hit.entry, "[legacy]retry_count");
    }

    #[test]
    fn file_scan_records_deprecated_entry_as_section_key() {
        let ledger = DeprecationLedger::new();
        let file = ini("[defaults]\nold_retries = 1\n");
        let entries = [Entry::ini("defaults", "old_retries").deprecated(dep())];
        scan_file_entries(&file, &entries, &ledger).unwrap();
        assert_eq!(ledger.deprecated()[0].0, "[defaults]old_retries");
    }

    #[test]
    fn file_scan_missing_section_is_no_match() {
        let ledger = DeprecationLedger::new();
        let file = ini("[defaults]\nretries = 7\n");
        assert!(scan_file_entries(&file, &[Entry::ini("nope", "retries")], &ledger).is_none());
    }
}
