//! Override resolution for per-feature text and icon tables.

use crate::error::{PresenceError, Result};
use crate::settings::{ModuleData, OverrideTable, DEFAULT_KEY};

/// Effective text and icon for one feature identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub text: String,
    pub icon: String,
    /// The default entry's icon when the chain bottomed out at the
    /// identifier itself. Used as the alternative asset candidate.
    pub fallback_icon: Option<String>,
    /// The record the values came from (specific entry, else default).
    pub record: ModuleData,
}

/// Resolve `key` against `table`.
///
/// Text: specific entry, then the default entry, then empty.
/// Icon: specific entry, then the default entry if a specific entry exists,
/// then `key` itself. When no specific entry exists, the default icon is
/// handed back as `fallback_icon` instead.
pub fn resolve(table: &OverrideTable, key: &str, table_name: &str) -> Result<Resolved> {
    let default = table
        .get(DEFAULT_KEY)
        .ok_or_else(|| PresenceError::MissingDefault {
            table: table_name.to_string(),
        })?;
    Ok(resolve_with_default(table.get(key), default, key))
}

/// Like [`resolve`], but a missing default entry is logged and treated as an
/// empty record.
pub fn resolve_or_log(table: &OverrideTable, key: &str, table_name: &str) -> Resolved {
    match resolve(table, key, table_name) {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::error!("{}", e);
            resolve_with_default(table.get(key), &ModuleData::default(), key)
        }
    }
}

fn resolve_with_default(
    specific: Option<&ModuleData>,
    default: &ModuleData,
    key: &str,
) -> Resolved {
    let text = specific
        .and_then(ModuleData::text)
        .or_else(|| default.text())
        .unwrap_or_default()
        .to_string();

    let specific_icon = specific.and_then(|entry| entry.icon().or_else(|| default.icon()));
    let (icon, fallback_icon) = match specific_icon {
        Some(icon) => (icon.to_string(), None),
        None => (key.to_string(), default.icon().map(str::to_string)),
    };

    Resolved {
        text,
        icon,
        fallback_icon,
        record: specific.unwrap_or(default).clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, ModuleData)]) -> OverrideTable {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn missing_default_is_an_error() {
        let t = table(&[("desert", ModuleData::with_text("Hot"))]);
        let err = resolve(&t, "desert", "biome").unwrap_err();
        assert!(matches!(err, PresenceError::MissingDefault { .. }));
    }

    #[test]
    fn missing_default_falls_back_when_logged() {
        let t = table(&[("desert", ModuleData::with_text("Hot"))]);
        let resolved = resolve_or_log(&t, "desert", "biome");
        assert_eq!(resolved.text, "Hot");
        assert_eq!(resolved.icon, "desert");
    }

    #[test]
    fn absent_key_inherits_default_text() {
        let t = table(&[("default", ModuleData::with_text("Somewhere"))]);
        let resolved = resolve(&t, "ocean", "biome").unwrap();
        assert_eq!(resolved.text, "Somewhere");
    }

    #[test]
    fn absent_key_uses_identifier_as_icon() {
        let t = table(&[(
            "default",
            ModuleData {
                icon_override: Some("plains".to_string()),
                ..ModuleData::default()
            },
        )]);
        let resolved = resolve(&t, "desert", "biome").unwrap();
        assert_eq!(resolved.icon, "desert");
        assert_eq!(resolved.text, "");
        assert_eq!(resolved.fallback_icon.as_deref(), Some("plains"));
    }

    #[test]
    fn specific_entry_wins() {
        let t = table(&[
            ("default", ModuleData::with_text("Somewhere").with_icon("grass")),
            ("desert", ModuleData::with_text("Hot").with_icon("sand")),
        ]);
        let resolved = resolve(&t, "desert", "biome").unwrap();
        assert_eq!(resolved.text, "Hot");
        assert_eq!(resolved.icon, "sand");
        assert_eq!(resolved.fallback_icon, None);
    }

    #[test]
    fn specific_entry_inherits_unset_fields() {
        let t = table(&[
            ("default", ModuleData::with_text("Somewhere").with_icon("grass")),
            (
                "desert",
                ModuleData {
                    text_override: Some(String::new()),
                    ..ModuleData::default()
                },
            ),
        ]);
        let resolved = resolve(&t, "desert", "biome").unwrap();
        assert_eq!(resolved.text, "Somewhere");
        assert_eq!(resolved.icon, "grass");
    }

    #[test]
    fn empty_default_text_bottoms_out_empty() {
        let t = table(&[("default", ModuleData::default())]);
        let resolved = resolve(&t, "ocean", "biome").unwrap();
        assert_eq!(resolved.text, "");
    }

    #[test]
    fn text_is_never_empty_with_non_empty_default() {
        let t = table(&[
            ("default", ModuleData::with_text("fallback")),
            ("a", ModuleData::default()),
            ("b", ModuleData::with_icon(ModuleData::default(), "x")),
        ]);
        for key in ["a", "b", "c", "default"] {
            assert!(!resolve(&t, key, "t").unwrap().text.is_empty(), "key {key}");
        }
    }
}
