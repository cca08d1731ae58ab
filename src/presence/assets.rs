//! Single-slot memo for icon lookups against the asset catalog.

use super::traits::AssetCatalog;

/// How far a lookup had to degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetTier {
    Primary,
    Alternative,
    Empty,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Lookup {
    key: String,
    primary: String,
    fallback: String,
    allow_empty: bool,
}

/// Remembers the most recent lookup and its result. Only an identical
/// consecutive lookup is served from the slot; any other request replaces it.
#[derive(Debug, Default)]
pub struct AssetCache {
    last: Option<(Lookup, String, AssetTier)>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }

    /// Resolve an icon key: `primary` if the catalog has it, else `fallback`,
    /// else empty (when allowed), else `default_icon` or a random catalog key.
    pub fn image_of(
        &mut self,
        catalog: &dyn AssetCatalog,
        lookup_key: &str,
        allow_empty: bool,
        primary: &str,
        fallback: &str,
        default_icon: &str,
    ) -> (String, AssetTier) {
        let lookup = Lookup {
            key: lookup_key.to_string(),
            primary: primary.to_string(),
            fallback: fallback.to_string(),
            allow_empty,
        };

        if let Some((last, value, tier)) = &self.last {
            if *last == lookup {
                return (value.clone(), *tier);
            }
        }

        let (value, tier) = if !primary.is_empty() && catalog.contains(primary) {
            tracing::debug!("Asset `{}` resolved to `{}`", lookup_key, primary);
            (primary.to_string(), AssetTier::Primary)
        } else if !fallback.is_empty() && catalog.contains(fallback) {
            tracing::warn!(
                "Asset `{}` not found for `{}`, using alternative `{}`",
                primary,
                lookup_key,
                fallback
            );
            (fallback.to_string(), AssetTier::Alternative)
        } else if allow_empty {
            tracing::info!(
                "No asset found for `{}` (tried `{}`, `{}`), leaving it empty",
                lookup_key,
                primary,
                fallback
            );
            (String::new(), AssetTier::Empty)
        } else {
            let value = if catalog.contains(default_icon) {
                default_icon.to_string()
            } else {
                catalog.random_key().unwrap_or_default()
            };
            tracing::error!(
                "No asset found for `{}` (tried `{}`, `{}`), using default `{}`",
                lookup_key,
                primary,
                fallback,
                value
            );
            (value, AssetTier::Default)
        };

        self.last = Some((lookup, value.clone(), tier));
        (value, tier)
    }
}


#[cfg(test)]
pub(crate) mod log_capture {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a plain-text subscriber and return what it logged.
    pub fn logs_of<R>(f: impl FnOnce() -> R) -> (R, String) {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        (result, String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn count_at(logs: &str, level: &str) -> usize {
        logs.lines()
            .filter(|line| line.split_whitespace().any(|word| word == level))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::FakeCatalog;
    use super::log_capture::{count_at, logs_of};
    use super::*;

    #[test]
    fn primary_hit() {
        let catalog = FakeCatalog::with_keys(&["desert"]);
        let mut cache = AssetCache::new();
        let (value, tier) = cache.image_of(&catalog, "biome.icon", true, "desert", "", "");
        assert_eq!(value, "desert");
        assert_eq!(tier, AssetTier::Primary);
    }

    #[test]
    fn alternative_key_is_used_when_primary_missing() {
        let catalog = FakeCatalog::with_keys(&["alt", "default_icon"]);
        let mut cache = AssetCache::new();
        let ((value, tier), logs) = logs_of(|| {
            cache.image_of(&catalog, "badkey", false, "badkey", "alt", "default_icon")
        });
        assert_eq!(value, "alt");
        assert_eq!(tier, AssetTier::Alternative);
        assert_eq!(count_at(&logs, "WARN"), 1, "{logs}");
        assert!(logs.contains("using alternative `alt`"), "{logs}");
        assert_eq!(count_at(&logs, "ERROR"), 0, "{logs}");
    }

    #[test]
    fn memoized_lookup_logs_nothing() {
        let catalog = FakeCatalog::with_keys(&["alt"]);
        let mut cache = AssetCache::new();
        cache.image_of(&catalog, "badkey", false, "badkey", "alt", "");
        let (_, logs) = logs_of(|| cache.image_of(&catalog, "badkey", false, "badkey", "alt", ""));
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn default_tier_logs_an_error() {
        let catalog = FakeCatalog::with_keys(&["grass"]);
        let mut cache = AssetCache::new();
        let (_, logs) = logs_of(|| cache.image_of(&catalog, "k", false, "nope", "", "grass"));
        assert_eq!(count_at(&logs, "ERROR"), 1, "{logs}");
    }

    #[test]
    fn allow_empty_resolves_to_empty() {
        let catalog = FakeCatalog::with_keys(&["grass"]);
        let mut cache = AssetCache::new();
        let (value, tier) = cache.image_of(&catalog, "k", true, "nope", "also_nope", "grass");
        assert_eq!(value, "");
        assert_eq!(tier, AssetTier::Empty);
    }

    #[test]
    fn default_icon_then_random_key() {
        let catalog = FakeCatalog::with_keys(&["grass", "stone"]);
        let mut cache = AssetCache::new();
        let (value, tier) = cache.image_of(&catalog, "k", false, "nope", "", "stone");
        assert_eq!((value.as_str(), tier), ("stone", AssetTier::Default));

        let (value, _) = cache.image_of(&catalog, "k2", false, "nope", "", "missing");
        assert_eq!(value, "grass");
    }

    #[test]
    fn empty_catalog_never_panics() {
        let catalog = FakeCatalog::default();
        let mut cache = AssetCache::new();
        let (value, tier) = cache.image_of(&catalog, "k", false, "a", "b", "c");
        assert_eq!(value, "");
        assert_eq!(tier, AssetTier::Default);
    }

    #[test]
    fn identical_lookup_skips_catalog() {
        let catalog = FakeCatalog::with_keys(&["desert"]);
        let mut cache = AssetCache::new();
        cache.image_of(&catalog, "biome.icon", true, "desert", "", "");
        let after_first = catalog.lookup_count();

        let (value, _) = cache.image_of(&catalog, "biome.icon", true, "desert", "", "");
        assert_eq!(value, "desert");
        assert_eq!(catalog.lookup_count(), after_first);
    }

    #[test]
    fn changed_key_invalidates_slot() {
        let catalog = FakeCatalog::with_keys(&["desert", "plains"]);
        let mut cache = AssetCache::new();
        cache.image_of(&catalog, "biome.icon", true, "desert", "", "");
        let after_first = catalog.lookup_count();

        let (value, _) = cache.image_of(&catalog, "biome.icon", true, "plains", "", "");
        assert_eq!(value, "plains");
        assert!(catalog.lookup_count() > after_first);
    }

    #[test]
    fn invalidate_forces_fresh_lookup() {
        let catalog = FakeCatalog::with_keys(&["desert"]);
        let mut cache = AssetCache::new();
        cache.image_of(&catalog, "biome.icon", true, "desert", "", "");
        cache.invalidate();
        let before = catalog.lookup_count();
        cache.image_of(&catalog, "biome.icon", true, "desert", "", "");
        assert!(catalog.lookup_count() > before);
    }
}
