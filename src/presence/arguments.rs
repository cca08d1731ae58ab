//! Placeholder bindings written by the detector modules.

use std::collections::BTreeMap;

/// Which binding map an argument lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
    Text,
    Icon,
}

/// Text and icon bindings keyed by argument name, plus a dirty flag that
/// tells the client whether the payload needs to be rebuilt.
///
/// Uniqueness is per `(key, kind)`; the same key may hold both a text and an
/// icon value.
#[derive(Debug, Default, Clone)]
pub struct ArgumentStore {
    text: BTreeMap<String, String>,
    icons: BTreeMap<String, String>,
    dirty: bool,
}

impl ArgumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, kind: ArgumentKind) -> &BTreeMap<String, String> {
        match kind {
            ArgumentKind::Text => &self.text,
            ArgumentKind::Icon => &self.icons,
        }
    }

    fn map_mut(&mut self, kind: ArgumentKind) -> &mut BTreeMap<String, String> {
        match kind {
            ArgumentKind::Text => &mut self.text,
            ArgumentKind::Icon => &mut self.icons,
        }
    }

    /// Insert or overwrite a binding. Writing the value already stored is a
    /// no-op and leaves the dirty flag untouched. Returns whether anything
    /// changed.
    pub fn sync(&mut self, key: &str, value: impl Into<String>, kind: ArgumentKind) -> bool {
        if key.is_empty() {
            return false;
        }
        let value = value.into();
        let map = self.map_mut(kind);
        if map.get(key) == Some(&value) {
            return false;
        }
        map.insert(key.to_string(), value);
        self.dirty = true;
        true
    }

    pub fn get(&self, key: &str, kind: ArgumentKind) -> Option<&str> {
        self.map(kind).get(key).map(String::as_str)
    }

    /// Remove every binding (both kinds) equal to or nested under any of the
    /// given prefixes. `"biome"` removes `biome.name` but not `biomes`.
    pub fn remove_prefixed(&mut self, prefixes: &[&str]) -> usize {
        let matches = |key: &str| {
            prefixes.iter().any(|prefix| {
                key == *prefix
                    || (key.starts_with(prefix) && key[prefix.len()..].starts_with('.'))
            })
        };
        let before = self.text.len() + self.icons.len();
        self.text.retain(|k, _| !matches(k));
        self.icons.retain(|k, _| !matches(k));
        let removed = before - (self.text.len() + self.icons.len());
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub fn text_bindings(&self) -> &BTreeMap<String, String> {
        &self.text
    }

    pub fn icon_bindings(&self) -> &BTreeMap<String, String> {
        &self.icons
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Return and reset the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.icons.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.is_empty() {
            self.dirty = true;
        }
        self.text.clear();
        self.icons.clear();
    }
}
