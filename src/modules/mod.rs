//! Detector modules: one per observed facet of game state.

mod biome;
mod dimension;
mod entity;
mod screen;
mod server;

pub use biome::BiomeModule;
pub use dimension::DimensionModule;
pub use entity::EntityModule;
pub use screen::ScreenModule;
pub use server::{make_secret, parse_secret, verify_and_join, JoinTarget, ServerModule};

use std::sync::{Arc, RwLock};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::host::{Feature, GameState, NamedObject};
use crate::presence::PresenceClient;
use crate::settings::Settings;
use crate::util;

/// Identifiers discovered by a module's background scan. Append-only while a
/// scan runs; readers see whatever has landed so far.
#[derive(Debug, Clone, Default)]
pub struct ScanList {
    items: Arc<RwLock<Vec<String>>>,
}

impl ScanList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_unique(&self, item: String) -> bool {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        if items.contains(&item) {
            return false;
        }
        items.push(item);
        true
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|i| i == item)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.items.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.items.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Lifecycle flags shared by every module.
#[derive(Debug, Default)]
pub struct ModuleState {
    pub enabled: bool,
    pub in_use: bool,
    pub has_scanned: bool,
    pub scan: ScanList,
    scan_handle: Option<JoinHandle<()>>,
}

impl ModuleState {
    /// Take the handle of the most recent scan, if one was started.
    pub fn take_scan_handle(&mut self) -> Option<JoinHandle<()>> {
        self.scan_handle.take()
    }
}

/// How scanned identifiers are normalized before they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStyle {
    Identifier,
    Address,
}

impl IdStyle {
    pub fn apply(self, raw: &str, raw_words: bool) -> String {
        match self {
            IdStyle::Identifier => util::format_identifier(raw, true, raw_words),
            IdStyle::Address => util::short_address(raw),
        }
    }
}

/// Everything a module may touch during one tick.
pub struct TickContext<'a> {
    pub settings: &'a Settings,
    /// Settings are being edited; modules keep their current enable state.
    pub settings_changed: bool,
    pub host: &'a Arc<dyn GameState>,
    pub client: &'a mut PresenceClient,
    pub runtime: &'a Handle,
}

pub trait Module: Send {
    /// Returns the name of this module (for logging)
    fn name(&self) -> &'static str;

    fn feature(&self) -> Feature;

    fn state(&self) -> &ModuleState;

    fn state_mut(&mut self) -> &mut ModuleState;

    /// Whether current settings turn this module on.
    fn enabled_in(&self, settings: &Settings) -> bool;

    /// Readiness predicate checked by the orchestrator before ticking.
    fn can_be_loaded(&self, _host: &dyn GameState) -> bool {
        true
    }

    /// Whether the host currently has the state this module reads.
    fn has_live_session(&self, host: &dyn GameState) -> bool {
        host.has_session()
    }

    /// Identifiers from the settings tables to merge into scan results.
    fn configured_identifiers(&self, settings: &Settings) -> Vec<String>;

    fn id_style(&self) -> IdStyle {
        IdStyle::Identifier
    }

    /// Read host state and repaint presence if the derived identifiers changed.
    fn update_data(&mut self, ctx: &mut TickContext<'_>);

    /// Push this module's bindings into the client. Safe to repeat.
    fn update_presence(&mut self, ctx: &mut TickContext<'_>);

    /// Drop every binding this module owns and forget the cached state.
    /// Implementations must reset `in_use` and tolerate repeated calls.
    fn clear_client_data(&mut self, client: &mut PresenceClient);

    /// Full reset: forget scan results, allow a rescan and clear bindings.
    fn empty_data(&mut self, client: &mut PresenceClient) {
        let state = self.state_mut();
        state.has_scanned = false;
        state.scan.clear();
        self.clear_client_data(client);
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) {
        if !ctx.settings_changed {
            let enabled = self.enabled_in(ctx.settings);
            self.state_mut().enabled = enabled;
        }

        let state = self.state();
        if state.enabled && !state.has_scanned {
            self.state_mut().has_scanned = true;
            start_scan(self, ctx);
        }

        if self.state().enabled {
            if self.has_live_session(&**ctx.host) {
                self.state_mut().in_use = true;
                self.update_data(ctx);
            } else if self.state().in_use {
                self.clear_client_data(ctx.client);
            }
        } else if self.state().in_use {
            self.empty_data(ctx.client);
        }
    }
}

/// Spawn the one-shot enumeration for `module` on the blocking pool. Results
/// land only in the module's own scan list.
fn start_scan<M: Module + ?Sized>(module: &mut M, ctx: &TickContext<'_>) {
    let host = Arc::clone(ctx.host);
    let list = module.state().scan.clone();
    let feature = module.feature();
    let name = module.name();
    let style = module.id_style();
    let raw_words = !ctx.settings.advanced.format_words;
    let configured = module.configured_identifiers(ctx.settings);

    tracing::debug!("Starting {} scan", name);
    let handle = ctx.runtime.spawn_blocking(move || {
        let mut found = host.enumerate(feature);
        if found.is_empty() {
            found = host.enumerate_fallback(feature);
        }
        let mut added = 0;
        for raw in found.iter().chain(configured.iter()) {
            let id = style.apply(raw, raw_words);
            if !id.is_empty() && list.push_unique(id) {
                added += 1;
            }
        }
        tracing::debug!("{} scan finished with {} identifiers", name, added);
    });
    module.state_mut().scan_handle = Some(handle);
}

/// Display name and lookup identifier for a host object. The identifier
/// falls back to the type-derived name when the object name is empty.
pub(crate) fn derive_names(object: &NamedObject, raw_words: bool) -> (String, String) {
    let primary = util::format_identifier(&object.name, true, raw_words);
    let alternative = util::format_identifier(&object.class_name, true, raw_words);
    let id = util::or_default(&primary, &alternative).to_string();
    let display = util::format_identifier(&object.name, false, raw_words);
    (util::or_default(&display, &id).to_string(), id)
}

/// The fixed tick order.
pub fn default_modules() -> Vec<Box<dyn Module>> {
    vec![
        Box::new(BiomeModule::default()),
        Box::new(DimensionModule::default()),
        Box::new(EntityModule::default()),
        Box::new(ScreenModule::default()),
        Box::new(ServerModule::default()),
    ]
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use crate::host::{EntityInfo, Feature, GameState, NamedObject, ServerInfo, WorldInfo};

    /// Host whose state tests can script between ticks.
    #[derive(Default)]
    pub struct ScriptedHost {
        pub session: Mutex<bool>,
        pub biome: Mutex<Option<NamedObject>>,
        pub dimension: Mutex<Option<NamedObject>>,
        pub target: Mutex<Option<EntityInfo>>,
        pub riding: Mutex<Option<EntityInfo>>,
        pub singleplayer: Mutex<bool>,
        pub server: Mutex<Option<ServerInfo>>,
        pub world: Mutex<Option<WorldInfo>>,
        pub screen: Mutex<Option<NamedObject>>,
        pub registry: Mutex<BTreeMap<String, Vec<String>>>,
    }

    impl ScriptedHost {
        pub fn in_session() -> Self {
            let host = Self::default();
            *host.session.lock().unwrap() = true;
            host
        }

        pub fn set_session(&self, live: bool) {
            *self.session.lock().unwrap() = live;
        }

        pub fn set_biome(&self, name: &str) {
            *self.biome.lock().unwrap() = Some(NamedObject::new(name, ""));
        }

        pub fn register(&self, feature: Feature, ids: &[&str]) {
            self.registry.lock().unwrap().insert(
                format!("{feature:?}"),
                ids.iter().map(|s| s.to_string()).collect(),
            );
        }
    }

    impl GameState for ScriptedHost {
        fn has_session(&self) -> bool {
            *self.session.lock().unwrap()
        }

        fn current_biome(&self) -> Option<NamedObject> {
            self.biome.lock().unwrap().clone()
        }

        fn current_dimension(&self) -> Option<NamedObject> {
            self.dimension.lock().unwrap().clone()
        }

        fn targeted_entity(&self) -> Option<EntityInfo> {
            self.target.lock().unwrap().clone()
        }

        fn riding_entity(&self) -> Option<EntityInfo> {
            self.riding.lock().unwrap().clone()
        }

        fn is_singleplayer(&self) -> bool {
            *self.singleplayer.lock().unwrap()
        }

        fn current_server(&self) -> Option<ServerInfo> {
            self.server.lock().unwrap().clone()
        }

        fn world_info(&self) -> Option<WorldInfo> {
            self.world.lock().unwrap().clone()
        }

        fn current_screen(&self) -> Option<NamedObject> {
            self.screen.lock().unwrap().clone()
        }

        fn player_name(&self) -> Option<String> {
            Some("Steve".to_string())
        }

        fn game_version(&self) -> Option<String> {
            Some("1.12.2".to_string())
        }

        fn enumerate(&self, feature: Feature) -> Vec<String> {
            self.registry
                .lock()
                .unwrap()
                .get(&format!("{feature:?}"))
                .cloned()
                .unwrap_or_default()
        }

        fn enumerate_fallback(&self, feature: Feature) -> Vec<String> {
            match feature {
                Feature::Biome => vec!["Fallback Biome".to_string()],
                _ => Vec::new(),
            }
        }
    }
}
