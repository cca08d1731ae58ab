//! Serializes module ticks and drives the presence client lifecycle

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::arguments::ArgumentKind;
use super::client::{validate_client_id, ConnectionStatus, InboundAction, PresenceClient};
use super::join::Notice;
use super::payload::PresencePayload;
use super::traits::ClientVariant;
use crate::host::{Feature, GameState};
use crate::modules::{self, Module, TickContext};
use crate::settings::{ModuleData, Settings, SettingsProvider, DEFAULT_CLIENT_ID};
use crate::util;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Synthetic presence shown outside of a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MenuStatus {
    #[default]
    None,
    Loading,
    MainMenu,
}

/// The client id from settings, or the stock one if it is malformed.
pub fn configured_client_id(settings: &Settings) -> &str {
    let client_id = settings.general.client_id.as_str();
    if validate_client_id(client_id).is_ok() {
        client_id
    } else {
        DEFAULT_CLIENT_ID
    }
}

/// Settings that only take effect on a fresh connection.
fn needs_reconnect(applied: &Settings, next: &Settings) -> bool {
    applied.general.preferred_client_level != next.general.preferred_client_level
        || applied.general.reset_time_on_init != next.general.reset_time_on_init
}

fn log_invalid_client_id(settings: &Settings) {
    if let Err(e) = validate_client_id(&settings.general.client_id) {
        tracing::error!("{}, falling back to {}", e, DEFAULT_CLIENT_ID);
    }
}

/// Everything guarded by the tick lock.
struct TickState {
    modules: Vec<Box<dyn Module>>,
    client: PresenceClient,
    menu_status: MenuStatus,
    /// Snapshot the connection was last configured from.
    applied: Arc<Settings>,
    settings_revision: u64,
    catalog_generation: u64,
}

impl TickState {
    fn update_menu_presence(&mut self, settings: &Settings) {
        match self.menu_status {
            MenuStatus::Loading => {
                self.sync_menu_data(&settings.status_messages.loading_data, settings)
            }
            MenuStatus::MainMenu => {
                self.sync_menu_data(&settings.status_messages.main_menu_data, settings)
            }
            MenuStatus::None => self.clear_menu_presence(),
        }
    }

    fn sync_menu_data(&mut self, record: &ModuleData, settings: &Settings) {
        let default_icon = &settings.general.default_icon;
        let message = record.text().unwrap_or_default();
        let icon = util::format_as_icon(record.icon().unwrap_or(default_icon));

        let client = &mut self.client;
        let image = client.image_of("menu.icon", true, &icon, "", default_icon);
        client.clear_party_data(true);
        client.sync_override("menu.message", record);
        client.sync_argument("menu.message", message, ArgumentKind::Text);
        client.sync_argument("menu.icon", image, ArgumentKind::Icon);
    }

    fn clear_menu_presence(&mut self) {
        self.client.clear_override("menu.message");
        self.client.remove_arguments(&["menu"]);
    }

    /// Close the connection and wipe every module's bindings.
    fn shut_down(&mut self) {
        self.client.shut_down();
        for module in &mut self.modules {
            module.clear_client_data(&mut self.client);
        }
        self.menu_status = MenuStatus::None;
        self.clear_menu_presence();
    }
}

/// Owns the detector modules and the presence client, and runs one tick at a
/// time over them.
pub struct PresenceManager {
    state: Mutex<TickState>,
    host: Arc<dyn GameState>,
    settings: Arc<dyn SettingsProvider>,
    runtime: Handle,
    scans: Mutex<Vec<JoinHandle<()>>>,
}

impl PresenceManager {
    /// Manager with the stock module set, in tick order.
    pub fn new(
        host: Arc<dyn GameState>,
        settings: Arc<dyn SettingsProvider>,
        client: PresenceClient,
        runtime: Handle,
    ) -> Self {
        Self::with_modules(host, settings, client, runtime, modules::default_modules())
    }

    pub fn with_modules(
        host: Arc<dyn GameState>,
        settings: Arc<dyn SettingsProvider>,
        client: PresenceClient,
        runtime: Handle,
        modules: Vec<Box<dyn Module>>,
    ) -> Self {
        let settings_revision = settings.revision();
        let catalog_generation = client.catalog().generation();
        Self {
            state: Mutex::new(TickState {
                modules,
                client,
                menu_status: MenuStatus::None,
                applied: settings.snapshot(),
                settings_revision,
                catalog_generation,
            }),
            host,
            settings,
            runtime,
            scans: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TickState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Tick lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Load the asset catalog and open the first connection.
    pub fn init(&self) {
        let settings = self.settings.snapshot();
        log_invalid_client_id(&settings);
        let client_id = configured_client_id(&settings);

        let mut state = self.lock();
        state.client.set_client_id(client_id);
        let variant = ClientVariant::from_level(settings.general.preferred_client_level);
        state.client.set_preferred_variant(variant);
        state.client.catalog().reload(client_id);
        state
            .client
            .init(&settings, self.host.as_ref(), settings.general.reset_time_on_init);
        state.applied = Arc::clone(&settings);
        tracing::info!("Presence manager initialized with client id {}", client_id);
    }

    /// One host tick. `force` repaints every in-use module even without a
    /// detected state change. A settled settings edit or a finished catalog
    /// load forces the tick as well.
    pub fn reload_data(&self, force: bool) {
        let revision = self.settings.revision();
        let settings = self.settings.snapshot();
        let settings_changed = self.settings.has_changed();
        let mut force = force;

        if !settings_changed {
            let (reboot, refreshed) = {
                let mut state = self.lock();
                let identity_changed =
                    state.client.client_id() != configured_client_id(&settings);
                let refreshed = state.settings_revision != revision;
                let reboot =
                    identity_changed || (refreshed && needs_reconnect(&state.applied, &settings));
                state.settings_revision = revision;
                state.applied = Arc::clone(&settings);
                (reboot, refreshed)
            };
            if reboot {
                self.reboot_rpc(false);
            }
            if reboot || refreshed {
                tracing::debug!("Settings applied, repainting presence");
                force = true;
            }
        }

        let now = Instant::now();
        let mut handles = Vec::new();
        {
            let mut guard = self.lock();
            let state = &mut *guard;

            let generation = state.client.catalog().generation();
            if generation != state.catalog_generation {
                tracing::debug!("Asset catalog changed, re-resolving icons");
                state.catalog_generation = generation;
                state.client.invalidate_image_cache();
                force = true;
            }

            for module in state.modules.iter_mut() {
                if !module.can_be_loaded(self.host.as_ref()) {
                    continue;
                }
                let mut ctx = TickContext {
                    settings: &settings,
                    settings_changed,
                    host: &self.host,
                    client: &mut state.client,
                    runtime: &self.runtime,
                };
                module.on_tick(&mut ctx);

                let flags = module.state();
                let live = module.has_live_session(self.host.as_ref());
                if flags.in_use && (!flags.enabled || !live) {
                    tracing::error!(
                        "{} module is in use without a live session, clearing it",
                        module.name()
                    );
                    module.clear_client_data(&mut state.client);
                    module.state_mut().enabled = false;
                } else if force && flags.in_use {
                    module.update_presence(&mut ctx);
                }

                handles.extend(module.state_mut().take_scan_handle());
            }

            if force {
                state.update_menu_presence(&settings);
            }

            for action in state.client.tick(&settings, now) {
                match action {
                    InboundAction::Join { secret } | InboundAction::Spectate { secret } => {
                        modules::verify_and_join(&secret, &settings, &mut state.client);
                    }
                }
            }
        }

        if !handles.is_empty() {
            self.scans
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend(handles);
        }

        self.lock().client.post_tick(Instant::now());
    }

    /// Tear down the connection and reconnect, re-binding the client id and
    /// purging the asset catalog first when `flush_override` is set or the
    /// configured id changed.
    pub fn reboot_rpc(&self, flush_override: bool) {
        let settings = self.settings.snapshot();
        log_invalid_client_id(&settings);
        let client_id = configured_client_id(&settings);

        let mut guard = self.lock();
        let state = &mut *guard;
        let flush = flush_override || state.client.client_id() != client_id;
        tracing::info!("Rebooting presence client (flush: {})", flush);

        state.shut_down();

        if flush {
            state.client.catalog().purge();
            state.client.set_client_id(client_id);
        }

        let variant = ClientVariant::from_level(settings.general.preferred_client_level);
        if state.client.preferred_variant() != variant {
            state.client.set_preferred_variant(variant);
        }
        state.client.catalog().reload(client_id);
        state.client.invalidate_image_cache();
        state
            .client
            .init(&settings, self.host.as_ref(), settings.general.reset_time_on_init);
        state.applied = settings;
    }

    /// Switch the synthetic menu presence. Only a change of state repaints.
    pub fn set_menu_state(&self, status: MenuStatus) -> bool {
        let settings = self.settings.snapshot();
        let mut state = self.lock();
        let old = std::mem::replace(&mut state.menu_status, status);
        if old == status {
            return false;
        }
        tracing::debug!("Menu state changed from {:?} to {:?}", old, status);
        state.update_menu_presence(&settings);
        true
    }

    pub fn clear_menu_state(&self) -> bool {
        self.set_menu_state(MenuStatus::None)
    }

    pub fn menu_state(&self) -> MenuStatus {
        self.lock().menu_status
    }

    pub fn shut_down(&self) {
        self.lock().shut_down();
    }

    /// Forget every module's scan results; each rescans on its next enabled
    /// tick.
    pub fn queue_rescan(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        for module in state.modules.iter_mut() {
            module.empty_data(&mut state.client);
        }
    }

    /// Identifiers discovered so far for `feature`.
    pub fn known_identifiers(&self, feature: Feature) -> Vec<String> {
        self.lock()
            .modules
            .iter()
            .find(|m| m.feature() == feature)
            .map(|m| m.state().scan.snapshot())
            .unwrap_or_default()
    }

    pub fn respond_to_join_request(&self, accept: bool) -> bool {
        self.lock().client.respond_to_join_request(accept)
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        self.lock().client.take_notices()
    }

    pub fn last_sent_payload(&self) -> Option<PresencePayload> {
        self.lock().client.last_sent().cloned()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.lock().client.status()
    }

    pub fn client_variant(&self) -> ClientVariant {
        self.lock().client.preferred_variant()
    }

    /// Wait for every scan started so far.
    pub async fn join_scans(&self) {
        let handles = {
            let mut scans = self.scans.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *scans)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Module scan failed: {}", e);
            }
        }
    }
}

/// Start the background task that ticks the manager on a fixed interval
pub fn start_presence_background_task(
    manager: Arc<PresenceManager>,
    poll_callback: Option<Box<dyn Fn() + Send + Sync>>,
) -> JoinHandle<()> {
    let runtime = manager.runtime.clone();
    runtime.spawn(async move {
        loop {
            if let Some(ref callback) = poll_callback {
                callback();
            }

            manager.reload_data(false);

            tokio::time::sleep(TICK_INTERVAL).await;
        }
    })
}
