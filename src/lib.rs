pub mod discord;
pub mod error;
pub mod host;
pub mod logging;
pub mod modules;
pub mod presence;
pub mod settings;
pub mod template;
pub mod util;

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub use error::{PresenceError, Result};
pub use host::{EntityInfo, Feature, GameState, NamedObject, ServerInfo, WorldInfo};
pub use presence::{
    start_presence_background_task, MenuStatus, Notice, PresenceClient, PresenceManager,
};
pub use settings::{Settings, SettingsProvider, SharedSettings};

use discord::{DiscordAssetCatalog, DiscordTransport};
use template::PlaceholderExpander;

/// Wire a Discord-backed manager for `host`, connect it and start ticking.
///
/// The returned task runs until aborted; call [`PresenceManager::shut_down`]
/// afterwards to release the connection.
pub fn start(
    host: Arc<dyn GameState>,
    settings: Arc<dyn SettingsProvider>,
    runtime: Handle,
    poll_callback: Option<Box<dyn Fn() + Send + Sync>>,
) -> (Arc<PresenceManager>, JoinHandle<()>) {
    let snapshot = settings.snapshot();
    let client_id = presence::configured_client_id(&snapshot);

    let client = PresenceClient::new(
        client_id,
        Box::new(DiscordTransport::new(runtime.clone())),
        Arc::new(DiscordAssetCatalog::new(runtime.clone())),
        Arc::new(PlaceholderExpander),
    );

    let manager = Arc::new(PresenceManager::new(host, settings, client, runtime));
    manager.init();
    tracing::info!("Presence sync started for client {}", client_id);

    let task = start_presence_background_task(Arc::clone(&manager), poll_callback);
    (manager, task)
}
