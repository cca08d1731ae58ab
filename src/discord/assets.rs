//! Remote asset catalog backed by the application's public asset list.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use rand::seq::IteratorRandom;
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{PresenceError, Result};
use crate::presence::{Asset, AssetCatalog};

const ASSETS_API_BASE: &str = "https://discord.com/api/v9/oauth2/applications/";

#[derive(Debug, Deserialize)]
struct RemoteAsset {
    id: String,
    name: String,
    #[serde(rename = "type", default)]
    #[allow(dead_code)]
    kind: u8,
}

#[derive(Debug, Default)]
struct Catalogs {
    client_id: Option<String>,
    assets: BTreeMap<String, Asset>,
    custom: BTreeMap<String, Asset>,
    generation: u64,
}

/// Asset catalog fetched over HTTPS for the current client id.
///
/// `reload` returns immediately; the list is fetched on the runtime and
/// swapped in when it arrives, bumping `generation`. Results for an identity
/// that is no longer current are discarded.
pub struct DiscordAssetCatalog {
    http: reqwest::Client,
    runtime: Handle,
    inner: Arc<RwLock<Catalogs>>,
    loading: Mutex<Option<JoinHandle<()>>>,
}

impl DiscordAssetCatalog {
    pub fn new(runtime: Handle) -> Self {
        Self {
            http: reqwest::Client::new(),
            runtime,
            inner: Arc::new(RwLock::new(Catalogs::default())),
            loading: Mutex::new(None),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Catalogs> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Catalogs> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn assets_url(client_id: &str) -> Result<Url> {
    let base = Url::parse(ASSETS_API_BASE).map_err(|e| PresenceError::Catalog(e.to_string()))?;
    base.join(&format!("{}/assets", client_id))
        .map_err(|e| PresenceError::Catalog(e.to_string()))
}

async fn fetch_assets(http: &reqwest::Client, client_id: &str) -> Result<Vec<RemoteAsset>> {
    let url = assets_url(client_id)?;
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| PresenceError::Catalog(format!("Failed to contact asset endpoint: {}", e)))?;

    if !response.status().is_success() {
        return Err(PresenceError::Catalog(format!(
            "Asset endpoint returned {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| PresenceError::Catalog(format!("Failed to parse asset list: {}", e)))
}

/// Store a fetched list, unless the catalog has since moved to another id.
fn apply_assets(inner: &RwLock<Catalogs>, client_id: &str, remote: Vec<RemoteAsset>) -> bool {
    let mut catalogs = inner.write().unwrap_or_else(|e| e.into_inner());
    if catalogs.client_id.as_deref() != Some(client_id) {
        tracing::debug!("Dropping stale asset list for {}", client_id);
        return false;
    }

    catalogs.assets = remote
        .into_iter()
        .map(|asset| {
            let key = asset.name.to_lowercase();
            (
                key,
                Asset {
                    id: asset.id,
                    name: asset.name,
                    url: None,
                },
            )
        })
        .collect();
    catalogs.generation += 1;
    true
}

impl AssetCatalog for DiscordAssetCatalog {
    fn contains(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        let catalogs = self.read();
        catalogs.assets.contains_key(&key) || catalogs.custom.contains_key(&key)
    }

    fn get(&self, key: &str) -> Option<Asset> {
        let key = key.to_lowercase();
        let catalogs = self.read();
        catalogs
            .assets
            .get(&key)
            .or_else(|| catalogs.custom.get(&key))
            .cloned()
    }

    fn random_key(&self) -> Option<String> {
        self.read()
            .assets
            .keys()
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    fn generation(&self) -> u64 {
        self.read().generation
    }

    fn reload(&self, client_id: &str) {
        self.write().client_id = Some(client_id.to_string());

        let http = self.http.clone();
        let inner = Arc::clone(&self.inner);
        let client_id = client_id.to_string();

        let handle = self.runtime.spawn(async move {
            tracing::info!("Loading assets for client {}", client_id);
            match fetch_assets(&http, &client_id).await {
                Ok(remote) => {
                    let count = remote.len();
                    if apply_assets(&inner, &client_id, remote) {
                        tracing::info!("Loaded {} assets for client {}", count, client_id);
                    }
                }
                Err(e) => tracing::warn!("Failed to load assets for {}: {}", client_id, e),
            }
        });

        let previous = self
            .loading
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn purge(&self) {
        let mut catalogs = self.write();
        catalogs.assets.clear();
        catalogs.custom.clear();
        tracing::debug!("Asset catalog purged");
    }

    fn register_custom(&self, key: &str, url: &str) {
        let key = key.to_lowercase();
        let mut catalogs = self.write();
        if catalogs.custom.get(&key).and_then(|a| a.url.as_deref()) == Some(url) {
            return;
        }
        tracing::debug!("Registering custom asset `{}` -> {}", key, url);
        catalogs.custom.insert(
            key.clone(),
            Asset {
                id: key.clone(),
                name: key,
                url: Some(url.to_string()),
            },
        );
    }
}
