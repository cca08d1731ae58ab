use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{PresenceError, Result};

const SETTINGS_DIR: &str = "presence-sync";
const SETTINGS_FILE: &str = "settings.json";

/// Application id used when no valid client id is configured.
pub const DEFAULT_CLIENT_ID: &str = "450485984333660181";

/// Key every override table must contain.
pub const DEFAULT_KEY: &str = "default";

/// Presence sub-record attached to an override entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceData {
    pub enabled: bool,
    pub use_as_main: bool,
    pub details: String,
    pub game_state: String,
    pub large_image_key: String,
    pub large_image_text: String,
    pub small_image_key: String,
    pub small_image_text: String,
}

impl Default for PresenceData {
    fn default() -> Self {
        Self {
            enabled: true,
            use_as_main: false,
            details: String::new(),
            game_state: String::new(),
            large_image_key: String::new(),
            large_image_text: String::new(),
            small_image_key: String::new(),
            small_image_text: String::new(),
        }
    }
}

/// One override record: optional text/icon plus an optional presence block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleData {
    pub text_override: Option<String>,
    pub icon_override: Option<String>,
    pub data: Option<PresenceData>,
}

impl ModuleData {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text_override: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon_override = Some(icon.into());
        self
    }

    /// Text override, if set and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.text_override.as_deref().filter(|s| !s.is_empty())
    }

    /// Icon override, if set and non-empty.
    pub fn icon(&self) -> Option<&str> {
        self.icon_override.as_deref().filter(|s| !s.is_empty())
    }
}

pub type OverrideTable = BTreeMap<String, ModuleData>;

fn table_with_default(default: ModuleData) -> OverrideTable {
    let mut table = OverrideTable::new();
    table.insert(DEFAULT_KEY.to_string(), default);
    table
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub client_id: String,
    /// 0 = canary, 1 = ptb, 2 = stable, anything else = any.
    pub preferred_client_level: i32,
    pub detect_biome_data: bool,
    pub detect_dimension_data: bool,
    pub detect_world_data: bool,
    pub enable_join_requests: bool,
    pub join_request_timeout_secs: u64,
    pub party_privacy_level: i32,
    pub reset_time_on_init: bool,
    pub show_time: bool,
    pub default_icon: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            preferred_client_level: 3,
            detect_biome_data: true,
            detect_dimension_data: true,
            detect_world_data: true,
            enable_join_requests: false,
            join_request_timeout_secs: 30,
            party_privacy_level: 0,
            reset_time_on_init: false,
            show_time: true,
            default_icon: "grass".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeSettings {
    pub fallback_biome_icon: String,
    pub biome_data: OverrideTable,
}

impl Default for BiomeSettings {
    fn default() -> Self {
        Self {
            fallback_biome_icon: "unknown".to_string(),
            biome_data: table_with_default(ModuleData::with_text("in {biome.name}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionSettings {
    pub fallback_dimension_icon: String,
    pub dimension_data: OverrideTable,
}

impl Default for DimensionSettings {
    fn default() -> Self {
        Self {
            fallback_dimension_icon: "unknown".to_string(),
            dimension_data: table_with_default(ModuleData::with_text("In {dimension.name}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub fallback_server_icon: String,
    pub fallback_server_name: String,
    pub fallback_server_motd: String,
    pub server_data: OverrideTable,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            fallback_server_icon: "default".to_string(),
            fallback_server_name: "Minecraft Server".to_string(),
            fallback_server_motd: "A Minecraft Server".to_string(),
            server_data: table_with_default(ModuleData::with_text(
                "Playing on {server.name} ({server.players.current}/{server.players.max})",
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusMessages {
    pub main_menu_data: ModuleData,
    pub loading_data: ModuleData,
    pub lan_data: ModuleData,
    pub singleplayer_data: ModuleData,
}

impl Default for StatusMessages {
    fn default() -> Self {
        Self {
            main_menu_data: ModuleData::with_text("In the Main Menu"),
            loading_data: ModuleData::with_text("Loading..."),
            lan_data: ModuleData::with_text("Playing on a LAN Server"),
            singleplayer_data: ModuleData::with_text("Playing Singleplayer"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySettings {
    pub fallback_entity_icon: String,
    pub target_data: OverrideTable,
    pub riding_data: OverrideTable,
}

impl Default for EntitySettings {
    fn default() -> Self {
        Self {
            fallback_entity_icon: "unknown".to_string(),
            target_data: table_with_default(ModuleData::with_text(
                "Targeting {entity.target.name}",
            )),
            riding_data: table_with_default(ModuleData::with_text("Riding {entity.riding.name}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenSettings {
    pub fallback_screen_icon: String,
    pub screen_data: OverrideTable,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            fallback_screen_icon: "unknown".to_string(),
            screen_data: table_with_default(ModuleData::with_text("In {screen.name}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    pub enable_per_entity: bool,
    pub enable_per_screen: bool,
    pub format_words: bool,
    pub allow_endpoint_icons: bool,
    /// `{}` is replaced with the server's short address.
    pub server_icon_endpoint: String,
    pub entity: EntitySettings,
    pub screen: ScreenSettings,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            enable_per_entity: false,
            enable_per_screen: false,
            format_words: true,
            allow_endpoint_icons: false,
            server_icon_endpoint: "https://api.mcsrvstat.us/icon/{}".to_string(),
            entity: EntitySettings::default(),
            screen: ScreenSettings::default(),
        }
    }
}

/// Templates expanded into the outbound payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub details: String,
    pub game_state: String,
    pub large_image_key: String,
    pub large_image_text: String,
    pub small_image_key: String,
    pub small_image_text: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            details: "{menu.message}{dimension.message}".to_string(),
            game_state: "{server.message}".to_string(),
            large_image_key: "{menu.icon}{dimension.icon}".to_string(),
            large_image_text: "{menu.message}{dimension.message}".to_string(),
            small_image_key: "{server.icon}".to_string(),
            small_image_text: "{server.message}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub biome: BiomeSettings,
    pub dimension: DimensionSettings,
    pub server: ServerSettings,
    pub status_messages: StatusMessages,
    pub advanced: AdvancedSettings,
    pub display: DisplaySettings,
}

/// Read-only access to the live settings object.
pub trait SettingsProvider: Send + Sync {
    fn snapshot(&self) -> Arc<Settings>;

    /// True while the settings are being edited; modules keep their current
    /// enable state until the edit settles.
    fn has_changed(&self) -> bool {
        false
    }

    /// Bumped each time a new snapshot is published.
    fn revision(&self) -> u64 {
        0
    }
}

/// Settings held in memory and swapped atomically by the host.
pub struct SharedSettings {
    current: RwLock<Arc<Settings>>,
    editing: std::sync::atomic::AtomicBool,
    revision: std::sync::atomic::AtomicU64,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
            editing: std::sync::atomic::AtomicBool::new(false),
            revision: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn replace(&self, settings: Settings) {
        match self.current.write() {
            Ok(mut guard) => *guard = Arc::new(settings),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(settings),
        }
        self.revision
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_editing(&self, editing: bool) {
        self.editing
            .store(editing, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsProvider for SharedSettings {
    fn snapshot(&self) -> Arc<Settings> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn has_changed(&self) -> bool {
        self.editing.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn revision(&self) -> u64 {
        self.revision.load(std::sync::atomic::Ordering::SeqCst)
    }
}

pub fn default_settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| PresenceError::Settings("Failed to get config directory".to_string()))?
        .join(SETTINGS_DIR);

    fs::create_dir_all(&config_dir)?;

    Ok(config_dir.join(SETTINGS_FILE))
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    tracing::debug!("Loading settings from {}", path.display());

    if !path.exists() {
        return Ok(Settings::default());
    }

    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    tracing::debug!("Saving settings to {}", path.display());

    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_seed_every_table_with_default_entry() {
        let settings = Settings::default();
        assert!(settings.biome.biome_data.contains_key(DEFAULT_KEY));
        assert!(settings.dimension.dimension_data.contains_key(DEFAULT_KEY));
        assert!(settings.server.server_data.contains_key(DEFAULT_KEY));
        assert!(settings.advanced.entity.target_data.contains_key(DEFAULT_KEY));
        assert!(settings.advanced.entity.riding_data.contains_key(DEFAULT_KEY));
        assert!(settings.advanced.screen.screen_data.contains_key(DEFAULT_KEY));
    }

    #[test]
    fn empty_overrides_are_treated_as_unset() {
        let data = ModuleData {
            text_override: Some(String::new()),
            icon_override: Some("icon".to_string()),
            data: None,
        };
        assert_eq!(data.text(), None);
        assert_eq!(data.icon(), Some("icon"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_settings(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.general.client_id, DEFAULT_CLIENT_ID);
    }

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.general.client_id = "123456789012345678".to_string();
        settings
            .biome
            .biome_data
            .insert("desert".to_string(), ModuleData::with_text("Hot").with_icon("sand"));
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded.general.client_id, "123456789012345678");
        assert_eq!(loaded.biome.biome_data["desert"].icon(), Some("sand"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"general": {"show_time": false}}"#).unwrap();

        let loaded = load_settings(&path).unwrap();
        assert!(!loaded.general.show_time);
        assert_eq!(loaded.general.client_id, DEFAULT_CLIENT_ID);
        assert!(loaded.biome.biome_data.contains_key(DEFAULT_KEY));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_settings(&path), Err(PresenceError::Json(_))));
    }

    #[test]
    fn shared_settings_swap_and_editing_flag() {
        let shared = SharedSettings::default();
        assert!(!shared.has_changed());
        assert_eq!(shared.revision(), 0);

        let mut next = Settings::default();
        next.general.detect_biome_data = false;
        shared.replace(next);
        shared.set_editing(true);

        assert!(!shared.snapshot().general.detect_biome_data);
        assert!(shared.has_changed());
        assert_eq!(shared.revision(), 1);
    }
}
