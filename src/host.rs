//! Read-only view of the running game's state.

use std::collections::BTreeMap;

/// The facets the detector modules observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Biome,
    Dimension,
    Entity,
    Screen,
    Server,
}

/// Something the host can name, with a type-level fallback name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedObject {
    pub name: String,
    /// Name derived from the object's type, used when `name` is empty.
    pub class_name: String,
}

impl NamedObject {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityInfo {
    pub name: String,
    pub uuid: Option<String>,
    pub is_player: bool,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub address: String,
    pub name: Option<String>,
    pub motd: Option<String>,
    pub players: u32,
    pub max_players: u32,
    pub is_lan: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldInfo {
    pub name: String,
    pub difficulty: String,
    pub time_ticks: u64,
}

/// Accessors into the host application. Implementations must be cheap,
/// synchronous and free of side effects; scans call `enumerate` from worker
/// threads.
pub trait GameState: Send + Sync {
    /// Whether a player session (a loaded world) is live.
    fn has_session(&self) -> bool;

    fn current_biome(&self) -> Option<NamedObject> {
        None
    }

    fn current_dimension(&self) -> Option<NamedObject> {
        None
    }

    fn targeted_entity(&self) -> Option<EntityInfo> {
        None
    }

    fn riding_entity(&self) -> Option<EntityInfo> {
        None
    }

    fn is_singleplayer(&self) -> bool {
        false
    }

    fn current_server(&self) -> Option<ServerInfo> {
        None
    }

    fn world_info(&self) -> Option<WorldInfo> {
        None
    }

    fn current_screen(&self) -> Option<NamedObject> {
        None
    }

    fn player_name(&self) -> Option<String> {
        None
    }

    fn game_version(&self) -> Option<String> {
        None
    }

    /// Host-provided registry of every known identifier for `feature`.
    fn enumerate(&self, feature: Feature) -> Vec<String>;

    /// Slower discovery path used when `enumerate` comes back empty.
    fn enumerate_fallback(&self, _feature: Feature) -> Vec<String> {
        Vec::new()
    }
}
