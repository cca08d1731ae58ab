use thiserror::Error;

/// Errors surfaced by the presence engine and its collaborators.
///
/// None of these ever escape the tick loop; they are logged and the engine
/// falls back to the nearest valid default.
#[derive(Error, Debug)]
pub enum PresenceError {
    #[error("Override table `{table}` has no \"default\" entry")]
    MissingDefault { table: String },

    #[error("Invalid client id: {0}")]
    InvalidClientId(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Asset catalog error: {0}")]
    Catalog(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = PresenceError> = std::result::Result<T, E>;
