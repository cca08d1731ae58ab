//! Discord-backed collaborators for the presence client.

mod assets;
mod transport;

pub use assets::DiscordAssetCatalog;
pub use transport::DiscordTransport;
