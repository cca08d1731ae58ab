mod arguments;
pub(crate) mod assets;
pub(crate) mod client;
mod join;
mod manager;
pub mod overrides;
mod payload;
mod traits;

pub use arguments::{ArgumentKind, ArgumentStore};
pub use assets::{AssetCache, AssetTier};
pub use client::{validate_client_id, ConnectionStatus, InboundAction, PresenceClient};
pub use join::{JoinRequestState, JoinRequests, Notice};
pub use manager::{
    configured_client_id, start_presence_background_task, MenuStatus, PresenceManager,
};
pub use payload::{ImageSlot, Party, PartyPrivacy, PresencePayload, Secrets};
pub use traits::{
    Asset, AssetCatalog, ClientVariant, EventKind, EventSink, JoinReply, RemoteUser, Transport,
    TransportEvent,
};
