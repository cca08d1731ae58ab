use tokio::sync::mpsc;

use super::payload::PresencePayload;
use crate::error::Result;

/// Which desktop client build the transport should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientVariant {
    Canary,
    Ptb,
    Stable,
    #[default]
    Any,
}

impl ClientVariant {
    pub fn from_level(level: i32) -> Self {
        match level {
            0 => Self::Canary,
            1 => Self::Ptb,
            2 => Self::Stable,
            _ => Self::Any,
        }
    }
}

/// Inbound event kinds the client subscribes to after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JoinRequest,
    Join,
    Spectate,
}

/// A remote user, as reported by the presence peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: u64,
    pub username: String,
}

/// Events raised by the transport, delivered over the sink given to
/// [`Transport::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Ready(RemoteUser),
    Disconnected(String),
    JoinRequest(RemoteUser),
    Join { secret: String },
    Spectate { secret: String },
}

pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinReply {
    Accept,
    Decline,
    Ignore,
}

/// Local IPC channel to the presence peer. Every call fails with an error
/// value rather than hanging.
pub trait Transport: Send {
    /// Returns the name of this transport (for logging)
    fn name(&self) -> &'static str;

    fn connect(&mut self, client_id: &str, variant: ClientVariant, events: EventSink)
        -> Result<()>;

    fn subscribe(&mut self, kind: EventKind) -> Result<()>;

    fn send(&mut self, payload: &PresencePayload) -> Result<()>;

    fn reply(&mut self, user: &RemoteUser, reply: JoinReply) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// A remote image known to the presence peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: String,
    pub name: String,
    /// Set for custom assets backed by a URL instead of an uploaded image.
    pub url: Option<String>,
}

/// Catalog of remote assets for one client identity.
///
/// Lookups never fail; absence is reported as `false`/`None`.
pub trait AssetCatalog: Send + Sync {
    fn contains(&self, key: &str) -> bool;

    fn get(&self, key: &str) -> Option<Asset>;

    /// Any key from the catalog, or `None` when it is empty.
    fn random_key(&self) -> Option<String>;

    /// Start loading the catalog for `client_id`.
    fn reload(&self, client_id: &str);

    /// Bumped every time a load completes and the contents change.
    fn generation(&self) -> u64 {
        0
    }

    /// Drop every cached asset.
    fn purge(&self);

    /// Register an asset served from `url` under `key`.
    fn register_custom(&self, _key: &str, _url: &str) {}
}
