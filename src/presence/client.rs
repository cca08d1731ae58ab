//! Owns the connection to the presence peer and the outbound payload.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::arguments::{ArgumentKind, ArgumentStore};
use super::assets::AssetCache;
use super::join::{JoinRequests, Notice};
use super::payload::{ImageSlot, Party, PresencePayload, Secrets};
use super::traits::{
    AssetCatalog, ClientVariant, EventKind, JoinReply, RemoteUser, Transport, TransportEvent,
};
use crate::error::{PresenceError, Result};
use crate::host::GameState;
use crate::settings::{DisplaySettings, ModuleData, PresenceData, Settings};
use crate::template::TemplateExpander;

const SUBSCRIBED_EVENTS: [EventKind; 3] =
    [EventKind::JoinRequest, EventKind::Join, EventKind::Spectate];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Inbound requests the orchestrator routes to a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundAction {
    Join { secret: String },
    Spectate { secret: String },
}

/// Check that a client id looks like an application snowflake.
pub fn validate_client_id(client_id: &str) -> Result<()> {
    if !client_id.is_empty() && client_id.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(PresenceError::InvalidClientId(client_id.to_string()))
    }
}

pub struct PresenceClient {
    client_id: String,
    preferred_variant: ClientVariant,
    status: ConnectionStatus,
    transport: Box<dyn Transport>,
    catalog: Arc<dyn AssetCatalog>,
    expander: Arc<dyn TemplateExpander>,
    arguments: ArgumentStore,
    overrides: BTreeMap<String, PresenceData>,
    image_cache: AssetCache,
    party: Option<Party>,
    secrets: Secrets,
    start_timestamp: Option<i64>,
    last_sent: Option<PresencePayload>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    join_requests: JoinRequests,
    notices: Vec<Notice>,
    current_user: Option<RemoteUser>,
}

impl PresenceClient {
    pub fn new(
        client_id: impl Into<String>,
        transport: Box<dyn Transport>,
        catalog: Arc<dyn AssetCatalog>,
        expander: Arc<dyn TemplateExpander>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            preferred_variant: ClientVariant::Any,
            status: ConnectionStatus::Disconnected,
            transport,
            catalog,
            expander,
            arguments: ArgumentStore::new(),
            overrides: BTreeMap::new(),
            image_cache: AssetCache::new(),
            party: None,
            secrets: Secrets::default(),
            start_timestamp: None,
            last_sent: None,
            events: None,
            join_requests: JoinRequests::new(Duration::from_secs(30)),
            notices: Vec::new(),
            current_user: None,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn set_client_id(&mut self, client_id: &str) {
        self.client_id = client_id.to_string();
    }

    pub fn preferred_variant(&self) -> ClientVariant {
        self.preferred_variant
    }

    pub(crate) fn set_preferred_variant(&mut self, variant: ClientVariant) {
        self.preferred_variant = variant;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn current_user(&self) -> Option<&RemoteUser> {
        self.current_user.as_ref()
    }

    pub fn catalog(&self) -> &Arc<dyn AssetCatalog> {
        &self.catalog
    }

    pub fn arguments(&self) -> &ArgumentStore {
        &self.arguments
    }

    #[cfg(test)]
    pub(crate) fn arguments_mut(&mut self) -> &mut ArgumentStore {
        &mut self.arguments
    }

    pub fn last_sent(&self) -> Option<&PresencePayload> {
        self.last_sent.as_ref()
    }

    pub fn pending_requester(&self) -> Option<&RemoteUser> {
        self.join_requests.pending()
    }

    /// Open the transport, subscribe to inbound events and publish once.
    pub fn init(&mut self, settings: &Settings, host: &dyn GameState, reset_start_time: bool) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(rx);
        self.status = ConnectionStatus::Connecting;
        self.join_requests
            .set_timeout(Duration::from_secs(settings.general.join_request_timeout_secs));

        tracing::info!(
            "Connecting {} transport with client id {}",
            self.transport.name(),
            self.client_id
        );

        if let Err(e) = self
            .transport
            .connect(&self.client_id, self.preferred_variant, tx)
        {
            tracing::warn!("Failed to connect presence transport: {}", e);
            self.status = ConnectionStatus::Disconnected;
        } else {
            for kind in SUBSCRIBED_EVENTS {
                if let Err(e) = self.transport.subscribe(kind) {
                    tracing::warn!("Failed to subscribe to {:?}: {}", kind, e);
                }
            }
        }

        if reset_start_time || self.start_timestamp.is_none() {
            self.start_timestamp = Some(chrono::Utc::now().timestamp());
        }

        self.sync_argument(
            "general.version",
            host.game_version().unwrap_or_default(),
            ArgumentKind::Text,
        );
        self.sync_argument(
            "player.name",
            host.player_name().unwrap_or_default(),
            ArgumentKind::Text,
        );
        self.arguments.mark_dirty();

        self.tick(settings, Instant::now());
    }

    pub fn sync_argument(
        &mut self,
        key: &str,
        value: impl Into<String>,
        kind: ArgumentKind,
    ) -> bool {
        self.arguments.sync(key, value, kind)
    }

    pub fn remove_arguments(&mut self, prefixes: &[&str]) {
        self.arguments.remove_prefixed(prefixes);
    }

    /// Remember the presence block of `record` for `slot`, or drop it when the
    /// record has none (or has it disabled).
    pub fn sync_override(&mut self, slot: &str, record: &ModuleData) {
        match record.data.as_ref().filter(|data| data.enabled) {
            Some(data) => {
                if self.overrides.get(slot) != Some(data) {
                    self.overrides.insert(slot.to_string(), data.clone());
                    self.arguments.mark_dirty();
                }
            }
            None => self.clear_override(slot),
        }
    }

    pub fn clear_override(&mut self, slot: &str) {
        if self.overrides.remove(slot).is_some() {
            self.arguments.mark_dirty();
        }
    }

    /// Resolve an icon through the asset cache. See [`AssetCache::image_of`].
    pub fn image_of(
        &mut self,
        lookup_key: &str,
        allow_empty: bool,
        primary: &str,
        fallback: &str,
        default_icon: &str,
    ) -> String {
        let (value, _) = self.image_cache.image_of(
            self.catalog.as_ref(),
            lookup_key,
            allow_empty,
            primary,
            fallback,
            default_icon,
        );
        value
    }

    pub fn set_party(&mut self, party: Party, join_secret: String) {
        let secret = Some(join_secret);
        if self.party.as_ref() != Some(&party) || self.secrets.join != secret {
            self.party = Some(party);
            self.secrets.join = secret;
            self.arguments.mark_dirty();
        }
    }

    pub fn clear_party_data(&mut self, clear_requester: bool) {
        if clear_requester {
            self.join_requests.clear();
        }
        if self.party.is_some() || self.secrets.join.is_some() {
            self.party = None;
            self.secrets.join = None;
            self.arguments.mark_dirty();
        }
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Drain transport events, then rebuild the payload and send it if it
    /// differs from the last one sent.
    pub fn tick(&mut self, settings: &Settings, now: Instant) -> Vec<InboundAction> {
        let actions = self.drain_events(settings, now);

        if self.status == ConnectionStatus::Connected
            && (self.arguments.is_dirty() || self.last_sent.is_none())
        {
            let payload = self.build_payload(settings);
            if self.last_sent.as_ref() == Some(&payload) {
                self.arguments.take_dirty();
            } else {
                match self.transport.send(&payload) {
                    Ok(()) => {
                        tracing::debug!("Sent presence update: {:?}", payload);
                        self.last_sent = Some(payload);
                        self.arguments.take_dirty();
                    }
                    Err(e) => tracing::warn!("Failed to send presence update: {}", e),
                }
            }
        }

        actions
    }

    fn drain_events(&mut self, settings: &Settings, now: Instant) -> Vec<InboundAction> {
        let mut actions = Vec::new();
        let Some(events) = self.events.as_mut() else {
            return actions;
        };

        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }

        for event in drained {
            match event {
                TransportEvent::Ready(user) => {
                    tracing::info!("Presence client connected as {}", user.username);
                    self.status = ConnectionStatus::Connected;
                    self.current_user = Some(user);
                    self.last_sent = None;
                }
                TransportEvent::Disconnected(reason) => {
                    tracing::warn!("Presence client disconnected: {}", reason);
                    self.status = ConnectionStatus::Disconnected;
                    self.current_user = None;
                    self.last_sent = None;
                }
                TransportEvent::JoinRequest(user) => {
                    if settings.general.enable_join_requests {
                        tracing::info!("Join request from {}", user.username);
                        self.notices.push(Notice::JoinRequested {
                            username: user.username.clone(),
                        });
                        self.join_requests.begin(user, now);
                    } else {
                        tracing::warn!(
                            "Join request from {} ignored, join requests are disabled",
                            user.username
                        );
                        if let Err(e) = self.transport.reply(&user, JoinReply::Ignore) {
                            tracing::warn!("Failed to reply to join request: {}", e);
                        }
                    }
                }
                TransportEvent::Join { secret } => actions.push(InboundAction::Join { secret }),
                TransportEvent::Spectate { secret } => {
                    actions.push(InboundAction::Spectate { secret })
                }
            }
        }

        actions
    }

    /// Answer the pending join request. Returns false if none was pending.
    pub fn respond_to_join_request(&mut self, accept: bool) -> bool {
        let Some((user, reply)) = self.join_requests.respond(accept) else {
            return false;
        };
        if let Err(e) = self.transport.reply(&user, reply) {
            tracing::warn!("Failed to reply to join request: {}", e);
        }
        let username = user.username;
        self.notices.push(if accept {
            Notice::JoinRequestAccepted { username }
        } else {
            Notice::JoinRequestDeclined { username }
        });
        true
    }

    /// Housekeeping after the locked part of the tick: expire a stale join
    /// request prompt.
    pub fn post_tick(&mut self, now: Instant) {
        if let Some(user) = self.join_requests.expire(now) {
            tracing::info!("Join request from {} timed out, ignoring", user.username);
            if let Err(e) = self.transport.reply(&user, JoinReply::Ignore) {
                tracing::warn!("Failed to reply to join request: {}", e);
            }
            self.notices.push(Notice::JoinRequestIgnored {
                username: user.username,
            });
        }
    }

    /// Effective templates after applying every active override in slot
    /// order.
    fn effective_templates(&self, settings: &Settings) -> DisplaySettings {
        let mut display = settings.display.clone();
        for data in self.overrides.values() {
            if data.use_as_main {
                display = DisplaySettings {
                    details: data.details.clone(),
                    game_state: data.game_state.clone(),
                    large_image_key: data.large_image_key.clone(),
                    large_image_text: data.large_image_text.clone(),
                    small_image_key: data.small_image_key.clone(),
                    small_image_text: data.small_image_text.clone(),
                };
                continue;
            }
            let fields = [
                (&mut display.details, &data.details),
                (&mut display.game_state, &data.game_state),
                (&mut display.large_image_key, &data.large_image_key),
                (&mut display.large_image_text, &data.large_image_text),
                (&mut display.small_image_key, &data.small_image_key),
                (&mut display.small_image_text, &data.small_image_text),
            ];
            for (target, value) in fields {
                if !value.is_empty() {
                    *target = value.clone();
                }
            }
        }
        display
    }

    pub fn build_payload(&self, settings: &Settings) -> PresencePayload {
        let display = self.effective_templates(settings);
        let text = self.arguments.text_bindings();
        let icons = self.arguments.icon_bindings();
        let expand = |template: &str, bindings: &BTreeMap<String, String>| {
            self.expander.expand(template, bindings)
        };

        PresencePayload {
            state: expand(&display.game_state, text),
            details: expand(&display.details, text),
            large_image: ImageSlot {
                key: expand(&display.large_image_key, icons),
                text: expand(&display.large_image_text, text),
            },
            small_image: ImageSlot {
                key: expand(&display.small_image_key, icons),
                text: expand(&display.small_image_text, text),
            },
            start_timestamp: self.start_timestamp.filter(|_| settings.general.show_time),
            end_timestamp: None,
            party: self.party.clone(),
            secrets: self.secrets.clone(),
        }
    }

    /// Best-effort close; failures are logged, never propagated.
    pub fn shut_down(&mut self) {
        if let Err(e) = self.transport.close() {
            tracing::warn!("Failed to close presence transport: {}", e);
        }
        self.status = ConnectionStatus::Disconnected;
        self.events = None;
        self.last_sent = None;
        self.current_user = None;
        self.clear_party_data(true);
        self.image_cache.invalidate();
        tracing::info!("Presence client shut down");
    }

    pub(crate) fn invalidate_image_cache(&mut self) {
        self.image_cache.invalidate();
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::super::payload::PresencePayload;
    use super::super::traits::{
        ClientVariant, EventKind, EventSink, JoinReply, RemoteUser, Transport, TransportEvent,
    };
    use crate::error::{PresenceError, Result};
    use std::sync::{Arc, Mutex};

    /// Transport that records every call into a shared journal and
    /// optionally reports itself ready as soon as it connects.
    pub struct FakeTransport {
        pub journal: Arc<Mutex<Vec<String>>>,
        pub sent: Arc<Mutex<Vec<PresencePayload>>>,
        pub sink: Arc<Mutex<Option<EventSink>>>,
        pub auto_ready: bool,
        pub fail_send: bool,
    }

    impl FakeTransport {
        pub fn new(journal: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                journal,
                sent: Arc::new(Mutex::new(Vec::new())),
                sink: Arc::new(Mutex::new(None)),
                auto_ready: true,
                fail_send: false,
            }
        }

        fn record(&self, entry: String) {
            self.journal.lock().unwrap().push(entry);
        }
    }

    impl Transport for FakeTransport {
        fn name(&self) -> &'static str {
            "Fake"
        }

        fn connect(
            &mut self,
            client_id: &str,
            _variant: ClientVariant,
            events: EventSink,
        ) -> Result<()> {
            self.record(format!("connect:{client_id}"));
            if self.auto_ready {
                let _ = events.send(TransportEvent::Ready(RemoteUser {
                    id: 1,
                    username: "me".to_string(),
                }));
            }
            *self.sink.lock().unwrap() = Some(events);
            Ok(())
        }

        fn subscribe(&mut self, kind: EventKind) -> Result<()> {
            self.record(format!("subscribe:{kind:?}"));
            Ok(())
        }

        fn send(&mut self, payload: &PresencePayload) -> Result<()> {
            if self.fail_send {
                return Err(PresenceError::Transport("pipe closed".to_string()));
            }
            self.record("send".to_string());
            self.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }

        fn reply(&mut self, user: &RemoteUser, reply: JoinReply) -> Result<()> {
            self.record(format!("reply:{}:{reply:?}", user.username));
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.record("close".to_string());
            Ok(())
        }
    }
}
