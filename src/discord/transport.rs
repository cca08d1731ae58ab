//! Discord Rich Presence transport using discord-sdk

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use discord_sdk::{
    activity::{
        events::ActivityEvent, ActivityBuilder, Assets, JoinRequestReply,
        PartyPrivacy as SdkPrivacy, Secrets as SdkSecrets,
    },
    wheel::{UserState, Wheel},
    Discord, Subscriptions,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::error::{PresenceError, Result};
use crate::presence::{
    ClientVariant, EventKind, EventSink, JoinReply, PartyPrivacy, PresencePayload, RemoteUser,
    Transport, TransportEvent,
};

/// Timeout for waiting for Discord handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

enum Command {
    Send(Box<PresencePayload>),
    Reply(u64, JoinReply),
    Close,
}

type Subscribed = Arc<Mutex<HashSet<EventKind>>>;

/// Transport that drives a discord-sdk connection on a background task.
///
/// Every trait call only queues a command, so none of them block the tick
/// loop. Connection outcome and inbound activity events arrive through the
/// event sink handed to [`Transport::connect`].
pub struct DiscordTransport {
    runtime: Handle,
    commands: Option<mpsc::UnboundedSender<Command>>,
    subscribed: Subscribed,
}

impl DiscordTransport {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            commands: None,
            subscribed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn queue(&self, command: Command) -> Result<()> {
        let tx = self
            .commands
            .as_ref()
            .ok_or_else(|| PresenceError::Transport("Not connected".to_string()))?;
        tx.send(command)
            .map_err(|_| PresenceError::Transport("Discord task has stopped".to_string()))
    }
}

fn parse_app_id(client_id: &str) -> Result<i64> {
    client_id
        .parse::<i64>()
        .map_err(|_| PresenceError::InvalidClientId(client_id.to_string()))
}

fn build_activity(payload: &PresencePayload) -> ActivityBuilder {
    let mut activity = ActivityBuilder::new();

    if !payload.state.is_empty() {
        activity = activity.state(payload.state.as_str());
    }
    if !payload.details.is_empty() {
        activity = activity.details(payload.details.as_str());
    }

    let mut assets = Assets::default();
    let large = &payload.large_image;
    if !large.key.is_empty() {
        assets = assets.large(large.key.as_str(), non_empty(&large.text));
    }
    let small = &payload.small_image;
    if !small.key.is_empty() {
        assets = assets.small(small.key.as_str(), non_empty(&small.text));
    }
    activity = activity.assets(assets);

    if let Some(start) = payload.start_timestamp {
        activity = activity.start_timestamp(start);
    }
    if let Some(end) = payload.end_timestamp {
        activity = activity.end_timestamp(end);
    }

    if let Some(party) = &payload.party {
        let privacy = match party.privacy {
            PartyPrivacy::Private => SdkPrivacy::Private,
            PartyPrivacy::Public => SdkPrivacy::Public,
        };
        activity = activity.party(
            party.id.as_str(),
            NonZeroU32::new(party.size),
            NonZeroU32::new(party.max),
            privacy,
        );
    }

    if !payload.secrets.is_empty() {
        activity = activity.secrets(SdkSecrets {
            join: payload.secrets.join.clone(),
            spectate: payload.secrets.spectate.clone(),
            r#match: payload.secrets.match_secret.clone(),
        });
    }

    activity
}

fn non_empty(text: &str) -> Option<&str> {
    (!text.is_empty()).then_some(text)
}

fn sdk_reply(reply: JoinReply) -> JoinRequestReply {
    match reply {
        JoinReply::Accept => JoinRequestReply::Yes,
        JoinReply::Decline => JoinRequestReply::No,
        JoinReply::Ignore => JoinRequestReply::Ignore,
    }
}

fn map_activity_event(event: ActivityEvent) -> Option<(EventKind, TransportEvent)> {
    match event {
        ActivityEvent::JoinRequest(request) => Some((
            EventKind::JoinRequest,
            TransportEvent::JoinRequest(RemoteUser {
                id: request.user.id.0,
                username: request.user.username,
            }),
        )),
        ActivityEvent::Join(join) => Some((
            EventKind::Join,
            TransportEvent::Join {
                secret: join.secret,
            },
        )),
        ActivityEvent::Spectate(spectate) => Some((
            EventKind::Spectate,
            TransportEvent::Spectate {
                secret: spectate.secret,
            },
        )),
        _ => None,
    }
}

/// Background task that owns the Discord connection for one client id
async fn run_discord_task(
    app_id: i64,
    events: EventSink,
    subscribed: Subscribed,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let (wheel, handler) = Wheel::new(Box::new(|err| {
        tracing::warn!("Discord error: {:?}", err);
    }));

    let mut user_spoke = wheel.user();
    let mut activity_spoke = wheel.activity();

    let discord = match Discord::new(app_id, Subscriptions::ACTIVITY, Box::new(handler)) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!("Discord not available: {:?}", e);
            let _ = events.send(TransportEvent::Disconnected(format!("{:?}", e)));
            return;
        }
    };

    tracing::info!("Discord connecting...");

    let user = match tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        if user_spoke.0.changed().await.is_err() {
            Err("Discord connection closed".to_string())
        } else {
            match &*user_spoke.0.borrow() {
                UserState::Connected(user) => Ok(user.clone()),
                UserState::Disconnected(err) => Err(format!("Discord disconnected: {:?}", err)),
            }
        }
    })
    .await
    {
        Ok(Ok(user)) => user,
        Ok(Err(e)) => {
            tracing::warn!("{}", e);
            let _ = events.send(TransportEvent::Disconnected(e));
            discord.disconnect().await;
            return;
        }
        Err(_) => {
            tracing::warn!("Discord handshake timed out");
            let _ = events.send(TransportEvent::Disconnected(
                "Handshake timed out".to_string(),
            ));
            discord.disconnect().await;
            return;
        }
    };

    tracing::info!(
        "Discord Rich Presence connected as {}#{}",
        user.username,
        user.discriminator.unwrap_or(0)
    );
    let _ = events.send(TransportEvent::Ready(RemoteUser {
        id: user.id.0,
        username: user.username.clone(),
    }));

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(payload)) => {
                    if let Err(e) = discord.update_activity(build_activity(&payload)).await {
                        tracing::debug!("Failed to update Discord activity: {:?}", e);
                    }
                }
                Some(Command::Reply(user_id, reply)) => {
                    if let Err(e) = discord
                        .send_join_request_reply(
                            discord_sdk::Snowflake(user_id),
                            sdk_reply(reply),
                        )
                        .await
                    {
                        tracing::debug!("Failed to reply to join request: {:?}", e);
                    }
                }
                Some(Command::Close) | None => {
                    if let Err(e) = discord.clear_activity().await {
                        tracing::debug!("Failed to clear Discord activity: {:?}", e);
                    }
                    break;
                }
            },
            event = activity_spoke.0.recv() => match event {
                Ok(event) => {
                    if let Some((kind, event)) = map_activity_event(event) {
                        let wanted = subscribed
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .contains(&kind);
                        if wanted {
                            let _ = events.send(event);
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} Discord activity events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            changed = user_spoke.0.changed() => {
                let lost = match changed {
                    Err(_) => Some("Discord connection closed".to_string()),
                    Ok(()) => match &*user_spoke.0.borrow() {
                        UserState::Disconnected(err) => Some(format!("{:?}", err)),
                        UserState::Connected(_) => None,
                    },
                };
                if let Some(reason) = lost {
                    tracing::warn!("Discord connection lost: {}", reason);
                    let _ = events.send(TransportEvent::Disconnected(reason));
                    break;
                }
            }
        }
    }

    discord.disconnect().await;
    tracing::info!("Discord Rich Presence disconnected");
}

impl Transport for DiscordTransport {
    fn name(&self) -> &'static str {
        "Discord"
    }

    fn connect(
        &mut self,
        client_id: &str,
        variant: ClientVariant,
        events: EventSink,
    ) -> Result<()> {
        let app_id = parse_app_id(client_id)?;
        if self.commands.is_some() {
            self.close()?;
        }

        // discord-sdk picks whichever client answers first
        tracing::debug!("Preferred Discord client: {:?}", variant);

        self.subscribed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();

        let (tx, rx) = mpsc::unbounded_channel();
        self.runtime.spawn(run_discord_task(
            app_id,
            events,
            Arc::clone(&self.subscribed),
            rx,
        ));
        self.commands = Some(tx);
        Ok(())
    }

    fn subscribe(&mut self, kind: EventKind) -> Result<()> {
        if self.commands.is_none() {
            return Err(PresenceError::Transport("Not connected".to_string()));
        }
        self.subscribed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind);
        Ok(())
    }

    fn send(&mut self, payload: &PresencePayload) -> Result<()> {
        self.queue(Command::Send(Box::new(payload.clone())))
    }

    fn reply(&mut self, user: &RemoteUser, reply: JoinReply) -> Result<()> {
        self.queue(Command::Reply(user.id, reply))
    }

    fn close(&mut self) -> Result<()> {
        let Some(tx) = self.commands.take() else {
            return Ok(());
        };
        // a stopped task has nothing left to close
        let _ = tx.send(Command::Close);
        Ok(())
    }
}
