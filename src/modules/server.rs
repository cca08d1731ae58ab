use super::{IdStyle, Module, ModuleState, TickContext};
use crate::host::Feature;
use crate::presence::{overrides, ArgumentKind, Notice, Party, PartyPrivacy, PresenceClient};
use crate::settings::{ModuleData, Settings};
use crate::util;

const LOCAL_ADDRESS: &str = "127.0.0.1";

/// Minimum length of an application id embedded in a join secret.
const MIN_CLIENT_ID_LEN: usize = 18;

/// Everything the server module derives from one read of host state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ServerView {
    on_server: bool,
    singleplayer: bool,
    is_lan: bool,
    address: String,
    name: String,
    motd: String,
    players: u32,
    max_players: u32,
    world_name: String,
    difficulty: String,
    time_24: String,
    time_12: String,
    day: String,
}

impl ServerView {
    fn read(ctx: &TickContext<'_>) -> Self {
        let host = ctx.host;
        let fallbacks = &ctx.settings.server;
        let server = host.current_server();
        let singleplayer = host.is_singleplayer();

        let players = server.as_ref().map_or(1, |s| s.players);
        let max_players = match &server {
            Some(s) if s.max_players >= players => s.max_players,
            _ => players + 1,
        };
        let is_lan = (singleplayer && players > 1) || server.as_ref().is_some_and(|s| s.is_lan);

        let address = server
            .as_ref()
            .map(|s| s.address.as_str())
            .filter(|a| !a.is_empty())
            .unwrap_or(LOCAL_ADDRESS)
            .to_string();
        let name = server
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(&fallbacks.fallback_server_name)
            .to_string();
        let motd = server
            .as_ref()
            .and_then(|s| s.motd.as_deref())
            .filter(|m| !is_lan && !singleplayer && !m.is_empty())
            .map(util::strip_colors)
            .unwrap_or_else(|| fallbacks.fallback_server_motd.clone());

        let world = host.world_info();
        let (time_24, time_12, day) = match &world {
            Some(w) => (
                util::world_time_24(w.time_ticks),
                util::world_time_12(w.time_ticks),
                util::world_day(w.time_ticks),
            ),
            None => Default::default(),
        };
        let world = world.unwrap_or_default();

        Self {
            on_server: server.is_some(),
            singleplayer,
            is_lan,
            address,
            name,
            motd,
            players,
            max_players,
            world_name: world.name,
            difficulty: world.difficulty,
            time_24,
            time_12,
            day,
        }
    }

    fn short_address(&self) -> String {
        util::short_address(&self.address)
    }
}

/// Tracks the connected server (or singleplayer world) and the world clock.
/// Also advertises a joinable party when join requests are enabled.
#[derive(Debug, Default)]
pub struct ServerModule {
    state: ModuleState,
    current: Option<ServerView>,
}

impl ServerModule {
    /// Text, icon and override record for the current connection.
    fn resolve_status(
        view: &ServerView,
        ctx: &mut TickContext<'_>,
    ) -> (String, String, ModuleData) {
        let settings = ctx.settings;
        let status = &settings.status_messages;

        if view.singleplayer && !view.is_lan {
            let record = status.singleplayer_data.clone();
            return (
                record.text().unwrap_or_default().to_string(),
                record.icon().unwrap_or_default().to_string(),
                record,
            );
        }
        if view.is_lan {
            let record = status.lan_data.clone();
            return (
                record.text().unwrap_or_default().to_string(),
                record.icon().unwrap_or_default().to_string(),
                record,
            );
        }
        if !view.on_server {
            return (String::new(), String::new(), ModuleData::default());
        }

        let table = &settings.server.server_data;
        let short = view.short_address();
        let key = if table.contains_key(&short) {
            short.as_str()
        } else {
            view.name.as_str()
        };
        let resolved = overrides::resolve_or_log(table, key, "server");

        let specific_icon = table.get(key).and_then(ModuleData::icon);
        let advanced = &settings.advanced;
        let icon = if specific_icon.is_none()
            && advanced.allow_endpoint_icons
            && !advanced.server_icon_endpoint.is_empty()
        {
            let url = advanced.server_icon_endpoint.replace("{}", &short);
            let asset_key = util::format_as_icon(&short);
            ctx.client.catalog().register_custom(&asset_key, &url);
            asset_key
        } else {
            resolved.icon
        };

        (resolved.text, icon, resolved.record)
    }

    fn sync_party(view: &ServerView, ctx: &mut TickContext<'_>) {
        let general = &ctx.settings.general;
        let joinable = view.on_server && !view.is_lan && !view.singleplayer;
        if !general.enable_join_requests || !joinable {
            ctx.client.clear_party_data(false);
            return;
        }
        let fallback_name = &ctx.settings.server.fallback_server_name;
        let id = if !view.name.is_empty() && !view.name.eq_ignore_ascii_case(fallback_name) {
            format!("Join Server: {}", view.name)
        } else {
            format!("Join Server: {}", view.address)
        };
        let secret = make_secret(ctx.client.client_id(), &view.name, &view.address);
        ctx.client.set_party(
            Party {
                id,
                size: view.players,
                max: view.max_players,
                privacy: PartyPrivacy::from_level(general.party_privacy_level),
            },
            secret,
        );
    }
}

impl Module for ServerModule {
    fn name(&self) -> &'static str {
        "Server"
    }

    fn feature(&self) -> Feature {
        Feature::Server
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }

    fn enabled_in(&self, settings: &Settings) -> bool {
        settings.general.detect_world_data
    }

    fn configured_identifiers(&self, settings: &Settings) -> Vec<String> {
        settings.server.server_data.keys().cloned().collect()
    }

    fn id_style(&self) -> IdStyle {
        IdStyle::Address
    }

    fn update_data(&mut self, ctx: &mut TickContext<'_>) {
        let view = ServerView::read(ctx);
        if self.current.as_ref() != Some(&view) {
            if view.on_server {
                self.state.scan.push_unique(view.short_address());
            }
            self.current = Some(view);
            self.update_presence(ctx);
        }
    }

    fn update_presence(&mut self, ctx: &mut TickContext<'_>) {
        let Some(view) = self.current.clone() else {
            return;
        };

        let world = [
            ("world.name", &view.world_name),
            ("world.difficulty", &view.difficulty),
            ("world.time24", &view.time_24),
            ("world.time12", &view.time_12),
            ("world.day", &view.day),
        ];
        for (key, value) in world {
            ctx.client.sync_argument(key, value.as_str(), ArgumentKind::Text);
        }
        ctx.client.sync_argument(
            "server.default.icon",
            ctx.settings.server.fallback_server_icon.as_str(),
            ArgumentKind::Icon,
        );

        if view.on_server && !view.singleplayer {
            let short = view.short_address();
            let client = &mut *ctx.client;
            let text = [
                ("server.players.current", view.players.to_string()),
                ("server.players.max", view.max_players.to_string()),
                ("server.address.full", view.address.clone()),
                ("server.address.short", short),
                ("server.name", view.name.clone()),
                ("server.motd.raw", view.motd.clone()),
            ];
            for (key, value) in text {
                client.sync_argument(key, value, ArgumentKind::Text);
            }
            client.remove_arguments(&["data.server.motd"]);
            for (index, line) in view.motd.lines().enumerate() {
                client.sync_argument(
                    &format!("data.server.motd.line.{}", index + 1),
                    line.trim(),
                    ArgumentKind::Text,
                );
            }
        }

        let (message, icon, record) = Self::resolve_status(&view, ctx);
        Self::sync_party(&view, ctx);

        let icon = util::format_as_icon(&icon);
        let client = &mut *ctx.client;
        let image = client.image_of(
            "server.icon",
            true,
            &icon,
            &ctx.settings.server.fallback_server_icon,
            &ctx.settings.general.default_icon,
        );
        client.sync_override("server.message", &record);
        client.sync_argument("server.message", message, ArgumentKind::Text);
        client.sync_argument("server.icon", image, ArgumentKind::Icon);
    }

    fn clear_client_data(&mut self, client: &mut PresenceClient) {
        self.current = None;
        self.state.in_use = false;
        client.remove_arguments(&["server", "world", "data.server"]);
        client.clear_override("server.message");
        client.clear_party_data(true);
    }
}

/// A server decoded from a join secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTarget {
    pub name: String,
    pub address: String,
}

/// Separator characters percent-escaped inside secret fields. `%` goes first
/// so escaping is reversible.
const SECRET_ESCAPES: [(&str, &str); 3] = [("%", "%25"), ("-", "%2d"), (";", "%3b")];

fn escape_field(field: &str) -> String {
    SECRET_ESCAPES
        .iter()
        .fold(field.to_lowercase(), |acc, &(raw, escaped)| acc.replace(raw, escaped))
}

fn unescape_field(field: &str) -> String {
    SECRET_ESCAPES
        .iter()
        .rev()
        .fold(field.to_string(), |acc, &(raw, escaped)| acc.replace(escaped, raw))
}

/// Encode a join secret: `<clientId>-<name>-<ip>;<hasName>;<hasIp>`.
/// Separators inside the name or address are percent-escaped.
pub fn make_secret(client_id: &str, name: &str, address: &str) -> String {
    let mut secret = client_id.to_string();
    if !name.is_empty() {
        secret.push('-');
        secret.push_str(&escape_field(name));
    }
    if !address.is_empty() {
        secret.push('-');
        secret.push_str(&escape_field(address));
    }
    format!("{};{};{}", secret, !name.is_empty(), !address.is_empty())
}

/// Decode a join secret produced by [`make_secret`]. Returns `None` when the
/// secret is malformed or its client id is not a plausible snowflake.
pub fn parse_secret(secret: &str, fallback_name: &str) -> Option<JoinTarget> {
    let flags: Vec<&str> = secret.split(';').collect();
    let parts: Vec<&str> = flags[0].split('-').collect();
    if flags.len() > 4 || parts.len() > 3 {
        return None;
    }

    let client_id = parts[0];
    if client_id.len() < MIN_CLIENT_ID_LEN || client_id.parse::<u64>().is_err() {
        return None;
    }

    let flag = |index: usize| {
        flags
            .get(index)
            .is_some_and(|f| f.eq_ignore_ascii_case("true"))
    };
    let has_name = flag(1) && parts.len() > 1;
    let address_index = if has_name { 2 } else { 1 };
    let has_address = flag(2) && parts.len() > address_index;

    Some(JoinTarget {
        name: if has_name {
            unescape_field(parts[1])
        } else {
            fallback_name.to_string()
        },
        address: if has_address {
            unescape_field(parts[address_index])
        } else {
            String::new()
        },
    })
}

/// Handle an inbound join or spectate secret: verify it and, when join
/// requests are enabled, ask the host to connect.
pub fn verify_and_join(
    secret: &str,
    settings: &Settings,
    client: &mut PresenceClient,
) -> Option<JoinTarget> {
    let Some(target) = parse_secret(secret, &settings.server.fallback_server_name) else {
        tracing::error!("Received an invalid join secret: {}", secret);
        return None;
    };
    if !settings.general.enable_join_requests {
        tracing::error!("Ignoring join secret, join requests are disabled");
        return None;
    }
    tracing::info!("Joining {} ({})", target.name, target.address);
    client.push_notice(Notice::JoinServer {
        name: target.name.clone(),
        address: target.address.clone(),
    });
    Some(target)
}
