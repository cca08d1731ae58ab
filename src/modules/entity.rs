use super::{Module, ModuleState, TickContext};
use crate::host::{EntityInfo, Feature};
use crate::presence::{overrides, ArgumentKind, PresenceClient};
use crate::settings::{OverrideTable, Settings};
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Target,
    Riding,
}

impl Slot {
    fn prefix(self) -> &'static str {
        match self {
            Slot::Target => "entity.target",
            Slot::Riding => "entity.riding",
        }
    }

    fn data_prefix(self) -> &'static str {
        match self {
            Slot::Target => "data.entity.target",
            Slot::Riding => "data.entity.riding",
        }
    }

    fn table(self, settings: &Settings) -> &OverrideTable {
        match self {
            Slot::Target => &settings.advanced.entity.target_data,
            Slot::Riding => &settings.advanced.entity.riding_data,
        }
    }
}

/// Derived view of one entity; compared by value between ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Tracked {
    name: String,
    id: String,
    tags: Vec<(String, String)>,
}

impl Tracked {
    /// Players are keyed by UUID so renames keep their overrides.
    fn derive(entity: &EntityInfo, raw_words: bool) -> Self {
        let name = util::format_identifier(&entity.name, false, raw_words);
        let id = match &entity.uuid {
            Some(uuid) if entity.is_player && util::is_uuid(uuid) => uuid.to_lowercase(),
            _ => util::format_identifier(&entity.name, true, raw_words),
        };
        Self {
            name,
            id,
            tags: entity
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Tracks the entity under the crosshair and the entity being ridden.
#[derive(Debug, Default)]
pub struct EntityModule {
    state: ModuleState,
    target: Option<Tracked>,
    riding: Option<Tracked>,
}

impl EntityModule {
    fn tracked(&self, slot: Slot) -> Option<&Tracked> {
        match slot {
            Slot::Target => self.target.as_ref(),
            Slot::Riding => self.riding.as_ref(),
        }
    }

    fn sync_slot(&self, slot: Slot, ctx: &mut TickContext<'_>) {
        let prefix = slot.prefix();
        let client = &mut *ctx.client;

        let Some(tracked) = self.tracked(slot) else {
            client.remove_arguments(&[prefix, slot.data_prefix()]);
            client.clear_override(&format!("{prefix}.message"));
            return;
        };

        let fallback_icon = &ctx.settings.advanced.entity.fallback_entity_icon;
        let resolved = overrides::resolve_or_log(slot.table(ctx.settings), &tracked.id, prefix);
        let icon = util::format_as_icon(&resolved.icon);
        let fallback = resolved.fallback_icon.as_deref().unwrap_or(fallback_icon);

        client.sync_argument(
            &format!("{prefix}.name"),
            tracked.name.as_str(),
            ArgumentKind::Text,
        );
        for (tag, value) in &tracked.tags {
            client.sync_argument(
                &format!("{}.{}", slot.data_prefix(), tag),
                value.as_str(),
                ArgumentKind::Text,
            );
        }

        let message_key = format!("{prefix}.message");
        client.sync_override(&message_key, &resolved.record);
        client.sync_argument(&message_key, resolved.text, ArgumentKind::Text);

        let icon_key = format!("{prefix}.icon");
        let image = client.image_of(
            &icon_key,
            true,
            &icon,
            fallback,
            &ctx.settings.general.default_icon,
        );
        client.sync_argument(&icon_key, image, ArgumentKind::Icon);
    }
}

impl Module for EntityModule {
    fn name(&self) -> &'static str {
        "Entity"
    }

    fn feature(&self) -> Feature {
        Feature::Entity
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }

    fn enabled_in(&self, settings: &Settings) -> bool {
        settings.advanced.enable_per_entity
    }

    fn configured_identifiers(&self, settings: &Settings) -> Vec<String> {
        let entity = &settings.advanced.entity;
        entity
            .target_data
            .keys()
            .chain(entity.riding_data.keys())
            .cloned()
            .collect()
    }

    fn update_data(&mut self, ctx: &mut TickContext<'_>) {
        let raw_words = !ctx.settings.advanced.format_words;
        let target = ctx
            .host
            .targeted_entity()
            .map(|e| Tracked::derive(&e, raw_words));
        let riding = ctx
            .host
            .riding_entity()
            .map(|e| Tracked::derive(&e, raw_words));

        if target != self.target || riding != self.riding {
            for tracked in target.iter().chain(riding.iter()) {
                self.state.scan.push_unique(tracked.id.clone());
            }
            // Tag sets can shrink; start the data bindings fresh.
            if target.as_ref().map(|t| &t.tags) != self.target.as_ref().map(|t| &t.tags) {
                ctx.client.remove_arguments(&[Slot::Target.data_prefix()]);
            }
            if riding.as_ref().map(|t| &t.tags) != self.riding.as_ref().map(|t| &t.tags) {
                ctx.client.remove_arguments(&[Slot::Riding.data_prefix()]);
            }
            self.target = target;
            self.riding = riding;
            self.update_presence(ctx);
        }
    }

    fn update_presence(&mut self, ctx: &mut TickContext<'_>) {
        ctx.client.sync_argument(
            "entity.default.icon",
            ctx.settings.advanced.entity.fallback_entity_icon.as_str(),
            ArgumentKind::Icon,
        );
        self.sync_slot(Slot::Target, ctx);
        self.sync_slot(Slot::Riding, ctx);
    }

    fn clear_client_data(&mut self, client: &mut PresenceClient) {
        self.target = None;
        self.riding = None;
        self.state.in_use = false;
        client.remove_arguments(&["entity", "data.entity"]);
        client.clear_override("entity.target.message");
        client.clear_override("entity.riding.message");
    }
}
