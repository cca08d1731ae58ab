use super::{derive_names, Module, ModuleState, TickContext};
use crate::host::Feature;
use crate::presence::{overrides, ArgumentKind, PresenceClient};
use crate::settings::Settings;
use crate::util;

/// Tracks the biome the player is standing in.
#[derive(Debug, Default)]
pub struct BiomeModule {
    state: ModuleState,
    current_name: Option<String>,
    current_id: Option<String>,
}

impl Module for BiomeModule {
    fn name(&self) -> &'static str {
        "Biome"
    }

    fn feature(&self) -> Feature {
        Feature::Biome
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }

    fn enabled_in(&self, settings: &Settings) -> bool {
        settings.general.detect_biome_data
    }

    fn configured_identifiers(&self, settings: &Settings) -> Vec<String> {
        settings.biome.biome_data.keys().cloned().collect()
    }

    fn update_data(&mut self, ctx: &mut TickContext<'_>) {
        let Some(biome) = ctx.host.current_biome() else {
            return;
        };
        let (name, id) = derive_names(&biome, !ctx.settings.advanced.format_words);

        if self.current_name.as_deref() != Some(name.as_str())
            || self.current_id.as_deref() != Some(id.as_str())
        {
            self.state.scan.push_unique(id.clone());
            self.current_name = Some(name);
            self.current_id = Some(id);
            self.update_presence(ctx);
        }
    }

    fn update_presence(&mut self, ctx: &mut TickContext<'_>) {
        let (Some(name), Some(id)) = (&self.current_name, &self.current_id) else {
            return;
        };
        let settings = &ctx.settings.biome;
        let resolved = overrides::resolve_or_log(&settings.biome_data, id, "biome");
        let icon = util::format_as_icon(&resolved.icon);
        let fallback = resolved
            .fallback_icon
            .as_deref()
            .unwrap_or(&settings.fallback_biome_icon);

        let client = &mut *ctx.client;
        client.sync_argument(
            "biome.default.icon",
            settings.fallback_biome_icon.as_str(),
            ArgumentKind::Icon,
        );
        client.sync_argument("biome.name", name.as_str(), ArgumentKind::Text);
        client.sync_override("biome.message", &resolved.record);
        client.sync_argument("biome.message", resolved.text, ArgumentKind::Text);
        let image = client.image_of(
            "biome.icon",
            true,
            &icon,
            fallback,
            &ctx.settings.general.default_icon,
        );
        client.sync_argument("biome.icon", image, ArgumentKind::Icon);
    }

    fn clear_client_data(&mut self, client: &mut PresenceClient) {
        self.current_name = None;
        self.current_id = None;
        self.state.in_use = false;
        client.remove_arguments(&["biome"]);
        client.clear_override("biome.message");
    }
}
