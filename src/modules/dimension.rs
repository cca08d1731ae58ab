use super::{derive_names, Module, ModuleState, TickContext};
use crate::host::Feature;
use crate::presence::{overrides, ArgumentKind, PresenceClient};
use crate::settings::Settings;
use crate::util;

/// Tracks the dimension (world realm) the player is in.
#[derive(Debug, Default)]
pub struct DimensionModule {
    state: ModuleState,
    current_name: Option<String>,
    current_id: Option<String>,
    class_name: String,
}

impl Module for DimensionModule {
    fn name(&self) -> &'static str {
        "Dimension"
    }

    fn feature(&self) -> Feature {
        Feature::Dimension
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }

    fn enabled_in(&self, settings: &Settings) -> bool {
        settings.general.detect_dimension_data
    }

    fn configured_identifiers(&self, settings: &Settings) -> Vec<String> {
        settings.dimension.dimension_data.keys().cloned().collect()
    }

    fn update_data(&mut self, ctx: &mut TickContext<'_>) {
        let Some(dimension) = ctx.host.current_dimension() else {
            return;
        };
        let (name, id) = derive_names(&dimension, !ctx.settings.advanced.format_words);

        if self.current_name.as_deref() != Some(name.as_str())
            || self.current_id.as_deref() != Some(id.as_str())
        {
            self.state.scan.push_unique(id.clone());
            self.current_name = Some(name);
            self.current_id = Some(id);
            self.class_name = dimension.class_name;
            self.update_presence(ctx);
        }
    }

    fn update_presence(&mut self, ctx: &mut TickContext<'_>) {
        let (Some(name), Some(id)) = (&self.current_name, &self.current_id) else {
            return;
        };
        let settings = &ctx.settings.dimension;
        let resolved = overrides::resolve_or_log(&settings.dimension_data, id, "dimension");
        let icon = util::format_as_icon(&resolved.icon);
        let fallback = resolved
            .fallback_icon
            .as_deref()
            .unwrap_or(&settings.fallback_dimension_icon);

        let client = &mut *ctx.client;
        client.sync_argument(
            "dimension.default.icon",
            settings.fallback_dimension_icon.as_str(),
            ArgumentKind::Icon,
        );
        client.sync_argument("dimension.name", name.as_str(), ArgumentKind::Text);
        client.sync_argument("data.dimension.class", self.class_name.as_str(), ArgumentKind::Text);
        client.sync_override("dimension.message", &resolved.record);
        client.sync_argument("dimension.message", resolved.text, ArgumentKind::Text);
        let image = client.image_of(
            "dimension.icon",
            true,
            &icon,
            fallback,
            &ctx.settings.general.default_icon,
        );
        client.sync_argument("dimension.icon", image, ArgumentKind::Icon);
    }

    fn clear_client_data(&mut self, client: &mut PresenceClient) {
        self.current_name = None;
        self.current_id = None;
        self.class_name.clear();
        self.state.in_use = false;
        client.remove_arguments(&["dimension", "data.dimension"]);
        client.clear_override("dimension.message");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::fakes::ScriptedHost;
    use super::super::test_support::{client_with_catalog, tick};
    use super::*;
    use crate::host::{GameState, NamedObject};

    fn host_in(name: &str, class_name: &str) -> Arc<ScriptedHost> {
        let host = Arc::new(ScriptedHost::in_session());
        *host.dimension.lock().unwrap() = Some(NamedObject::new(name, class_name));
        host
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn uses_default_text_for_unknown_dimension() {
        let host: Arc<dyn GameState> = host_in("The Nether", "WorldProviderHell");
        let (mut client, _) = client_with_catalog(&["the_nether"]);
        let settings = Settings::default();
        let mut module = DimensionModule::default();

        tick(&mut module, &host, &mut client, &settings);

        let args = client.arguments();
        assert_eq!(args.get("dimension.name", ArgumentKind::Text), Some("The Nether"));
        assert_eq!(
            args.get("dimension.message", ArgumentKind::Text),
            Some("In {dimension.name}")
        );
        assert_eq!(args.get("dimension.icon", ArgumentKind::Icon), Some("the_nether"));
        assert_eq!(
            args.get("data.dimension.class", ArgumentKind::Text),
            Some("WorldProviderHell")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn nameless_dimension_falls_back_to_class_name() {
        let host: Arc<dyn GameState> = host_in("", "WorldProviderEnd");
        let (mut client, _) = client_with_catalog(&[]);
        let settings = Settings::default();
        let mut module = DimensionModule::default();

        tick(&mut module, &host, &mut client, &settings);

        assert_eq!(
            client.arguments().get("dimension.name", ArgumentKind::Text),
            Some("worldproviderend")
        );
        assert!(module.state().scan.contains("worldproviderend"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_icon_resolves_empty() {
        let host: Arc<dyn GameState> = host_in("Overworld", "");
        let (mut client, _) = client_with_catalog(&[]);
        let settings = Settings::default();
        let mut module = DimensionModule::default();

        tick(&mut module, &host, &mut client, &settings);
        assert_eq!(
            client.arguments().get("dimension.icon", ArgumentKind::Icon),
            Some("")
        );
    }
}
