use super::{derive_names, Module, ModuleState, TickContext};
use crate::host::{Feature, GameState};
use crate::presence::{overrides, ArgumentKind, PresenceClient};
use crate::settings::Settings;
use crate::util;

/// Tracks the UI screen currently open. Unlike the world modules it is live
/// whenever a screen is shown, with or without a session.
#[derive(Debug, Default)]
pub struct ScreenModule {
    state: ModuleState,
    current_name: Option<String>,
    current_id: Option<String>,
}

impl Module for ScreenModule {
    fn name(&self) -> &'static str {
        "Screen"
    }

    fn feature(&self) -> Feature {
        Feature::Screen
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }

    fn enabled_in(&self, settings: &Settings) -> bool {
        settings.advanced.enable_per_screen
    }

    fn has_live_session(&self, host: &dyn GameState) -> bool {
        host.current_screen().is_some()
    }

    fn configured_identifiers(&self, settings: &Settings) -> Vec<String> {
        settings.advanced.screen.screen_data.keys().cloned().collect()
    }

    fn update_data(&mut self, ctx: &mut TickContext<'_>) {
        let Some(screen) = ctx.host.current_screen() else {
            return;
        };
        let (name, id) = derive_names(&screen, !ctx.settings.advanced.format_words);

        if self.current_id.as_deref() != Some(id.as_str())
            || self.current_name.as_deref() != Some(name.as_str())
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
        let screen = &ctx.settings.advanced.screen;
        let resolved = overrides::resolve_or_log(&screen.screen_data, id, "screen");
        let icon = util::format_as_icon(&resolved.icon);
        let fallback = resolved
            .fallback_icon
            .as_deref()
            .unwrap_or(&screen.fallback_screen_icon);

        let client = &mut *ctx.client;
        client.sync_argument(
            "screen.default.icon",
            screen.fallback_screen_icon.as_str(),
            ArgumentKind::Icon,
        );
        client.sync_argument("screen.name", name.as_str(), ArgumentKind::Text);
        client.sync_override("screen.message", &resolved.record);
        client.sync_argument("screen.message", resolved.text, ArgumentKind::Text);
        let image = client.image_of(
            "screen.icon",
            true,
            &icon,
            fallback,
            &ctx.settings.general.default_icon,
        );
        client.sync_argument("screen.icon", image, ArgumentKind::Icon);
    }

    fn clear_client_data(&mut self, client: &mut PresenceClient) {
        self.current_name = None;
        self.current_id = None;
        self.state.in_use = false;
        client.remove_arguments(&["screen"]);
        client.clear_override("screen.message");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::fakes::ScriptedHost;
    use super::super::test_support::{client_with_catalog, tick};
    use super::*;
    use crate::host::NamedObject;

    #[tokio::test(flavor = "multi_thread")]
    async fn live_without_session_while_screen_open() {
        let scripted = Arc::new(ScriptedHost::default());
        *scripted.screen.lock().unwrap() = Some(NamedObject::new("", "GuiOptions"));
        let host: Arc<dyn GameState> = scripted.clone();
        let (mut client, _) = client_with_catalog(&[]);
        let mut settings = Settings::default();
        settings.advanced.enable_per_screen = true;
        let mut module = ScreenModule::default();

        tick(&mut module, &host, &mut client, &settings);
        assert!(module.state().in_use);
        assert_eq!(
            client.arguments().get("screen.name", ArgumentKind::Text),
            Some("guioptions")
        );

        *scripted.screen.lock().unwrap() = None;
        tick(&mut module, &host, &mut client, &settings);
        assert!(!module.state().in_use);
        assert!(client.arguments().get("screen.name", ArgumentKind::Text).is_none());
    }
}
