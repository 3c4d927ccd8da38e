use anyhow::{Context, Result};
use std::sync::Arc;
use tauri::{
    menu::{Menu, MenuItem, PredefinedMenuItem},
    tray::TrayIconBuilder,
    AppHandle, Manager, Runtime,
};

use crate::error::TransportError;
use crate::relay::CommandRelay;
use crate::sink::{DisplaySink, RenderPolicy, NOTHING_PLAYING};
use crate::types::PlaybackState;

const TRAY_ID: &str = "now-playing";

/// Tray icon with playback controls, stored in Tauri's app state.
pub struct TrayManager<R: Runtime> {
    status: MenuItem<R>,
}

impl<R: Runtime> TrayManager<R> {
    /// Build the tray icon and register the manager as app state.
    pub fn setup(app: &AppHandle<R>, relay: Arc<CommandRelay>) -> Result<()> {
        let status = MenuItem::with_id(app, "status", NOTHING_PLAYING, false, None::<&str>)?;
        let menu = Menu::new(app)?;
        menu.append(&status)?;
        menu.append(&PredefinedMenuItem::separator(app)?)?;

        for (id, label) in [
            ("play", "Play"),
            ("pause", "Pause"),
            ("next", "Next"),
            ("previous", "Previous"),
        ] {
            let item = MenuItem::with_id(app, id, label, true, None::<&str>)?;
            menu.append(&item)?;
        }

        menu.append(&PredefinedMenuItem::separator(app)?)?;
        let quit_item = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
        menu.append(&quit_item)?;

        let mut builder = TrayIconBuilder::with_id(TRAY_ID)
            .menu(&menu)
            .tooltip(NOTHING_PLAYING)
            .on_menu_event(move |app, event| {
                Self::handle_menu_event(app, event.id().as_ref(), &relay);
            });
        if let Some(icon) = app.default_window_icon() {
            builder = builder.icon(icon.clone());
        }
        builder.build(app).context("Failed to build tray icon")?;

        app.manage(TrayManager { status });
        Ok(())
    }

    fn handle_menu_event(app: &AppHandle<R>, menu_id: &str, relay: &Arc<CommandRelay>) {
        if menu_id == "quit" {
            app.exit(0);
            return;
        }

        let command = menu_id.to_string();
        let relay = relay.clone();
        tauri::async_runtime::spawn(async move {
            let result = match command.as_str() {
                "play" => relay.play().await,
                "pause" => relay.pause().await,
                "next" => relay.next().await,
                "previous" => relay.previous().await,
                _ => return,
            };
            if let Err(e) = result {
                log::error!("Tray {} failed: {}", command, e);
            }
        });
    }

    /// Update the status line and tooltip. Must run on the main thread.
    fn show(app: &AppHandle<R>, text: &str) -> Result<()> {
        let manager = app
            .try_state::<TrayManager<R>>()
            .context("TrayManager not found in app state")?;
        manager.status.set_text(text)?;

        if let Some(tray) = app.tray_by_id(TRAY_ID) {
            tray.set_tooltip(Some(text))?;
        }
        Ok(())
    }
}

/// Mirrors the current track into the tray.
pub struct TraySink<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TraySink<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> DisplaySink for TraySink<R> {
    fn name(&self) -> &'static str {
        "tray"
    }

    fn policy(&self) -> RenderPolicy {
        RenderPolicy::OnChange
    }

    fn render(&mut self, state: Option<&PlaybackState>) -> Result<(), TransportError> {
        let text = match state {
            Some(state) if state.is_playing => {
                format!("{} - {}", state.track_name, state.primary_artist())
            }
            _ => NOTHING_PLAYING.to_string(),
        };

        let app = self.app.clone();
        let queued = self.app.run_on_main_thread(move || {
            if let Err(e) = TrayManager::show(&app, &text) {
                log::error!("Failed to update tray: {}", e);
            }
        });
        if let Err(e) = queued {
            log::error!("Failed to schedule tray update: {}", e);
        }
        Ok(())
    }
}
