use anyhow::{Context, Result};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tauri::{AppHandle, Manager, Runtime, WebviewUrl, WebviewWindowBuilder};

use crate::client::{Access, SpotifyClient, StreamingClient};
use crate::config::Settings;
use crate::poller::PollLoop;
use crate::server::AppState;
use crate::tray::{TrayManager, TraySink};
use crate::ServeArgs;

/// Run the display server on a background thread and show it in a window.
pub fn run(settings: &Settings, args: ServeArgs) -> Result<()> {
    log::info!("Starting desktop application");

    let runtime = crate::build_runtime()?;
    let client = SpotifyClient::new(settings, Access::Control);
    runtime.block_on(client.authenticate())?;
    let client: Arc<dyn StreamingClient> = Arc::new(client);

    tauri::Builder::default()
        .setup(move |app| {
            let handle = app.handle().clone();

            let poller = PollLoop::new(client.clone(), args.interval())
                .with_sink(TraySink::new(handle.clone()));
            let (poller, state) = crate::wire_display(client, poller);

            TrayManager::setup(&handle, state.relay.clone())?;
            spawn_server_thread(runtime, handle, poller, state, args.addr)?;
            wait_for_server(args.addr, Duration::from_secs(2));

            let url = args.url().parse().context("Invalid display server URL")?;
            WebviewWindowBuilder::new(app, "main", WebviewUrl::External(url))
                .title("Spotify Display")
                .inner_size(1200.0, 900.0)
                .resizable(true)
                .build()?;

            log::info!("Desktop window opened");
            Ok(())
        })
        .build(tauri::generate_context!())
        .context("error while building tauri application")?
        .run(run_handler);

    Ok(())
}

/// The server thread owns its runtime; it ends with the process.
fn spawn_server_thread<R: Runtime>(
    runtime: tokio::runtime::Runtime,
    app: AppHandle<R>,
    poller: PollLoop,
    state: AppState,
    addr: SocketAddr,
) -> Result<()> {
    std::thread::Builder::new()
        .name("display-server".into())
        .spawn(move || {
            let served = runtime.block_on(crate::serve_display(
                poller,
                state,
                addr,
                std::future::pending(),
            ));
            if let Err(e) = served {
                log::error!("{:#}", e);
                app.exit(1);
            }
        })
        .context("Failed to spawn display server thread")?;
    Ok(())
}

fn wait_for_server(addr: SocketAddr, limit: Duration) {
    let started = Instant::now();
    while started.elapsed() < limit {
        if TcpStream::connect_timeout(&addr, Duration::from_millis(100)).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    log::warn!("Display server not reachable at {} yet, opening window anyway", addr);
}

fn run_handler<R: Runtime>(app_handle: &AppHandle<R>, event: tauri::RunEvent) {
    if let tauri::RunEvent::Exit = event {
        log::info!("App exit event received");
        if let Some(window) = app_handle.get_webview_window("main") {
            let _ = window.close();
        }
    }
}
