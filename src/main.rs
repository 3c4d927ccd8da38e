// Prevents additional console window on Windows in release
#![cfg_attr(
    all(not(debug_assertions), feature = "desktop"),
    windows_subsystem = "windows"
)]

mod client;
mod config;
#[cfg(feature = "desktop")]
mod desktop;
mod error;
mod launcher;
mod poller;
mod relay;
mod server;
mod sink;
mod state;
#[cfg(feature = "desktop")]
mod tray;
mod types;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use std::sync::Arc;
use std::time::Duration;

use client::{Access, SpotifyClient, StreamingClient};
use config::Settings;
use error::ConfigError;
use launcher::ServerProcess;
use poller::PollLoop;
use relay::CommandRelay;
use server::AppState;
use sink::{SerialLcdSink, WebSink};
use state::SnapshotCell;

#[cfg(windows)]
const DEFAULT_SERIAL_PORT: &str = "COM3";
#[cfg(not(windows))]
const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// Mirror Spotify's currently playing track to a character LCD or a browser window.
#[derive(Parser, Debug)]
#[command(name = "spotify-display", version)]
struct Cli {
    /// Env file holding SPOTIPY_* credentials (defaults to ./.env when present)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Where the OAuth token is cached between runs
    #[arg(long, global = true, default_value = ".spotify_token_cache.json")]
    token_cache: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send the current track to a serial-attached 16x2 LCD
    Lcd(LcdArgs),
    /// Serve the now-playing page and playback controls over HTTP
    Serve(ServeArgs),
    /// Start the server in the background and open it in the browser
    Launch(LaunchArgs),
    /// Show the now-playing page in a desktop window with tray controls
    #[cfg(feature = "desktop")]
    Desktop(ServeArgs),
}

#[derive(Args, Debug)]
struct LcdArgs {
    /// Serial device the LCD controller is attached to
    #[arg(long, default_value = DEFAULT_SERIAL_PORT)]
    port: String,

    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Poll interval in milliseconds
    #[arg(long, default_value_t = 2000)]
    interval_ms: u64,

    /// Wait after opening the port while the board resets
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address the display server binds to
    #[arg(long, default_value = server::DEFAULT_ADDR)]
    pub addr: SocketAddr,

    /// Poll interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,
}

impl ServeArgs {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Args, Debug)]
struct LaunchArgs {
    #[command(flatten)]
    serve: ServeArgs,

    /// How long the server gets to come up before it is considered started
    #[arg(long, default_value_t = 3000)]
    startup_wait_ms: u64,

    /// Don't open a browser window
    #[arg(long)]
    no_browser: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ConfigError>() {
                Some(config_err) => eprintln!("\nERROR: {}", config_err),
                None => log::error!("{:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.env_file.as_deref(), cli.token_cache.clone())?;

    log::info!("Loaded Spotify credentials");
    log::info!("Client ID: {}", settings.redacted_client_id());
    log::info!("Redirect URI: {}", settings.redirect_uri);

    match cli.command {
        Commands::Lcd(args) => run_lcd(&settings, args),
        Commands::Serve(args) => run_serve(&settings, args),
        Commands::Launch(args) => {
            run_launch(&settings, cli.env_file.as_deref(), &cli.token_cache, args)
        }
        #[cfg(feature = "desktop")]
        Commands::Desktop(args) => desktop::run(&settings, args),
    }
}

pub fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn run_lcd(settings: &Settings, args: LcdArgs) -> Result<()> {
    log::info!("Starting LCD display on {}", args.port);

    build_runtime()?.block_on(async {
        let client = SpotifyClient::new(settings, Access::ReadOnly);
        client.authenticate().await?;

        let sink = SerialLcdSink::open(
            &args.port,
            args.baud,
            Duration::from_millis(args.settle_ms),
        )
        .await?;

        PollLoop::new(Arc::new(client), Duration::from_millis(args.interval_ms))
            .with_sink(sink)
            .run_until(shutdown_signal())
            .await;

        // The serial port closes when the sink is dropped with the loop
        log::info!("Exiting...");
        Ok::<(), anyhow::Error>(())
    })
}

fn run_serve(settings: &Settings, args: ServeArgs) -> Result<()> {
    build_runtime()?.block_on(async {
        let client = SpotifyClient::new(settings, Access::Control);
        client.authenticate().await?;
        let client: Arc<dyn StreamingClient> = Arc::new(client);

        let (poller, state) =
            wire_display(client.clone(), PollLoop::new(client, args.interval()));
        serve_display(poller, state, args.addr, shutdown_signal()).await
    })
}

/// Attach the web sink to `poller` and build the HTTP state sharing it.
pub fn wire_display(client: Arc<dyn StreamingClient>, poller: PollLoop) -> (PollLoop, AppState) {
    let snapshot = SnapshotCell::new();
    let poller = poller.with_sink(WebSink::new(snapshot.clone()));
    let relay = CommandRelay::new(client).with_poll_wake(poller.waker());

    let state = AppState {
        snapshot,
        relay: Arc::new(relay),
    };
    (poller, state)
}

/// Run the display server and the poll loop feeding it until `shutdown`.
pub async fn serve_display<F>(
    poller: PollLoop,
    state: AppState,
    addr: SocketAddr,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::select! {
        served = server::serve(addr, state, shutdown) => {
            served.with_context(|| format!("Display server on {} failed", addr))?;
        }
        _ = poller.run_until(std::future::pending()) => {}
    }

    log::info!("Display server stopped");
    Ok(())
}

fn run_launch(
    settings: &Settings,
    env_file: Option<&Path>,
    token_cache: &Path,
    args: LaunchArgs,
) -> Result<()> {
    log::info!("Starting Spotify Display...");

    // Authorize here so the background server finds a cached token
    build_runtime()?.block_on(SpotifyClient::new(settings, Access::Control).authenticate())?;

    let exe = std::env::current_exe().context("Failed to locate the current executable")?;
    let mut command = Command::new(exe);
    if let Some(env_file) = env_file {
        command.arg("--env-file").arg(env_file);
    }
    command
        .arg("--token-cache")
        .arg(token_cache)
        .arg("serve")
        .arg("--addr")
        .arg(args.serve.addr.to_string())
        .arg("--interval-ms")
        .arg(args.serve.interval_ms.to_string());

    let server = ServerProcess::spawn(command)?;

    log::info!("Waiting for server to start...");
    server.wait_for_startup(Duration::from_millis(args.startup_wait_ms))?;
    log::info!("Server started successfully");

    launcher::show_display(&args.serve.url(), args.no_browser, |url| {
        open::that_detached(url)
    });

    let server_for_signal = server.clone();
    ctrlc::set_handler(move || {
        log::info!("Received interrupt signal (Ctrl+C), shutting down...");
        if !server_for_signal.is_running() {
            std::process::exit(0);
        }
        match server_for_signal.stop() {
            Ok(()) => log::info!("Stopped successfully"),
            Err(e) => log::error!("Error stopping display server on interrupt: {}", e),
        }
        std::process::exit(0);
    })
    .context("Failed to set Ctrl+C handler")?;

    log::info!("Spotify Display is running. Press Ctrl+C to stop.");

    match server.wait() {
        Some(status) if !status.success() => {
            anyhow::bail!("Display server exited with {}", status)
        }
        _ => Ok(()),
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    log::info!("Received shutdown signal");
}
