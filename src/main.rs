//! x-ipc-viewer
//!
//! IP camera viewer for X11. Tiles one embedded video player per camera
//! inside a single top-level window and keeps the mosaic in shape as the
//! window is resized or cameras are clicked.

mod config;
mod error;
mod layout;
mod player;
mod wm;
mod x11_async;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, PlayerConfig, WindowConfig};
use error::PlayerError;
use player::{MpvPlayer, Player};
use wm::display::{Display, LEFT_PTR, X11Display};
use wm::{ReleaseHandle, WindowManager};
use x11_async::X11EventStream;

/// IP camera viewer for X11
#[derive(Debug, Parser)]
#[command(name = "x-ipc-viewer", version, about = "IP camera viewer for X11.")]
struct Args {
    /// Config file (default is ~/.config/x-ipc-viewer/config.toml)
    #[arg(long, short, env = "X_IPC_VIEWER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "x_ipc_viewer=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting x-ipc-viewer");

    // Configuration problems are reported before any surface exists
    let config = Config::load(args.config.as_deref())?;
    config.validate().context("Invalid configuration")?;

    let display = Arc::new(X11Display::connect().context("Failed to connect to X server")?);
    let stream = X11EventStream::new(display.connection())?;

    let mut manager = WindowManager::create(
        display.clone(),
        LEFT_PTR,
        config.layout.to_layout(),
        config.background,
        config.fullscreen,
    )
    .context("Failed to create root surface")?;

    spawn_interrupt_watcher(manager.release_handle())?;

    let result = serve(&display, &stream, &mut manager, &config).await;
    manager.release();

    // Errors are reported by main's return; a close still exits non-zero
    result?;
    info!("Viewer closed");
    std::process::exit(1);
}

/// Create the camera windows and run the event loop
///
/// Returns `Ok(())` when the window manager closes the viewer.
async fn serve(
    display: &Arc<X11Display>,
    stream: &X11EventStream,
    manager: &mut WindowManager<X11Display>,
    config: &Config,
) -> Result<()> {
    let factory = Arc::new(
        |surface: u32, window: &WindowConfig, player: &PlayerConfig| -> Result<Box<dyn Player>, PlayerError> {
            Ok(Box::new(MpvPlayer::spawn(surface, window, player)?))
        },
    );

    let windows = wm::startup::create_windows(display.clone(), manager.release_handle(), config, factory)
        .await
        .context("Failed to start camera windows")?;
    manager.add_windows(windows).context("Failed to lay out camera windows")?;

    wm::events::run(stream, display.atoms(), manager)
        .await
        .context("Event loop failed")?;
    Ok(())
}

/// Release and exit on SIGINT/SIGTERM
fn spawn_interrupt_watcher<D: Display + 'static>(handle: Arc<ReleaseHandle<D>>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
            }
        }
        handle.release();
        std::process::exit(1);
    });

    Ok(())
}
