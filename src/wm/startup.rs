//! Parallel window startup
//!
//! Every camera gets its surface and player on its own blocking task so
//! slow player startups overlap. Results land in a slot per camera, in
//! declaration order.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::config::{Config, PlayerConfig, WindowConfig};
use crate::error::{PlayerError, WmError, WmResult};
use crate::player::Player;
use crate::wm::cache::PlayerCache;
use crate::wm::ReleaseHandle;
use crate::wm::display::Display;
use crate::wm::window::Window;

/// Creates the player for a freshly created surface
pub trait PlayerFactory: Send + Sync + 'static {
    fn create(
        &self,
        surface: u32,
        window: &WindowConfig,
        player: &PlayerConfig,
    ) -> Result<Box<dyn Player>, PlayerError>;
}

impl<F> PlayerFactory for F
where
    F: Fn(u32, &WindowConfig, &PlayerConfig) -> Result<Box<dyn Player>, PlayerError>
        + Send
        + Sync
        + 'static,
{
    fn create(
        &self,
        surface: u32,
        window: &WindowConfig,
        player: &PlayerConfig,
    ) -> Result<Box<dyn Player>, PlayerError> {
        self(surface, window, player)
    }
}

/// Create one window per configured camera under the root surface
///
/// Each window joins `handle` as soon as it exists, so an interrupt during
/// startup still tears down every player spawned so far. Fails on the first
/// surface or player error, or when `handle` was released meanwhile.
pub async fn create_windows<D, F>(
    display: Arc<D>,
    handle: Arc<ReleaseHandle<D>>,
    config: &Config,
    factory: Arc<F>,
) -> WmResult<Vec<Window>>
where
    D: Display + 'static,
    F: PlayerFactory,
{
    let count = config.windows.len();
    let mut tasks = JoinSet::new();

    for (index, window) in config.windows.iter().cloned().enumerate() {
        let display = display.clone();
        let handle = handle.clone();
        let factory = factory.clone();
        let player_config = config.player.clone();
        let background = config.background;

        tasks.spawn_blocking(move || -> WmResult<(usize, Window)> {
            if handle.is_released() {
                return Err(interrupted(index));
            }
            let surface = display.create_surface(handle.root(), background)?;
            debug!("Camera {} got surface {}", index, surface);

            let player = match factory.create(surface, &window, &player_config) {
                Ok(player) => player,
                Err(e) => {
                    let _ = display.destroy(surface);
                    return Err(e.into());
                }
            };
            let window = Window::new(
                surface,
                PlayerCache::new(player),
                window.main_rect,
                window.sub_rect,
                background,
            );

            if !handle.adopt(surface, &window.player) {
                window.player.release();
                let _ = display.destroy(surface);
                return Err(interrupted(index));
            }
            Ok((index, window))
        });
    }

    let mut slots: Vec<Option<Window>> = (0..count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, window) = joined
            .map_err(|e| WmError::ResourceCreation(format!("window startup task failed: {}", e)))??;
        slots[index] = Some(window);
    }

    info!("Created {} camera windows", count);
    slots
        .into_iter()
        .enumerate()
        .map(|(i, w)| w.ok_or_else(|| WmError::ResourceCreation(format!("window {} missing", i))))
        .collect()
}

fn interrupted(index: usize) -> WmError {
    WmError::ResourceCreation(format!("viewer released before camera {} started", index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Layout, Size};
    use crate::player::testing::{Calls, CountingPlayer};
    use crate::wm::WindowManager;
    use crate::wm::display::LEFT_PTR;
    use crate::wm::display::testing::{FakeDisplay, Request};
    use std::sync::Mutex;

    fn config(count: usize) -> Config {
        let mut doc = String::new();
        for i in 0..count {
            doc.push_str(&format!("[[windows]]\nmain = \"rtsp://cam{}/main\"\n", i));
        }
        Config::parse(&doc).unwrap()
    }

    fn manager(display: &Arc<FakeDisplay>) -> WindowManager<FakeDisplay> {
        WindowManager::create(display.clone(), LEFT_PTR, Layout::Grid, 0, true).unwrap()
    }

    /// Factory handing out counting players, keeping their counters
    fn counting_factory() -> (
        Arc<impl PlayerFactory>,
        Arc<Mutex<Vec<Arc<Calls>>>>,
    ) {
        let spawned = Arc::new(Mutex::new(Vec::new()));
        let sink = spawned.clone();
        let factory = Arc::new(
            move |_: u32, _: &WindowConfig, _: &PlayerConfig| -> Result<Box<dyn Player>, PlayerError> {
                let (player, calls) = CountingPlayer::new();
                sink.lock().unwrap().push(calls);
                Ok(Box::new(player))
            },
        );
        (factory, spawned)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_windows_keep_declaration_order() {
        let display = Arc::new(FakeDisplay::new(Size::new(1920, 1080)));
        let urls = Arc::new(Mutex::new(Vec::new()));
        let seen = urls.clone();

        let factory = Arc::new(
            move |surface: u32, window: &WindowConfig, _: &PlayerConfig| -> Result<Box<dyn Player>, PlayerError> {
                seen.lock().unwrap().push((surface, window.main.clone()));
                let (player, _) = CountingPlayer::new();
                Ok(Box::new(player))
            },
        );

        let wm = manager(&display);
        let root = wm.root();
        let windows = create_windows(display.clone(), wm.release_handle(), &config(6), factory)
            .await
            .unwrap();
        assert_eq!(windows.len(), 6);

        // Each window's surface was bound to its own camera
        let urls = urls.lock().unwrap();
        for (i, window) in windows.iter().enumerate() {
            let (_, url) = urls.iter().find(|(s, _)| *s == window.id).unwrap();
            assert_eq!(url, &format!("rtsp://cam{}/main", i));
        }
        assert_eq!(
            display.count(|r| matches!(r, Request::CreateSurface { parent, .. } if *parent == root)),
            6
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_player_failure_is_fatal() {
        let display = Arc::new(FakeDisplay::new(Size::new(1920, 1080)));
        let factory = Arc::new(
            |_: u32, window: &WindowConfig, _: &PlayerConfig| -> Result<Box<dyn Player>, PlayerError> {
                if window.main.contains("cam2") {
                    return Err(PlayerError::Timeout(10));
                }
                let (player, _) = CountingPlayer::new();
                Ok(Box::new(player))
            },
        );

        let wm = manager(&display);
        let result = create_windows(display.clone(), wm.release_handle(), &config(3), factory).await;
        assert!(matches!(result, Err(WmError::ResourceCreation(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_release_during_startup_reaches_players() {
        let display = Arc::new(FakeDisplay::new(Size::new(1920, 1080)));
        let wm = manager(&display);
        let handle = wm.release_handle();
        let (factory, spawned) = counting_factory();

        let windows = create_windows(display.clone(), handle.clone(), &config(3), factory)
            .await
            .unwrap();

        // Interrupt before the windows were handed to the manager
        handle.release();

        let spawned = spawned.lock().unwrap();
        assert_eq!(spawned.len(), 3);
        assert!(spawned.iter().all(|c| c.releases() == 1));
        for window in &windows {
            assert_eq!(display.count(|r| *r == Request::Destroy(window.id)), 1);
        }

        drop(windows);
        drop(wm);
        assert!(spawned.iter().all(|c| c.releases() == 1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_startup_after_release_spawns_nothing() {
        let display = Arc::new(FakeDisplay::new(Size::new(1920, 1080)));
        let wm = manager(&display);
        wm.release();
        let (factory, spawned) = counting_factory();

        let result = create_windows(display.clone(), wm.release_handle(), &config(2), factory).await;
        assert!(matches!(result, Err(WmError::ResourceCreation(_))));
        assert!(spawned.lock().unwrap().is_empty());
        assert_eq!(display.count(|r| matches!(r, Request::CreateSurface { .. })), 0);
    }

    #[test]
    fn test_adopt_refused_after_release() {
        let display = Arc::new(FakeDisplay::new(Size::new(640, 480)));
        let wm = manager(&display);
        let handle = wm.release_handle();
        handle.release();

        let (player, calls) = CountingPlayer::new();
        let cache = Arc::new(PlayerCache::new(Box::new(player)));
        assert!(!handle.adopt(42, &cache));
        assert_eq!(calls.releases(), 0);
    }
}
