//! Window Manager Module
//!
//! Owns the viewer's top-level surface, the cursor and every camera surface,
//! and keeps the mosaic geometry in sync with the root size.

pub mod cache;
pub mod display;
pub mod events;
pub mod ewmh;
pub mod startup;
pub mod window;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{WmError, WmResult};
use crate::layout::{Layout, Rect, Size};
use crate::player::Stream;
use crate::wm::cache::PlayerCache;
use crate::wm::display::Display;
use crate::wm::window::Window;

/// Everything `release` has to tear down
///
/// Shared with the interrupt watcher, which may release while the event
/// loop still runs. Only the first caller does the work.
pub struct ReleaseHandle<D: Display> {
    display: Arc<D>,
    root: u32,
    cursor: u32,
    /// Surfaces in acquisition order with their players
    children: Mutex<Vec<(u32, Arc<PlayerCache>)>>,
    released: AtomicBool,
}

impl<D: Display> ReleaseHandle<D> {
    pub fn root(&self) -> u32 {
        self.root
    }

    /// Track a camera surface and its player for teardown
    ///
    /// Returns false once released; the caller then tears both down itself.
    pub fn adopt(&self, surface: u32, player: &Arc<PlayerCache>) -> bool {
        let mut children = self.children.lock().unwrap_or_else(|p| p.into_inner());
        // Checked under the lock so `release` either sees the child or we see the flag
        if self.is_released() {
            return false;
        }
        if !children.iter().any(|(id, _)| *id == surface) {
            children.push((surface, player.clone()));
        }
        true
    }

    /// Release players, destroy surfaces and free the cursor, newest first
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Releasing viewer resources");

        let children = std::mem::take(
            &mut *self.children.lock().unwrap_or_else(|p| p.into_inner()),
        );
        for (surface, player) in children.iter().rev() {
            player.release();
            if let Err(e) = self.display.unmap(*surface) {
                debug!("Failed to unmap surface {}: {}", surface, e);
            }
            if let Err(e) = self.display.destroy(*surface) {
                debug!("Failed to destroy surface {}: {}", surface, e);
            }
        }

        if let Err(e) = self.display.free_cursor(self.cursor) {
            debug!("Failed to free cursor: {}", e);
        }
        if let Err(e) = self.display.destroy(self.root) {
            debug!("Failed to destroy root surface: {}", e);
        }
        if let Err(e) = self.display.flush() {
            warn!("Failed to flush during release: {}", e);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Single authority over surface geometry on the connection
pub struct WindowManager<D: Display> {
    display: Arc<D>,
    layout: Layout,
    /// Current root surface size
    size: Size,
    windows: Vec<Window>,
    /// Window index per layout slot; slot 0 is the primary position
    slots: Vec<usize>,
    /// Window index filling the whole root surface, if any
    fullscreen: Option<usize>,
    handle: Arc<ReleaseHandle<D>>,
}

impl<D: Display> WindowManager<D> {
    /// Create the root surface and install the cursor
    pub fn create(
        display: Arc<D>,
        cursor_glyph: u16,
        layout: Layout,
        background: u32,
        fullscreen: bool,
    ) -> WmResult<Self> {
        let size = display.screen_size();
        let root = display.create_root(size, background, fullscreen)?;

        let cursor = match display
            .create_cursor(cursor_glyph)
            .and_then(|cursor| display.set_cursor(root, cursor).map(|_| cursor))
        {
            Ok(cursor) => cursor,
            Err(e) => {
                let _ = display.destroy(root);
                let _ = display.flush();
                return Err(e);
            }
        };
        display.flush()?;

        info!("Root surface {} created ({}x{})", root, size.width, size.height);

        let handle = Arc::new(ReleaseHandle {
            display: display.clone(),
            root,
            cursor,
            children: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        });

        Ok(Self {
            display,
            layout,
            size,
            windows: Vec::new(),
            slots: Vec::new(),
            fullscreen: None,
            handle,
        })
    }

    pub fn root(&self) -> u32 {
        self.handle.root
    }

    #[cfg(test)]
    pub fn cursor(&self) -> u32 {
        self.handle.cursor
    }

    #[cfg(test)]
    pub fn size(&self) -> Size {
        self.size
    }

    #[cfg(test)]
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    /// Handle for releasing from another task
    pub fn release_handle(&self) -> Arc<ReleaseHandle<D>> {
        self.handle.clone()
    }

    /// Take ownership of the camera windows, place and show them
    ///
    /// Called once, after every window exists. The layout is validated
    /// before any surface is touched.
    pub fn add_windows(&mut self, windows: Vec<Window>) -> WmResult<()> {
        if !self.windows.is_empty() {
            return Err(WmError::Protocol("windows were already added".into()));
        }
        self.layout.validate(windows.len())?;

        for window in &windows {
            if !self.handle.adopt(window.id, &window.player) {
                window.player.release();
            }
        }
        self.slots = (0..windows.len()).collect();
        self.windows = windows;

        info!("Managing {} camera windows", self.windows.len());
        self.apply_layout()?;
        self.display.flush()
    }

    /// Recompute the layout for a new root size
    ///
    /// Returns false when the size did not change.
    pub fn resize(&mut self, size: Size) -> WmResult<bool> {
        if size == self.size {
            return Ok(false);
        }
        debug!(
            "Root resized {}x{} -> {}x{}",
            self.size.width, self.size.height, size.width, size.height
        );
        self.size = size;
        self.apply_layout()?;
        Ok(true)
    }

    /// Move the window on `surface` into the primary slot
    ///
    /// The previous primary window takes the promoted window's old slot.
    /// Returns false if nothing moved.
    pub fn promote(&mut self, surface: u32) -> WmResult<bool> {
        if self.fullscreen.is_some() {
            return Ok(false);
        }
        let Some(index) = self.index_of(surface) else {
            return Ok(false);
        };
        let Some(slot) = self.slots.iter().position(|&i| i == index) else {
            return Ok(false);
        };
        if slot == 0 {
            return Ok(false);
        }

        self.slots.swap(0, slot);
        self.apply_layout()?;
        debug!(
            "Promoted surface {} from slot {} to {:?}",
            surface,
            slot,
            self.rect_of(surface)
        );
        Ok(true)
    }

    /// Show the window on `surface` over the whole root, or go back to the mosaic
    pub fn toggle_fullscreen(&mut self, surface: u32) -> WmResult<bool> {
        self.fullscreen = match self.fullscreen {
            Some(_) => None,
            None => match self.index_of(surface) {
                Some(index) => Some(index),
                None => return Ok(false),
            },
        };
        debug!("Fullscreen window: {:?}", self.fullscreen);
        self.apply_layout()?;
        Ok(true)
    }

    /// Repaint after an expose
    pub fn redraw(&self, surface: u32) -> WmResult<()> {
        if let Some(index) = self.index_of(surface) {
            self.windows[index].redraw()?;
        }
        Ok(())
    }

    /// Tear everything down; safe to call more than once
    pub fn release(&self) {
        self.handle.release();
    }

    /// Rect currently assigned to `surface`
    pub fn rect_of(&self, surface: u32) -> Option<Rect> {
        let index = self.index_of(surface)?;
        if let Some(full) = self.fullscreen {
            return (full == index).then(|| Rect::from_size(self.size));
        }
        let slot = self.slots.iter().position(|&i| i == index)?;
        self.layout
            .compute(self.windows.len(), self.size)
            .get(slot)
            .copied()
    }

    fn index_of(&self, surface: u32) -> Option<usize> {
        self.windows.iter().position(|w| w.id == surface)
    }

    fn apply_layout(&self) -> WmResult<()> {
        if self.handle.is_released() {
            return Ok(());
        }

        if let Some(index) = self.fullscreen {
            let window = &self.windows[index];
            let rect = Rect::from_size(self.size);
            self.display.configure(window.id, rect)?;
            self.display.map(window.id)?;
            self.display.raise(window.id)?;
            window.attach(rect.size(), Stream::Main)?;

            for other in self.windows.iter().filter(|w| w.id != window.id) {
                self.display.unmap(other.id)?;
            }
            return Ok(());
        }

        let rects = self.layout.compute(self.windows.len(), self.size);
        for (slot, (&index, rect)) in self.slots.iter().zip(&rects).enumerate() {
            let window = &self.windows[index];
            self.display.configure(window.id, *rect)?;
            self.display.map(window.id)?;

            let stream = if slot == 0 { Stream::Main } else { Stream::Sub };
            window.attach(rect.size(), stream)?;
        }
        Ok(())
    }
}

impl<D: Display> Drop for WindowManager<D> {
    fn drop(&mut self) {
        self.release();
    }
}
