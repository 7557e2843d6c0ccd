//! Display-server capability
//!
//! The window manager talks to the X server only through [`Display`], which
//! keeps the request set small and lets tests record what would have been
//! sent.

use std::sync::Arc;
use tracing::{debug, info};
use x11rb::COPY_DEPTH_FROM_PARENT;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::error::WmResult;
use crate::layout::{Rect, Size};
use crate::wm::ewmh::Atoms;

/// Glyph of the standard arrow in the X cursor font
pub const LEFT_PTR: u16 = 68;

/// Window title and class of the viewer
pub const TITLE: &str = "x-ipc-viewer";

/// Requests the window manager issues on its display connection
pub trait Display: Send + Sync {
    /// Size of the screen the viewer opens on
    fn screen_size(&self) -> Size;

    /// Top-level surface covering `size`, receiving structure, expose and input events
    fn create_root(&self, size: Size, background: u32, fullscreen: bool) -> WmResult<u32>;

    /// Child surface of `parent`, receiving expose and button events
    fn create_surface(&self, parent: u32, background: u32) -> WmResult<u32>;

    fn configure(&self, surface: u32, rect: Rect) -> WmResult<()>;
    fn map(&self, surface: u32) -> WmResult<()>;
    fn unmap(&self, surface: u32) -> WmResult<()>;
    fn raise(&self, surface: u32) -> WmResult<()>;
    fn destroy(&self, surface: u32) -> WmResult<()>;

    /// Cursor from the server's cursor font
    fn create_cursor(&self, glyph: u16) -> WmResult<u32>;
    fn set_cursor(&self, surface: u32, cursor: u32) -> WmResult<()>;
    fn free_cursor(&self, cursor: u32) -> WmResult<()>;

    fn flush(&self) -> WmResult<()>;
}

/// [`Display`] over an x11rb connection
pub struct X11Display {
    conn: Arc<RustConnection>,
    screen_num: usize,
    atoms: Atoms,
}

impl X11Display {
    /// Connect to the X server named by `$DISPLAY`
    pub fn connect() -> WmResult<Self> {
        let (conn, screen_num) = RustConnection::connect(None)?;
        info!("Connected to X server, screen {}", screen_num);

        let atoms = Atoms::new(&conn)?;
        Ok(Self {
            conn: Arc::new(conn),
            screen_num,
            atoms,
        })
    }

    pub fn connection(&self) -> Arc<RustConnection> {
        self.conn.clone()
    }

    pub fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }
}

impl Display for X11Display {
    fn screen_size(&self) -> Size {
        let screen = self.screen();
        Size::new(screen.width_in_pixels as u32, screen.height_in_pixels as u32)
    }

    fn create_root(&self, size: Size, background: u32, fullscreen: bool) -> WmResult<u32> {
        let id = self.conn.generate_id()?;
        let mask = EventMask::STRUCTURE_NOTIFY
            | EventMask::EXPOSURE
            | EventMask::KEY_PRESS
            | EventMask::BUTTON_PRESS;

        self.conn
            .create_window(
                COPY_DEPTH_FROM_PARENT,
                id,
                self.screen().root,
                0,
                0,
                clamp_dim(size.width),
                clamp_dim(size.height),
                0,
                WindowClass::INPUT_OUTPUT,
                x11rb::COPY_FROM_PARENT,
                &CreateWindowAux::new()
                    .background_pixel(background)
                    .event_mask(mask),
            )?
            .check()?;

        self.atoms.setup_window(self.conn.as_ref(), id, TITLE)?;
        if fullscreen {
            self.atoms.request_fullscreen(self.conn.as_ref(), id)?;
        }
        self.conn.map_window(id)?;

        debug!("Created root surface {} ({}x{})", id, size.width, size.height);
        Ok(id)
    }

    fn create_surface(&self, parent: u32, background: u32) -> WmResult<u32> {
        let id = self.conn.generate_id()?;
        self.conn
            .create_window(
                COPY_DEPTH_FROM_PARENT,
                id,
                parent,
                0,
                0,
                1,
                1,
                0,
                WindowClass::INPUT_OUTPUT,
                x11rb::COPY_FROM_PARENT,
                &CreateWindowAux::new()
                    .background_pixel(background)
                    .event_mask(EventMask::EXPOSURE | EventMask::BUTTON_PRESS),
            )?
            .check()?;

        // The player connects from another process; the id must exist server-side first
        self.conn.flush()?;
        debug!("Created surface {} in {}", id, parent);
        Ok(id)
    }

    fn configure(&self, surface: u32, rect: Rect) -> WmResult<()> {
        self.conn.configure_window(
            surface,
            &ConfigureWindowAux::new()
                .x(rect.x)
                .y(rect.y)
                .width(clamp_dim(rect.width) as u32)
                .height(clamp_dim(rect.height) as u32),
        )?;
        Ok(())
    }

    fn map(&self, surface: u32) -> WmResult<()> {
        self.conn.map_window(surface)?;
        Ok(())
    }

    fn unmap(&self, surface: u32) -> WmResult<()> {
        self.conn.unmap_window(surface)?;
        Ok(())
    }

    fn raise(&self, surface: u32) -> WmResult<()> {
        self.conn.configure_window(
            surface,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        Ok(())
    }

    fn destroy(&self, surface: u32) -> WmResult<()> {
        self.conn.destroy_window(surface)?;
        Ok(())
    }

    fn create_cursor(&self, glyph: u16) -> WmResult<u32> {
        let font = self.conn.generate_id()?;
        self.conn.open_font(font, b"cursor")?.check()?;

        let cursor = self.conn.generate_id()?;
        self.conn.create_glyph_cursor(
            cursor,
            font,
            font,
            glyph,
            glyph + 1,
            0,
            0,
            0,
            0xffff,
            0xffff,
            0xffff,
        )?;
        self.conn.close_font(font)?;
        Ok(cursor)
    }

    fn set_cursor(&self, surface: u32, cursor: u32) -> WmResult<()> {
        self.conn.change_window_attributes(
            surface,
            &ChangeWindowAttributesAux::new().cursor(cursor),
        )?;
        Ok(())
    }

    fn free_cursor(&self, cursor: u32) -> WmResult<()> {
        self.conn.free_cursor(cursor)?;
        Ok(())
    }

    fn flush(&self) -> WmResult<()> {
        self.conn.flush()?;
        Ok(())
    }
}

/// X11 dimensions are 1..=u16::MAX
fn clamp_dim(value: u32) -> u16 {
    value.clamp(1, u16::MAX as u32) as u16
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_dim() {
        assert_eq!(clamp_dim(0), 1);
        assert_eq!(clamp_dim(1920), 1920);
        assert_eq!(clamp_dim(100_000), u16::MAX);
    }
}
