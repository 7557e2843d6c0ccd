//! ICCCM/EWMH hints for the viewer's top-level surface

use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;

use crate::error::WmResult;

/// Holds all interned atoms
#[derive(Debug, Clone, Copy)]
pub struct Atoms {
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub net_wm_name: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_fullscreen: Atom,
    pub utf8_string: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> WmResult<Self> {
        let intern = |name: &str| -> WmResult<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_state: intern("_NET_WM_STATE")?,
            net_wm_state_fullscreen: intern("_NET_WM_STATE_FULLSCREEN")?,
            utf8_string: intern("UTF8_STRING")?,
        })
    }

    /// Name, class and close protocol for `window`
    pub fn setup_window<C: Connection>(
        &self,
        conn: &C,
        window: Window,
        title: &str,
    ) -> WmResult<()> {
        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            title.as_bytes(),
        )?;
        conn.change_property8(
            PropMode::REPLACE,
            window,
            self.net_wm_name,
            self.utf8_string,
            title.as_bytes(),
        )?;

        // WM_CLASS is instance\0class\0
        let class = format!("{title}\0{title}\0");
        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            class.as_bytes(),
        )?;

        conn.change_property32(
            PropMode::REPLACE,
            window,
            self.wm_protocols,
            AtomEnum::ATOM,
            &[self.wm_delete_window],
        )?;
        Ok(())
    }

    /// Initial fullscreen request, honored by the WM when the window maps
    pub fn request_fullscreen<C: Connection>(&self, conn: &C, window: Window) -> WmResult<()> {
        conn.change_property32(
            PropMode::REPLACE,
            window,
            self.net_wm_state,
            AtomEnum::ATOM,
            &[self.net_wm_state_fullscreen],
        )?;
        Ok(())
    }

    /// Whether a ClientMessage is the WM asking us to close
    pub fn is_delete_window(&self, event: &ClientMessageEvent) -> bool {
        event.type_ == self.wm_protocols
            && event.format == 32
            && event.data.as_data32()[0] == self.wm_delete_window
    }
}
