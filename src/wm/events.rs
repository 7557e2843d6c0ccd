//! Event loop
//!
//! Decodes X11 events into [`Notification`]s and dispatches them to the
//! window manager. After startup this loop is the only thing that mutates
//! the manager.

use tracing::{debug, info, trace};
use x11rb::protocol::Event;

use crate::error::{WmError, WmResult};
use crate::layout::Size;
use crate::wm::WindowManager;
use crate::wm::display::Display;
use crate::wm::ewmh::Atoms;
use crate::x11_async::X11EventStream;

/// Left button promotes a camera to the primary slot
const BUTTON_PROMOTE: u8 = 1;
/// Right button toggles fullscreen
const BUTTON_FULLSCREEN: u8 = 3;

/// Display-server notifications the viewer reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Expose { window: u32 },
    Configure { window: u32, size: Size },
    ButtonPress { window: u32, button: u8 },
    KeyPress { window: u32, keycode: u8 },
    /// The window manager asked the viewer to close
    Close,
    /// Asynchronous X error for one of our requests
    Error(String),
    Ignored,
}

/// What the loop should do after a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

/// Map an X11 event onto a notification
pub fn decode(event: &Event, atoms: &Atoms) -> Notification {
    match event {
        // Only the last expose of a series
        Event::Expose(e) if e.count == 0 => Notification::Expose { window: e.window },
        Event::ConfigureNotify(e) => Notification::Configure {
            window: e.window,
            size: Size::new(e.width as u32, e.height as u32),
        },
        Event::ButtonPress(e) => Notification::ButtonPress {
            window: e.event,
            button: e.detail,
        },
        Event::KeyPress(e) => Notification::KeyPress {
            window: e.event,
            keycode: e.detail,
        },
        Event::ClientMessage(e) if atoms.is_delete_window(e) => Notification::Close,
        Event::Error(e) => Notification::Error(format!("{:?}", e)),
        _ => Notification::Ignored,
    }
}

/// Apply one notification to the manager
pub fn dispatch<D: Display>(wm: &mut WindowManager<D>, notification: Notification) -> WmResult<Control> {
    match notification {
        Notification::Expose { window } => {
            trace!("Expose on {}", window);
            wm.redraw(window)?;
        }

        Notification::Configure { window, size } if window == wm.root() => {
            if wm.resize(size)? {
                info!("Root surface resized to {}x{}", size.width, size.height);
            }
        }

        Notification::ButtonPress { window, button } => {
            debug!("ButtonPress: window={}, button={}", window, button);
            match button {
                BUTTON_PROMOTE => {
                    wm.promote(window)?;
                }
                BUTTON_FULLSCREEN => {
                    wm.toggle_fullscreen(window)?;
                }
                _ => {}
            }
        }

        Notification::KeyPress { window, keycode } => {
            // No key commands yet
            debug!("KeyPress: window={}, keycode={}", window, keycode);
        }

        Notification::Close => {
            info!("Close requested by the window manager");
            return Ok(Control::Exit);
        }

        Notification::Error(e) => {
            return Err(WmError::Protocol(e));
        }

        Notification::Configure { .. } | Notification::Ignored => {}
    }

    Ok(Control::Continue)
}

/// Run until the viewer is closed or the connection fails
///
/// Returns `Ok(())` only when the window manager asked us to close.
pub async fn run<D: Display>(
    stream: &X11EventStream,
    atoms: &Atoms,
    wm: &mut WindowManager<D>,
) -> WmResult<()> {
    info!("Entering event loop");
    loop {
        stream.flush()?;

        while let Some(event) = stream.poll_next_event()? {
            if dispatch(wm, decode(&event, atoms))? == Control::Exit {
                return Ok(());
            }
        }

        stream.flush()?;
        stream.wait_readable().await?;
    }
}
