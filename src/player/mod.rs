//! Video player capability
//!
//! A player renders one camera into a surface it does not own. The window
//! manager only tells it where to draw and which stream to show.

pub mod mpv;

use crate::error::PlayerError;
use crate::layout::{Rect, Size};

pub use mpv::MpvPlayer;

/// Which of the camera's streams should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Full resolution, used while the tile holds the primary position
    Main,
    /// Low resolution, used for every other tile
    Sub,
}

/// Geometry and fill a player is asked to render with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub surface: u32,
    /// Current size of the surface
    pub size: Size,
    /// Main stream region, surface-local
    pub main: Rect,
    /// Sub stream region, surface-local
    pub sub: Rect,
    /// Fill color (0xRRGGBB)
    pub background: u32,
    pub stream: Stream,
}

impl Attachment {
    /// Region of the stream being shown, clipped to the surface
    pub fn active_rect(&self) -> Rect {
        let rect = match self.stream {
            Stream::Main => self.main,
            Stream::Sub => self.sub,
        };
        rect.clamp_to(self.size)
    }
}

/// Opaque video renderer bound to one surface
pub trait Player: Send {
    /// Apply geometry, fill and stream selection
    fn attach(&mut self, attachment: &Attachment) -> Result<(), PlayerError>;

    /// Repaint after the surface was exposed
    fn redraw(&mut self) -> Result<(), PlayerError> {
        Ok(())
    }

    /// Stop rendering and free the backend
    fn release(&mut self);
}

#[cfg(test)]
pub mod testing {
    //! Player that only counts calls

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    pub struct Calls {
        pub attach: AtomicUsize,
        pub redraw: AtomicUsize,
        pub release: AtomicUsize,
    }

    impl Calls {
        pub fn attaches(&self) -> usize {
            self.attach.load(Ordering::SeqCst)
        }

        pub fn redraws(&self) -> usize {
            self.redraw.load(Ordering::SeqCst)
        }

        pub fn releases(&self) -> usize {
            self.release.load(Ordering::SeqCst)
        }
    }

    pub struct CountingPlayer {
        pub calls: Arc<Calls>,
    }

    impl CountingPlayer {
        pub fn new() -> (Self, Arc<Calls>) {
            let calls = Arc::new(Calls::default());
            (
                Self {
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl Player for CountingPlayer {
        fn attach(&mut self, _attachment: &Attachment) -> Result<(), PlayerError> {
            self.calls.attach.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn redraw(&mut self) -> Result<(), PlayerError> {
            self.calls.redraw.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn release(&mut self) {
            self.calls.release.fetch_add(1, Ordering::SeqCst);
        }
    }
}
