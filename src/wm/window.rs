//! Camera window state

use std::sync::Arc;

use crate::error::PlayerError;
use crate::layout::{Rect, Size};
use crate::player::{Attachment, Stream};
use crate::wm::cache::PlayerCache;

/// A child surface bound to the player drawing into it
pub struct Window {
    /// Surface id, owned by the display connection
    pub id: u32,
    pub player: Arc<PlayerCache>,
    /// Main stream region inside the surface; `None` means the whole surface
    pub main_rect: Option<Rect>,
    /// Sub stream region inside the surface; `None` falls back to `main_rect`
    pub sub_rect: Option<Rect>,
    /// Fill color (0xRRGGBB)
    pub background: u32,
}

impl Window {
    pub fn new(
        id: u32,
        player: PlayerCache,
        main_rect: Option<Rect>,
        sub_rect: Option<Rect>,
        background: u32,
    ) -> Self {
        Self {
            id,
            player: Arc::new(player),
            main_rect,
            sub_rect,
            background,
        }
    }

    /// What the player should render for a surface of `size`
    pub fn attachment(&self, size: Size, stream: Stream) -> Attachment {
        let main = self.main_rect.unwrap_or(Rect::from_size(size));
        let sub = self.sub_rect.unwrap_or(main);
        Attachment {
            surface: self.id,
            size,
            main,
            sub,
            background: self.background,
            stream,
        }
    }

    pub fn attach(&self, size: Size, stream: Stream) -> Result<(), PlayerError> {
        self.player.attach(&self.attachment(size, stream))
    }

    pub fn redraw(&self) -> Result<(), PlayerError> {
        self.player.redraw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::testing::CountingPlayer;

    #[test]
    fn test_default_regions_cover_surface() {
        let (player, _) = CountingPlayer::new();
        let window = Window::new(9, PlayerCache::new(Box::new(player)), None, None, 0xff0000);

        let a = window.attachment(Size::new(640, 360), Stream::Sub);
        assert_eq!(a.surface, 9);
        assert_eq!(a.main, Rect::new(0, 0, 640, 360));
        assert_eq!(a.sub, a.main);
        assert_eq!(a.background, 0xff0000);
    }

    #[test]
    fn test_sub_falls_back_to_main() {
        let (player, _) = CountingPlayer::new();
        let main = Rect::new(10, 10, 100, 100);
        let window = Window::new(1, PlayerCache::new(Box::new(player)), Some(main), None, 0);

        let a = window.attachment(Size::new(640, 360), Stream::Sub);
        assert_eq!(a.sub, main);
        assert_eq!(a.active_rect(), main);
    }
}
