//! Player cache
//!
//! Wraps a player so redundant attach requests (the X server happily sends
//! several ConfigureNotify events for one resize) collapse into one call, and
//! so release reaches the backend exactly once no matter how many shutdown
//! paths ask for it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::PlayerError;
use crate::player::{Attachment, Player};

pub struct PlayerCache {
    player: Mutex<Box<dyn Player>>,
    /// Last attachment the player accepted
    attached: Mutex<Option<Attachment>>,
    released: AtomicBool,
}

impl PlayerCache {
    pub fn new(player: Box<dyn Player>) -> Self {
        Self {
            player: Mutex::new(player),
            attached: Mutex::new(None),
            released: AtomicBool::new(false),
        }
    }

    /// Forward `attachment` unless it is the one already applied
    pub fn attach(&self, attachment: &Attachment) -> Result<(), PlayerError> {
        if self.is_released() {
            return Ok(());
        }

        let mut attached = lock(&self.attached);
        if attached.as_ref() == Some(attachment) {
            return Ok(());
        }

        lock(&self.player).attach(attachment)?;
        *attached = Some(attachment.clone());
        Ok(())
    }

    pub fn redraw(&self) -> Result<(), PlayerError> {
        if self.is_released() {
            return Ok(());
        }
        lock(&self.player).redraw()
    }

    /// Release the wrapped player; only the first call reaches it
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Releasing player");
        lock(&self.player).release();
        *lock(&self.attached) = None;
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Drop for PlayerCache {
    fn drop(&mut self) {
        self.release();
    }
}

/// A panic while holding the lock must not block teardown
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Player lock poisoned, continuing");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Rect, Size};
    use crate::player::Stream;
    use crate::player::testing::CountingPlayer;
    use std::sync::Arc;

    fn attachment(width: u32) -> Attachment {
        Attachment {
            surface: 1,
            size: Size::new(width, 100),
            main: Rect::new(0, 0, width, 100),
            sub: Rect::new(0, 0, width, 100),
            background: 0,
            stream: Stream::Sub,
        }
    }

    #[test]
    fn test_identical_attach_forwards_once() {
        let (player, calls) = CountingPlayer::new();
        let cache = PlayerCache::new(Box::new(player));

        cache.attach(&attachment(100)).unwrap();
        cache.attach(&attachment(100)).unwrap();
        assert_eq!(calls.attaches(), 1);

        cache.attach(&attachment(200)).unwrap();
        assert_eq!(calls.attaches(), 2);
    }

    #[test]
    fn test_release_forwards_once() {
        let (player, calls) = CountingPlayer::new();
        let cache = PlayerCache::new(Box::new(player));

        cache.release();
        cache.release();
        assert_eq!(calls.releases(), 1);

        // Nothing reaches a released player
        cache.attach(&attachment(100)).unwrap();
        cache.redraw().unwrap();
        assert_eq!(calls.attaches(), 0);
        assert_eq!(calls.redraws(), 0);

        drop(cache);
        assert_eq!(calls.releases(), 1);
    }

    #[test]
    fn test_drop_releases() {
        let (player, calls) = CountingPlayer::new();
        drop(PlayerCache::new(Box::new(player)));
        assert_eq!(calls.releases(), 1);
    }

    #[test]
    fn test_concurrent_release() {
        let (player, calls) = CountingPlayer::new();
        let cache = Arc::new(PlayerCache::new(Box::new(player)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.release())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(calls.releases(), 1);
    }
}
