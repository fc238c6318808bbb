use std::sync::{Arc, Mutex};

use crate::shared::frame::Frame;

/// Latest-frame mailbox between a capture session and whatever displays it.
///
/// Publishing replaces any frame not yet taken, so a slow display only ever
/// sees the newest frame. Cloning shares the same mailbox.
#[derive(Clone, Default)]
pub struct PreviewFeed {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl PreviewFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Frame) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(frame);
        }
    }

    /// Takes the newest frame, leaving the mailbox empty.
    pub fn take_latest(&self) -> Option<Frame> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 3], 1, 1, 3, index)
    }

    #[test]
    fn test_empty_feed() {
        assert!(PreviewFeed::new().take_latest().is_none());
    }

    #[test]
    fn test_newest_frame_wins() {
        let feed = PreviewFeed::new();
        feed.publish(frame(1));
        feed.publish(frame(2));
        assert_eq!(feed.take_latest().unwrap().index(), 2);
        assert!(feed.take_latest().is_none());
    }

    #[test]
    fn test_clones_share_mailbox() {
        let feed = PreviewFeed::new();
        let display = feed.clone();
        feed.publish(frame(9));
        assert_eq!(display.take_latest().unwrap().index(), 9);
    }
}
