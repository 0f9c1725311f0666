use super::guard::FeedbackGuard;
use crate::message::Camera;
use crate::types::Millis;

pub const DEFAULT_MIN_INTERVAL: Millis = 50;

/// Leading-edge throttle for outgoing camera updates.
///
/// The trailing update of a window is not kept: it goes out only if another
/// change arrives after the window closed.
#[derive(Debug, Clone)]
pub struct EmitThrottle {
    min_interval: Millis,
    last_emit: Option<Millis>,
}

impl EmitThrottle {
    pub fn new(min_interval: Millis) -> Self {
        Self {
            min_interval,
            last_emit: None,
        }
    }

    pub fn on_camera_changed(
        &mut self,
        now: Millis,
        camera: Camera,
        guard: &FeedbackGuard,
    ) -> Option<Camera> {
        if guard.is_applying(now) {
            return None;
        }
        if let Some(last) = self.last_emit {
            if now.saturating_sub(last) < self.min_interval {
                return None;
            }
        }
        self.last_emit = Some(now);
        Some(camera)
    }
}

impl Default for EmitThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
