use crate::types::Millis;

pub const DEFAULT_SUPPRESSION_WINDOW: Millis = 100;

/// Marks camera changes caused by applying a remote view, so they are not
/// mistaken for local driver input and sent back.
#[derive(Debug, Clone)]
pub struct FeedbackGuard {
    window: Millis,
    applying_until: Option<Millis>,
}

impl FeedbackGuard {
    pub fn new(window: Millis) -> Self {
        Self {
            window,
            applying_until: None,
        }
    }

    pub fn arm(&mut self, now: Millis) {
        self.applying_until = Some(now.saturating_add(self.window));
    }

    pub fn is_applying(&self, now: Millis) -> bool {
        self.applying_until.map_or(false, |until| now < until)
    }
}

impl Default for FeedbackGuard {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPRESSION_WINDOW)
    }
}
