use std::time::{Duration, Instant};

pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(2000);

/// Trailing-edge debounce for whole-sheet pushes: every edit restarts the
/// quiet window, and a push is due once the window passes without edits.
/// The caller supplies the clock.
#[derive(Debug, Clone)]
pub struct SyncDebouncer {
    window: Duration,
    last_edit: Option<Instant>,
}

impl SyncDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_edit: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_edit = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_edit.is_some()
    }

    pub fn due(&self, now: Instant) -> bool {
        self.last_edit
            .is_some_and(|t| now.saturating_duration_since(t) >= self.window)
    }

    pub fn mark_flushed(&mut self) {
        self.last_edit = None;
    }
}

impl Default for SyncDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIESCENCE)
    }
}
