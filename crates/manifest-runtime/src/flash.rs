//! Error flash
//!
//! Keeps the most recent error visible for a hold window after the error
//! condition clears, so fast failures are not missed.

use std::time::Duration;
use tokio::time::Instant;

/// Latest error with a minimum display time
#[derive(Debug, Clone)]
pub struct ErrorFlash {
    hold: Duration,
    message: Option<String>,
    active: bool,
    raised_at: Option<Instant>,
}

impl ErrorFlash {
    /// Create flash with hold window
    #[must_use]
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            message: None,
            active: false,
            raised_at: None,
        }
    }

    /// Report the current error condition (`None` = cleared)
    pub fn observe(&mut self, error: Option<&str>) {
        match error {
            Some(message) => {
                if !self.active || self.message.as_deref() != Some(message) {
                    self.raised_at = Some(Instant::now());
                }
                self.message = Some(message.to_string());
                self.active = true;
            }
            None => self.active = false,
        }
    }

    /// Message to display right now
    #[must_use]
    pub fn visible(&self) -> Option<&str> {
        if self.active {
            return self.message.as_deref();
        }
        let raised_at = self.raised_at?;
        if Instant::now() < raised_at + self.hold {
            self.message.as_deref()
        } else {
            None
        }
    }

    /// Forget the error immediately (user dismissed it)
    pub fn dismiss(&mut self) {
        self.message = None;
        self.active = false;
        self.raised_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cleared_error_stays_for_hold_window() {
        let mut flash = ErrorFlash::new(Duration::from_millis(2500));
        flash.observe(Some("Failed to save"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        flash.observe(None);

        assert_eq!(flash.visible(), Some("Failed to save"));
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(flash.visible(), Some("Failed to save"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(flash.visible(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn active_error_is_always_visible() {
        let mut flash = ErrorFlash::new(Duration::from_millis(10));
        flash.observe(Some("boom"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(flash.visible(), Some("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_hides_immediately() {
        let mut flash = ErrorFlash::new(Duration::from_secs(10));
        flash.observe(Some("boom"));
        flash.observe(None);
        flash.dismiss();
        assert_eq!(flash.visible(), None);
    }
}
