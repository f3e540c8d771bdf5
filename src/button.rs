//! Debounced press edge detection

use std::time::{Duration, Instant};

/// Default time a raw level must hold before it is trusted
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(20);

/// Turns raw button samples into one event per physical press
///
/// A press is recognized only on the debounced released -> pressed
/// transition. Holding the button yields nothing further until it has been
/// released and pressed again.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    debounce: Duration,
    /// Last debounced level
    stable: bool,
    /// Most recent raw level and when it first appeared
    raw: bool,
    raw_since: Option<Instant>,
}

impl EdgeDetector {
    /// Create a detector that starts released
    #[must_use]
    pub const fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            stable: false,
            raw: false,
            raw_since: None,
        }
    }

    /// Feed one sample; returns true on a recognized press
    pub fn update(&mut self, pressed: bool, now: Instant) -> bool {
        if pressed != self.raw || self.raw_since.is_none() {
            self.raw = pressed;
            self.raw_since = Some(now);
        }

        if self.raw == self.stable {
            return false;
        }

        let held = self
            .raw_since
            .map_or(Duration::ZERO, |since| now.saturating_duration_since(since));
        if held < self.debounce {
            return false;
        }

        self.stable = self.raw;
        if self.stable {
            tracing::trace!("button press edge");
        }
        self.stable
    }

    /// Debounced level
    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        self.stable
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn held_button_fires_once() {
        let t0 = Instant::now();
        let mut detector = EdgeDetector::new(Duration::ZERO);

        let presses = (0..50)
            .filter(|i| detector.update(true, t0 + ms(*i * 5)))
            .count();
        assert_eq!(presses, 1);
    }

    #[test]
    fn release_then_press_fires_again() {
        let t0 = Instant::now();
        let mut detector = EdgeDetector::new(Duration::ZERO);

        assert!(detector.update(true, t0));
        assert!(!detector.update(false, t0 + ms(5)));
        assert!(detector.update(true, t0 + ms(10)));
    }

    #[test]
    fn idle_never_fires() {
        let t0 = Instant::now();
        let mut detector = EdgeDetector::default();
        assert!((0..20).all(|i| !detector.update(false, t0 + ms(i * 5))));
    }

    #[test]
    fn bounce_shorter_than_debounce_is_ignored() {
        let t0 = Instant::now();
        let mut detector = EdgeDetector::new(ms(20));

        assert!(!detector.update(true, t0));
        assert!(!detector.update(false, t0 + ms(5)));
        assert!(!detector.update(true, t0 + ms(10)));
        assert!(!detector.update(false, t0 + ms(15)));
        assert!(!detector.is_pressed());
    }

    #[test]
    fn stable_press_fires_after_debounce() {
        let t0 = Instant::now();
        let mut detector = EdgeDetector::new(ms(20));

        assert!(!detector.update(true, t0));
        assert!(!detector.update(true, t0 + ms(10)));
        assert!(detector.update(true, t0 + ms(20)));
        assert!(!detector.update(true, t0 + ms(30)));
        assert!(detector.is_pressed());
    }

    #[test]
    fn release_bounce_does_not_double_fire() {
        let t0 = Instant::now();
        let mut detector = EdgeDetector::new(ms(20));

        detector.update(true, t0);
        assert!(detector.update(true, t0 + ms(20)));

        // Contact chatter on release
        assert!(!detector.update(false, t0 + ms(100)));
        assert!(!detector.update(true, t0 + ms(105)));
        assert!(!detector.update(true, t0 + ms(110)));
        assert!(!detector.update(false, t0 + ms(115)));
        assert!(!detector.update(false, t0 + ms(140)));
        assert!(!detector.is_pressed());
    }
}
