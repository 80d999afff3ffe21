//! Wall-clock playback position.
//!
//! SMF timelines are already converted to milliseconds, so the clock only
//! has to measure elapsed real time from the moment play was pressed.

use std::time::Instant;

#[derive(Debug, Default)]
pub struct PlaybackClock {
    /// When play was pressed (None if paused/stopped)
    start_instant: Option<Instant>,

    /// Position when play was pressed
    start_ms: u64,

    current_ms: u64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the current position
    pub fn start(&mut self) {
        if self.start_instant.is_none() {
            self.start_instant = Some(Instant::now());
            self.start_ms = self.current_ms;
        }
    }

    pub fn is_running(&self) -> bool {
        self.start_instant.is_some()
    }

    /// Pause without resetting position
    pub fn pause(&mut self) {
        if self.start_instant.is_some() {
            self.tick();
            self.start_instant = None;
        }
    }

    /// Stop and rewind to zero
    pub fn stop(&mut self) {
        self.start_instant = None;
        self.start_ms = 0;
        self.current_ms = 0;
    }

    pub fn seek(&mut self, ms: u64) {
        self.current_ms = ms;
        self.start_ms = ms;
        if self.start_instant.is_some() {
            self.start_instant = Some(Instant::now());
        }
    }

    /// Advance by elapsed wall time and return the position in ms.
    pub fn tick(&mut self) -> u64 {
        let Some(start) = self.start_instant else {
            return self.current_ms;
        };

        let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.current_ms = self.start_ms.saturating_add(elapsed);
        self.current_ms
    }

    pub fn position_ms(&self) -> u64 {
        self.current_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_new_clock_at_zero() {
        let clock = PlaybackClock::new();
        assert_eq!(clock.position_ms(), 0);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_stop_resets_position() {
        let mut clock = PlaybackClock::new();
        clock.seek(4_000);
        clock.start();

        clock.stop();
        assert!(!clock.is_running());
        assert_eq!(clock.position_ms(), 0);
    }

    #[test]
    fn test_seek_while_running() {
        let mut clock = PlaybackClock::new();
        clock.start();
        clock.seek(16_000);

        assert!(clock.is_running());
        assert_eq!(clock.position_ms(), 16_000);
    }

    #[test]
    fn test_position_advances_with_time() {
        let mut clock = PlaybackClock::new();
        clock.start();

        thread::sleep(Duration::from_millis(100));
        let position = clock.tick();

        // Allow some tolerance for sleep inaccuracy
        assert!(position >= 100, "position {} should be >= 100", position);
        assert!(position < 300, "position {} should be < 300", position);
    }

    #[test]
    fn test_pause_preserves_position() {
        let mut clock = PlaybackClock::new();
        clock.start();
        thread::sleep(Duration::from_millis(50));
        clock.pause();
        let position_at_pause = clock.position_ms();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(clock.tick(), position_at_pause);
    }

    #[test]
    fn test_resume_after_pause() {
        let mut clock = PlaybackClock::new();
        clock.seek(1_000);
        clock.start();
        clock.pause();

        clock.start();
        thread::sleep(Duration::from_millis(50));
        assert!(clock.tick() >= 1_050);
    }
}
