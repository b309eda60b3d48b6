use std::time::{Duration, Instant};

/// Frame timestamp in milliseconds since the owning clock's origin.
///
/// Fractional milliseconds are preserved, matching the high resolution
/// timestamps browsers hand to animation frame callbacks.
pub type Timestamp = f64;

/// Frame interval used when the display refresh rate is unknown (~60 Hz).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Monotonic millisecond clock for frame delivery.
///
/// `FrameClock` never reports a value smaller than one it already reported,
/// even if it is reset, so consumers can rely on non-decreasing frame times.
#[derive(Debug, Clone)]
pub struct FrameClock {
    origin: Instant,
    last: Timestamp,
}

impl FrameClock {
    /// Creates a clock whose origin is the current instant.
    pub fn new() -> Self {
        Self::with_origin(Instant::now())
    }

    /// Creates a clock measuring from `origin`.
    pub fn with_origin(origin: Instant) -> Self {
        Self { origin, last: 0.0 }
    }

    /// Time elapsed since the origin.
    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.origin)
    }

    /// Returns the current timestamp.
    pub fn now_ms(&mut self) -> Timestamp {
        self.at(Instant::now())
    }

    /// Returns the timestamp of `instant`, clamped so it never goes backwards.
    pub fn at(&mut self, instant: Instant) -> Timestamp {
        let ms = instant.saturating_duration_since(self.origin).as_nanos() as f64 / 1_000_000.0;
        self.last = self.last.max(ms);
        self.last
    }

    /// Moves the origin to now while keeping timestamps continuous.
    ///
    /// Useful when resuming from suspension: the next reading continues from
    /// the last reported value instead of jumping ahead by the suspended time.
    pub fn reset(&mut self) {
        let offset = Duration::from_secs_f64(self.last / 1000.0);
        let now = Instant::now();
        self.origin = now.checked_sub(offset).unwrap_or(now);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a refresh rate in millihertz into a frame interval.
///
/// Returns `DEFAULT_FRAME_INTERVAL` for a zero rate.
pub fn frame_interval_for_refresh(millihertz: u32) -> Duration {
    if millihertz == 0 {
        return DEFAULT_FRAME_INTERVAL;
    }
    Duration::from_secs_f64(1000.0 / millihertz as f64)
}
