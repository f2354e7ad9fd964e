//! Frame budgets and frame-rate measurement.

use std::time::Instant;

/// Work budgets handed to the emulation core each frame.
///
/// These are tuned for one specific core; treat them as configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacingConfig {
    /// Cycles run before stepping through the visible lines.
    pub visible_cycles: u32,
    /// Cycles run after the frame was handed off, only while the LCD is off.
    pub vblank_cycles: u32,
    /// Lines at which the visible phase ends.
    pub visible_lines: u32,
    /// Frames per frame-rate report.
    pub report_interval: u32,
    /// Tick frequency of the [`CycleCounter`].
    pub counter_hz: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            visible_cycles: 2280,
            vblank_cycles: 32832,
            visible_lines: 144,
            report_interval: 60,
            counter_hz: 1_000_000,
        }
    }
}

/// Free-running 32-bit tick counter.
pub trait CycleCounter: Send {
    fn now(&self) -> u32;
}

/// Microsecond counter derived from [`Instant`], wrapping like a hardware
/// cycle counter.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicCounter {
    epoch: Instant,
}

impl Default for MonotonicCounter {
    fn default() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl CycleCounter for MonotonicCounter {
    fn now(&self) -> u32 {
        self.epoch.elapsed().as_micros() as u32
    }
}

/// Ticks between two counter reads, tolerating one wrap of the counter.
pub fn elapsed_cycles(start: u32, stop: u32) -> u64 {
    if stop >= start {
        (stop - start) as u64
    } else {
        stop as u64 + u32::MAX as u64 - start as u64
    }
}

/// Aggregate of one report interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    pub frames: u32,
    pub elapsed: u64,
    pub fps: f32,
}

/// Accumulates per-frame ticks and reports every `interval` frames.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    interval: u32,
    counter_hz: u64,
    frames: u32,
    elapsed: u64,
}

impl FpsMeter {
    pub fn new(interval: u32, counter_hz: u64) -> Self {
        Self {
            interval: interval.max(1),
            counter_hz: counter_hz.max(1),
            frames: 0,
            elapsed: 0,
        }
    }

    /// Record one frame. Returns the stats when an interval completes.
    pub fn record(&mut self, elapsed: u64) -> Option<FrameStats> {
        self.elapsed += elapsed;
        self.frames += 1;
        if self.frames < self.interval {
            return None;
        }

        let seconds = self.elapsed as f64 / self.counter_hz as f64;
        let fps = if seconds > 0.0 {
            (self.frames as f64 / seconds) as f32
        } else {
            0.0
        };
        let stats = FrameStats {
            frames: self.frames,
            elapsed: self.elapsed,
            fps,
        };
        self.frames = 0;
        self.elapsed = 0;
        Some(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_without_wrap() {
        assert_eq!(elapsed_cycles(100, 250), 150);
        assert_eq!(elapsed_cycles(7, 7), 0);
    }

    #[test]
    fn elapsed_tolerates_one_wrap() {
        assert_eq!(elapsed_cycles(u32::MAX - 10, 5), 5 + 10);
        assert_eq!(elapsed_cycles(1, 0), u32::MAX as u64 - 1);
    }

    #[test]
    fn meter_reports_once_per_interval() {
        let mut meter = FpsMeter::new(60, 1_000_000);
        for _ in 0..59 {
            assert!(meter.record(16_667).is_none());
        }
        let stats = meter.record(16_667).unwrap();
        assert_eq!(stats.frames, 60);
        assert!((stats.fps - 60.0).abs() < 0.1);
        assert!(meter.record(16_667).is_none());
    }
}
