use std::sync::atomic::{AtomicBool, Ordering};

/// Presentation flags owned outside the pipeline (a menu, the CLI).
///
/// The producer reads `speedup` once per frame and the display consumer reads
/// `scaling` once per presented frame.
#[derive(Debug)]
pub struct Settings {
    scaling: AtomicBool,
    speedup: AtomicBool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Settings {
    pub fn new(scaling: bool, speedup: bool) -> Self {
        Self {
            scaling: AtomicBool::new(scaling),
            speedup: AtomicBool::new(speedup),
        }
    }

    pub fn scaling(&self) -> bool {
        self.scaling.load(Ordering::Acquire)
    }

    pub fn set_scaling(&self, enabled: bool) {
        self.scaling.store(enabled, Ordering::Release);
    }

    pub fn speedup(&self) -> bool {
        self.speedup.load(Ordering::Acquire)
    }

    pub fn set_speedup(&self, enabled: bool) {
        self.speedup.store(enabled, Ordering::Release);
    }
}
