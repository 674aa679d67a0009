//! Timing for named registry passes (load, apply, pull)

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct PassProfiler {
    timings: HashMap<String, PassTiming>,
}

#[derive(Debug, Default, Clone, Copy)]
struct PassTiming {
    total: Duration,
    runs: u32,
}

impl PassProfiler {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
        }
    }

    pub fn time_pass<F, R>(&mut self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        let timing = self.timings.entry(name.to_string()).or_default();
        timing.total += elapsed;
        timing.runs += 1;
        result
    }

    /// Accumulated time spent in `name`.
    pub fn get_timing(&self, name: &str) -> Duration {
        self.timings
            .get(name)
            .map(|timing| timing.total)
            .unwrap_or(Duration::ZERO)
    }

    pub fn runs(&self, name: &str) -> u32 {
        self.timings.get(name).map(|timing| timing.runs).unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.timings.clear();
    }
}
