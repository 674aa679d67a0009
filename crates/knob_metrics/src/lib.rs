//! Knob Metrics - Instrumentation for the settings registry
//!
//! Counts connection traffic (pushes, pulls, applies) and times registry
//! passes. Everything vanishes in production builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use knob_metrics::{Counter, PassProfiler};
//!
//! let mut counter = Counter::new();
//! counter.increment("push", 1);
//!
//! let mut profiler = PassProfiler::new();
//! profiler.time_pass("apply", || settings.apply(true));
//! ```
//!
//! Without the `metrics` feature every type below is a zero-sized stub.

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod profiler;

#[cfg(feature = "metrics")]
pub use counter::Counter;
#[cfg(feature = "metrics")]
pub use profiler::PassProfiler;

// ============================================================================
// Macros for conditional compilation
// ============================================================================

/// Execute code only when metrics are enabled
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&mut self, _name: &str, _value: usize) {}
    pub fn get(&self, _name: &str) -> usize { 0 }
    pub fn reset_all(&mut self) {}
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct PassProfiler;

#[cfg(not(feature = "metrics"))]
impl PassProfiler {
    pub fn new() -> Self { Self }
    pub fn time_pass<F, R>(&mut self, _name: &str, f: F) -> R where F: FnOnce() -> R { f() }
    pub fn get_timing(&self, _name: &str) -> std::time::Duration { std::time::Duration::ZERO }
    pub fn runs(&self, _name: &str) -> u32 { 0 }
}
