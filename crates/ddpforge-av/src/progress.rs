//! Progress tracking for the encoding engine.
//!
//! The engine reports progress as `Overall progress: <float>` lines on its
//! output stream. [`ProgressMonitor`] turns matching lines into
//! [`ProgressEvent`]s carrying elapsed and estimated remaining time.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// A single progress observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// 0.0..=100.0
    pub percent: f64,
    pub elapsed: Duration,
    pub remaining: Duration,
}

impl ProgressEvent {
    /// Derive an event from a percentage and the time spent so far.
    ///
    /// With a positive percentage the total is extrapolated linearly
    /// (`elapsed / (percent / 100)`); otherwise remaining is zero.
    pub fn at(percent: f64, elapsed: Duration) -> Self {
        let percent = percent.clamp(0.0, 100.0);
        let remaining = if percent > 0.0 {
            let total = elapsed.as_secs_f64() / (percent / 100.0);
            Duration::from_secs_f64((total - elapsed.as_secs_f64()).max(0.0))
        } else {
            Duration::ZERO
        };

        Self {
            percent,
            elapsed,
            remaining,
        }
    }

    /// The terminal event emitted once the process exited successfully.
    pub fn complete(elapsed: Duration) -> Self {
        Self {
            percent: 100.0,
            elapsed,
            remaining: Duration::ZERO,
        }
    }
}

fn progress_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"Overall progress:\s*(\d+(?:\.\d+)?)").expect("progress marker regex is valid")
    })
}

/// Extract the percentage from an engine output line, if it carries one.
pub fn parse_progress(line: &str) -> Option<f64> {
    progress_marker()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Stateful matcher bound to the start time of one process run.
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    started: Instant,
}

impl ProgressMonitor {
    /// Start tracking now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Time since the monitor was started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Match a line; returns an event when it is a progress marker.
    pub fn observe(&self, line: &str) -> Option<ProgressEvent> {
        parse_progress(line).map(|pct| ProgressEvent::at(pct, self.elapsed()))
    }
}

/// Format a duration as `HH:MM:SS`.
pub fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
