use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters for one orchestration run. Used to decide whether to publish
/// and reported at the end of the run; never persisted.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessingMetrics {
    pub timestamp: DateTime<Utc>,
    pub translator: String,

    // field positions
    pub units_total: usize,
    pub units_reused: usize,
    pub units_requested: usize,
    pub units_translated: usize,

    // unique source strings
    pub strings_requested: usize,
    pub strings_translated: usize,
    pub strings_failed: usize,

    pub errors: usize,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

impl ProcessingMetrics {
    pub fn new(translator: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            translator: translator.to_string(),
            ..Default::default()
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn reuse_pct(&self) -> f64 {
        Self::pct(self.units_reused, self.units_total)
    }

    /// True when some requested translation did not make it into the feed.
    pub fn degraded(&self) -> bool {
        self.timed_out || self.errors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(ProcessingMetrics::pct(10, 0), 0.0);
    }

    #[test]
    fn test_reuse_pct() {
        let metrics = ProcessingMetrics {
            units_total: 8,
            units_reused: 6,
            ..ProcessingMetrics::new("mock")
        };
        assert_eq!(metrics.reuse_pct(), 75.0);
        assert!(!metrics.degraded());
    }

    #[test]
    fn test_degraded_on_timeout() {
        let metrics = ProcessingMetrics {
            timed_out: true,
            ..ProcessingMetrics::new("mock")
        };
        assert!(metrics.degraded());
    }
}
