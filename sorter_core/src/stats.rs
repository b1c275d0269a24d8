//! Running session counters.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::types::{Disposition, SortEvent, Verdict, WeightSource};

/// Counters only ever increase; they are updated once per finalized `SortEvent`
/// or failed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    pub total: u64,
    /// Accepted beans.
    pub good: u64,
    /// Rejected beans, whatever the reason.
    pub bad: u64,
    pub unknown: u64,
    pub weight_rejected: u64,
    pub degraded_weight: u64,
    pub clamped_moves: u64,
    pub failed_cycles: u64,
    pub total_weight_g: f64,
    /// Beans whose weight came from the load cell.
    pub weighed: u64,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
}

impl SessionStats {
    pub fn new(started: Instant) -> Self {
        Self {
            total: 0,
            good: 0,
            bad: 0,
            unknown: 0,
            weight_rejected: 0,
            degraded_weight: 0,
            clamped_moves: 0,
            failed_cycles: 0,
            total_weight_g: 0.0,
            weighed: 0,
            started,
            started_at: Utc::now(),
        }
    }

    pub fn record(&mut self, ev: &SortEvent) {
        self.total += 1;
        match ev.disposition {
            Disposition::Accept => self.good += 1,
            Disposition::Reject => self.bad += 1,
        }
        if ev.verdict == Verdict::Unknown {
            self.unknown += 1;
        }
        if !ev.weight_ok {
            self.weight_rejected += 1;
        }
        if ev.clamped {
            self.clamped_moves += 1;
        }
        match ev.weight_source {
            WeightSource::Measured if ev.features.weight.is_finite() => {
                self.total_weight_g += ev.features.weight;
                self.weighed += 1;
            }
            WeightSource::Measured => {}
            WeightSource::Default | WeightSource::Failed => self.degraded_weight += 1,
        }
    }

    pub fn record_failure(&mut self) {
        self.failed_cycles += 1;
    }

    pub fn avg_weight_g(&self) -> f64 {
        if self.weighed == 0 {
            0.0
        } else {
            self.total_weight_g / self.weighed as f64
        }
    }

    pub fn good_pct(&self) -> f64 {
        pct(self.good, self.total)
    }

    pub fn bad_pct(&self) -> f64 {
        pct(self.bad, self.total)
    }

    pub fn runtime(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    pub fn beans_per_sec(&self, now: Instant) -> f64 {
        let secs = self.runtime(now).as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.total as f64 / secs
        }
    }
}

fn pct(n: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 * 100.0 / total as f64
    }
}
