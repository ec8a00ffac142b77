//! Observability hook output.
//!
//! After every completed update the connection builds a [`MetricsUpdated`]
//! snapshot and hands it to the attached [`TimingObserver`]. Snapshots mirror
//! the qlog `recovery:metrics_updated` event so RTT plots can be drawn from a
//! recorded log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::TimingObserver;

use super::path::{PathId, PathTiming};

/// Snapshot of one path's timing after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MetricsUpdated {
    /// Microseconds since connection start.
    #[cfg_attr(feature = "serde", serde(skip_serializing))]
    pub time: u64,
    /// Path identifier.
    pub path: PathId,
    /// Latest raw sample.
    pub latest_rtt: u64,
    /// Smoothed RTT.
    pub smoothed_rtt: u64,
    /// RTT variance.
    pub rtt_variance: u64,
    /// Smallest RTT observed.
    pub min_rtt: u64,
    /// Largest RTT observed.
    pub max_rtt: u64,
    /// Current retransmission timeout.
    pub pto: u64,
    /// Latest accepted one-way delay.
    pub one_way_delay: u64,
}

impl MetricsUpdated {
    /// Snapshot `timing` with the given RTO.
    pub fn new(time: u64, path: PathId, timing: &PathTiming, pto: u64) -> Self {
        Self {
            time,
            path,
            latest_rtt: timing.rtt_sample(),
            smoothed_rtt: timing.smoothed_rtt(),
            rtt_variance: timing.rtt_variance(),
            min_rtt: timing.rtt_min(),
            max_rtt: timing.rtt_max(),
            pto,
            one_way_delay: timing.one_way_delay_sample(),
        }
    }

    /// Render as a qlog event: `[time, "recovery", "metrics_updated", {..}]`.
    #[cfg(feature = "serde")]
    pub fn to_qlog_event(&self) -> serde_json::Value {
        serde_json::json!([self.time, "recovery", "metrics_updated", self])
    }
}

/// Bounded in-memory log of snapshots.
///
/// Clones share the same buffer, so one clone can be attached to a
/// connection while another is read.
#[derive(Debug, Clone)]
pub struct MetricsLog {
    capacity: usize,
    entries: Arc<Mutex<VecDeque<MetricsUpdated>>>,
}

impl MetricsLog {
    /// Keep at most `capacity` snapshots, dropping the oldest.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no snapshot is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the stored snapshots, oldest first.
    pub fn snapshots(&self) -> Vec<MetricsUpdated> {
        self.lock().iter().copied().collect()
    }

    /// Most recent snapshot.
    pub fn last(&self) -> Option<MetricsUpdated> {
        self.lock().back().copied()
    }

    /// Render stored snapshots as qlog events, one JSON document per line.
    #[cfg(feature = "serde")]
    pub fn to_json_lines(&self) -> String {
        self.lock()
            .iter()
            .map(|update| update.to_qlog_event().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<MetricsUpdated>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimingObserver for MetricsLog {
    fn on_timing_update(&mut self, update: &MetricsUpdated) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(*update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(time: u64) -> MetricsUpdated {
        let mut timing = PathTiming::new(250_000, 1_000_000);
        timing.observe(time);
        MetricsUpdated::new(time, PathId(0), &timing, 300_000)
    }

    #[test]
    fn test_log_is_bounded() {
        let mut log = MetricsLog::new(2);
        assert!(log.is_empty());

        log.on_timing_update(&update(1));
        log.on_timing_update(&update(2));
        log.on_timing_update(&update(3));

        let times: Vec<u64> = log.snapshots().iter().map(|u| u.time).collect();
        assert_eq!(times, vec![2, 3]);
        assert_eq!(log.last().map(|u| u.latest_rtt), Some(3));
    }

    #[test]
    fn test_clones_share_buffer() {
        let log = MetricsLog::new(4);
        let mut writer = log.clone();
        writer.on_timing_update(&update(10));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut log = MetricsLog::new(0);
        log.on_timing_update(&update(1));
        assert!(log.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_qlog_shape() {
        let event = update(42).to_qlog_event();

        assert_eq!(event[0], 42);
        assert_eq!(event[1], "recovery");
        assert_eq!(event[2], "metrics_updated");
        assert_eq!(event[3]["latest_rtt"], 42);
        assert_eq!(event[3]["pto"], 300_000);
        assert!(event[3].get("time").is_none());
    }
}
