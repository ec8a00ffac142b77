//! Capabilities the timing engine consumes.
//!
//! These are the seams to the rest of the transport: congestion control,
//! path-quality reporting, delayed-ack tuning and observability. Every one of
//! them is optional at the connection level except the ack-frequency policy,
//! which has a default.

use crate::timing::{AckFrequency, CongestionEvent, ConnectionTiming, MetricsUpdated, Path};

/// Receives RTT measurements and seed windows.
///
/// # Example
///
/// ```
/// use pathtime::prelude::*;
///
/// #[derive(Default)]
/// struct MinRttTracker {
///     min_rtt: Option<u64>,
/// }
///
/// impl CongestionNotifier for MinRttTracker {
///     fn notify(&mut self, event: &CongestionEvent) {
///         if event.kind == CongestionEventKind::RttMeasurement {
///             let min = self.min_rtt.get_or_insert(event.rtt_estimate);
///             *min = (*min).min(event.rtt_estimate);
///         }
///     }
/// }
/// ```
pub trait CongestionNotifier: Send {
    /// Handle one event. Called synchronously from the update path.
    fn notify(&mut self, event: &CongestionEvent);
}

/// Told after every completed update of a path.
pub trait PathQualityObserver: Send {
    /// The path's timing statistics may have changed.
    fn on_path_quality_changed(&mut self, connection: &ConnectionTiming, path: &Path);
}

/// Recomputes delayed-ack parameters when the primary path RTT changes.
pub trait AckFrequencyPolicy: Send {
    /// Gap and delay for the given minimum RTT, ack delay floor and peak
    /// receive rate (bytes per second).
    fn compute(&self, rtt_min: u64, ack_delay_floor: u64, max_receive_rate: u64) -> AckFrequency;
}

/// Structured observability hook, invoked after each update.
pub trait TimingObserver: Send {
    /// Consume a snapshot. Must not block.
    fn on_timing_update(&mut self, update: &MetricsUpdated);
}
