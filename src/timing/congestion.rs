//! Congestion-control notification bridge.
//!
//! Forwards every accepted measurement to the attached congestion controller.
//! No filtering, no retries; without a controller nothing is sent.

use crate::core::CongestionNotifier;

use super::path::PathId;

/// Kind of congestion notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionEventKind {
    /// A new RTT measurement.
    RttMeasurement,
    /// A confirmed BDP seed window.
    SeedCwin,
}

/// Event handed to the congestion controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CongestionEvent {
    /// Path the measurement belongs to.
    pub path: PathId,
    /// Event kind.
    pub kind: CongestionEventKind,
    /// RTT estimate (0 for seed events).
    pub rtt_estimate: u64,
    /// One-way delay, or 0 when timestamps are disabled.
    pub one_way_delay: u64,
    /// Seed window (0 for RTT events).
    pub seed_cwin: u64,
    /// Current time.
    pub now: u64,
}

/// Holds the optional congestion controller.
#[derive(Default)]
pub struct CongestionBridge {
    controller: Option<Box<dyn CongestionNotifier>>,
}

impl std::fmt::Debug for CongestionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CongestionBridge")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl CongestionBridge {
    /// Bridge to `controller`.
    pub fn new(controller: Box<dyn CongestionNotifier>) -> Self {
        Self {
            controller: Some(controller),
        }
    }

    /// Replace the controller.
    pub fn attach(&mut self, controller: Box<dyn CongestionNotifier>) {
        self.controller = Some(controller);
    }

    /// Detach and return the controller.
    pub fn detach(&mut self) -> Option<Box<dyn CongestionNotifier>> {
        self.controller.take()
    }

    /// Whether a controller is attached.
    pub fn is_attached(&self) -> bool {
        self.controller.is_some()
    }

    /// Report an RTT measurement.
    pub fn rtt_measurement(
        &mut self,
        path: PathId,
        rtt_estimate: u64,
        one_way_delay: u64,
        now: u64,
    ) {
        self.forward(CongestionEvent {
            path,
            kind: CongestionEventKind::RttMeasurement,
            rtt_estimate,
            one_way_delay,
            seed_cwin: 0,
            now,
        });
    }

    /// Report a confirmed seed window.
    pub fn seed_cwin(&mut self, path: PathId, cwin: u64, now: u64) {
        self.forward(CongestionEvent {
            path,
            kind: CongestionEventKind::SeedCwin,
            rtt_estimate: 0,
            one_way_delay: 0,
            seed_cwin: cwin,
            now,
        });
    }

    fn forward(&mut self, event: CongestionEvent) {
        if let Some(controller) = self.controller.as_mut() {
            controller.notify(&event);
        }
    }
}
