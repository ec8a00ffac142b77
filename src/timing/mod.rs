//! Per-path RTT and retransmission timing.
//!
//! This module holds the timing engine of a multipath transport:
//!
//! - **Path state**: [`PathTiming`], one per path, addressed by [`PathId`]
//! - **RTT sampling**: [`sample_rtt`] with ack delay correction
//! - **One-way delay**: [`reconcile_phase`] maps peer timestamps onto our clock
//! - **Smoothing**: [`ContinuousSmoothing`] and [`WindowedSmoothing`]
//! - **Retransmission timeout**: [`compute_retransmit_timeout`]
//! - **BDP seeding**: [`BdpSeed`] confirmed by the first primary-path sample
//! - **Congestion bridge**: [`CongestionBridge`] forwarding measurements
//!
//! # Data flow
//!
//! ```text
//! ack ─▶ sample_rtt ─▶ reconcile_phase ─▶ SmoothingStrategy ─▶ ack frequency
//!                                                   │
//!             observer ◀─ quality ◀─ seed ◀─ congestion bridge
//! ```
//!
//! [`Connection::record_rtt_sample`] runs the whole chain for one ack.

mod ack_frequency;
mod config;
mod congestion;
mod connection;
mod metrics;
mod one_way;
mod path;
mod rto;
mod sampler;
mod seed;
mod smoothing;

pub use ack_frequency::{AckFrequency, RttScaledAckFrequency};
pub use config::{SmoothingKind, TimingConfig};
pub use congestion::{CongestionBridge, CongestionEvent, CongestionEventKind};
pub use connection::{Connection, ConnectionPhase, ConnectionTiming, Role, RttUpdate};
pub use metrics::{MetricsLog, MetricsUpdated};
pub use one_way::{OneWayInput, OneWayOutcome, initial_phase_delay, reconcile_phase};
pub use path::{Path, PathId, PathTiming, RttPeriod};
pub use rto::compute_retransmit_timeout;
pub use sampler::{RttSample, sample_rtt};
pub use seed::{BdpSeed, SeedSlot};
pub use smoothing::{
    ContinuousSmoothing, Smoothed, SmoothingInput, SmoothingStrategy, WindowedSmoothing,
};
