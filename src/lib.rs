//! # pathtime
//!
//! RTT and retransmission timeout estimation for multipath transports.
//!
//! Every path of a connection keeps its own timing state, fed by
//! acknowledgments. From each ack the crate derives:
//!
//! - **RTT samples**: corrected for the peer's ack delay once it is trusted
//! - **Smoothed statistics**: continuous (per ack) or windowed (per period)
//! - **One-way delay**: from peer timestamps, without clock synchronization
//! - **Retransmission timeout**: with exponential backoff and phase ceilings
//! - **BDP seeding**: a remembered congestion window, confirmed by the first RTT
//!
//! ## Feature Flags
//!
//! - `serde` (default): config deserialization and qlog export of metrics
//!
//! ## Modules
//!
//! - [`core`]: Constants, error types and collaborator traits
//! - [`timing`]: Path state, estimators and the per-connection driver
//!
//! ## Example Usage
//!
//! ```rust
//! use pathtime::prelude::*;
//!
//! let config = TimingConfig::default().with_smoothing(SmoothingKind::Continuous);
//! let mut conn = Connection::new(Role::Client, 0, config);
//! let path = conn.add_path("192.0.2.1:4433".parse().unwrap());
//!
//! conn.on_packet_sent(path, 1);
//! let update = conn.record_rtt_sample(path, 0, 100_000, 0, None).unwrap();
//!
//! assert_eq!(update.rtt_estimate, 100_000);
//! assert_eq!(conn.path(path).unwrap().timing.rtt_variance(), 50_000);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod timing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;
    pub use crate::timing::*;
}

// Re-export commonly used items at crate root
pub use core::{ConfigError, SeedError, TimingError, TimingResult};
pub use timing::{
    Connection, ConnectionPhase, Path, PathId, PathTiming, Role, RttUpdate, TimingConfig,
    compute_retransmit_timeout,
};
