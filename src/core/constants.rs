//! Timing constants.
//!
//! All durations are expressed in microseconds of the local monotonic clock.
//! These are defaults only: every value that shapes the retransmission timer
//! is carried by [`TimingConfig`](crate::timing::TimingConfig) and may be
//! overridden per connection.

// =============================================================================
// RTT ESTIMATION
// =============================================================================

/// RTT assumed for a path before its first measurement.
pub const INITIAL_RTT: u64 = 250_000;

/// Retransmit timer of a path before its first measurement.
pub const INITIAL_RETRANSMIT_TIMER: u64 = 1_000_000;

/// Smallest RTT the smoothing engine will apply (timer granularity).
pub const RTT_GRANULARITY: u64 = 1;

/// Variance multiplier for the continuous smoothing strategy.
pub const CONTINUOUS_VARIANCE_FACTOR: u64 = 4;

/// Variance multiplier for the windowed smoothing strategy.
///
/// The windowed variance sample is the widest deviation seen in a whole
/// period, so it already overstates per-packet jitter.
pub const WINDOWED_VARIANCE_FACTOR: u64 = 3;

// =============================================================================
// ACK DELAY
// =============================================================================

/// Floor for the delayed-ack timer.
pub const ACK_DELAY_MIN: u64 = 1_000;

/// Default max_ack_delay transport parameter (25ms).
pub const DEFAULT_MAX_ACK_DELAY: u64 = 25_000;

/// Smallest ack gap the default ack-frequency policy will request.
pub const ACK_GAP_MIN: u64 = 2;

/// Largest ack gap the default ack-frequency policy will request.
pub const ACK_GAP_MAX: u64 = 32;

/// Packet size assumed when converting a receive rate into a packet count.
pub const ACK_GAP_PACKET_SIZE: u64 = 1_200;

// =============================================================================
// RETRANSMISSION TIMEOUT
// =============================================================================

/// Ceiling on the RTO while the handshake is in progress.
pub const INITIAL_MAX_RETRANSMIT_TIMER: u64 = 1_000_000;

/// Ceiling on the RTO of an established connection.
pub const LARGE_RETRANSMIT_TIMER: u64 = 2_000_000;

/// Minimum RTT above which a path is treated as a satellite link.
pub const TARGET_SATELLITE_RTT: u64 = 610_000;

/// Expected upper bound on handshake duration.
pub const HANDSHAKE_MAX: u64 = 30_000_000;

/// Default idle timeout transport parameter, in milliseconds.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Largest backoff shift applied to an established connection (x4).
pub const MAX_BACKOFF_SHIFT: u32 = 2;

// =============================================================================
// BDP SEED
// =============================================================================

/// A seed is accepted when the first sample exceeds the seed RTT by less than
/// `seed_rtt_min / SEED_RTT_TOLERANCE_DIVISOR` (25%).
pub const SEED_RTT_TOLERANCE_DIVISOR: u64 = 4;
