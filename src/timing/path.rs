//! Per-path timing state.
//!
//! A [`Path`] is owned by its connection and carries the raw samples, the
//! smoothed statistics and the windowed-period counters for one network path.

use std::fmt;
use std::net::SocketAddr;

use super::config::TimingConfig;

/// Sentinel for a period that has not seen a sample yet.
const PERIOD_MIN_UNSET: u64 = u64::MAX;

/// Identifier of a path within a connection.
///
/// Path identifiers index the connection's path registry and are never
/// reused. The primary path is the first one created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathId(pub u32);

impl PathId {
    /// The first path created on a connection.
    pub const PRIMARY: PathId = PathId(0);

    /// Whether this is the primary path.
    pub fn is_primary(self) -> bool {
        self == Self::PRIMARY
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path#{}", self.0)
    }
}

/// RTT samples aggregated since the last windowed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttPeriod {
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
    /// Packet number that must be acknowledged to close the period.
    boundary: u64,
    /// When the last period closed.
    last_update: u64,
}

impl Default for RttPeriod {
    fn default() -> Self {
        Self::new()
    }
}

impl RttPeriod {
    /// Create an empty period.
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: PERIOD_MIN_UNSET,
            max: 0,
            boundary: 0,
            last_update: 0,
        }
    }

    pub(crate) fn push(&mut self, sample: u64) {
        self.count += 1;
        self.sum = self.sum.saturating_add(sample);
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
    }

    pub(crate) fn reset(&mut self, boundary: u64, now: u64) {
        self.count = 0;
        self.sum = 0;
        self.min = PERIOD_MIN_UNSET;
        self.max = 0;
        self.boundary = boundary;
        self.last_update = now;
    }

    /// Number of samples in the period.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Average of the samples in the period.
    pub fn average(&self) -> Option<u64> {
        (self.count > 0).then(|| self.sum / self.count)
    }

    /// Smallest sample in the period.
    pub fn min(&self) -> Option<u64> {
        (self.min != PERIOD_MIN_UNSET).then_some(self.min)
    }

    /// Largest sample in the period.
    pub fn max(&self) -> Option<u64> {
        (self.count > 0).then_some(self.max)
    }

    /// Packet number that closes the period once acknowledged.
    pub fn boundary(&self) -> u64 {
        self.boundary
    }

    /// When the previous period closed.
    pub fn last_update(&self) -> u64 {
        self.last_update
    }
}

/// Timing statistics of one path.
///
/// All values are microseconds. This is a plain value: the smoothing
/// strategies take it by value and hand back the updated copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTiming {
    rtt_sample: u64,
    smoothed_rtt: u64,
    rtt_variance: u64,
    rtt_min: u64,
    rtt_max: u64,
    retransmit_timer: u64,
    nb_retransmit: u32,
    one_way_delay_sample: u64,
    nb_delay_outliers: u64,
    nb_samples: u64,
    smoothing_initialized: bool,
    period: RttPeriod,
    last_sent_packet: u64,
    last_acked_packet: u64,
}

impl PathTiming {
    /// Create timing state seeded with an initial RTT guess.
    pub fn new(initial_rtt: u64, initial_retransmit_timer: u64) -> Self {
        Self {
            rtt_sample: 0,
            smoothed_rtt: initial_rtt,
            rtt_variance: 0,
            rtt_min: 0,
            rtt_max: 0,
            retransmit_timer: initial_retransmit_timer,
            nb_retransmit: 0,
            one_way_delay_sample: 0,
            nb_delay_outliers: 0,
            nb_samples: 0,
            smoothing_initialized: false,
            period: RttPeriod::new(),
            last_sent_packet: 0,
            last_acked_packet: 0,
        }
    }

    /// Create timing state from connection configuration.
    pub fn from_config(config: &TimingConfig) -> Self {
        Self::new(config.initial_rtt, config.initial_retransmit_timer)
    }

    /// Latest raw RTT sample.
    pub fn rtt_sample(&self) -> u64 {
        self.rtt_sample
    }

    /// Smoothed RTT.
    pub fn smoothed_rtt(&self) -> u64 {
        self.smoothed_rtt
    }

    /// RTT variance.
    pub fn rtt_variance(&self) -> u64 {
        self.rtt_variance
    }

    /// Smallest RTT observed (0 before the first sample).
    pub fn rtt_min(&self) -> u64 {
        self.rtt_min
    }

    /// Largest RTT observed (0 before the first sample).
    pub fn rtt_max(&self) -> u64 {
        self.rtt_max
    }

    /// Base retransmit timer, before backoff and ceilings.
    pub fn retransmit_timer(&self) -> u64 {
        self.retransmit_timer
    }

    /// Consecutive retransmission timeouts since the last acknowledgment.
    pub fn nb_retransmit(&self) -> u32 {
        self.nb_retransmit
    }

    /// Latest accepted one-way delay.
    pub fn one_way_delay_sample(&self) -> u64 {
        self.one_way_delay_sample
    }

    /// One-way samples discarded as implausible.
    pub fn nb_delay_outliers(&self) -> u64 {
        self.nb_delay_outliers
    }

    /// Number of RTT samples observed on this path.
    pub fn nb_samples(&self) -> u64 {
        self.nb_samples
    }

    /// Whether at least one RTT sample was observed.
    pub fn has_sample(&self) -> bool {
        self.nb_samples > 0
    }

    /// Whether the smoothed statistics have been initialized from samples.
    pub fn is_smoothing_initialized(&self) -> bool {
        self.smoothing_initialized
    }

    /// Current windowed-aggregation period.
    pub fn period(&self) -> &RttPeriod {
        &self.period
    }

    /// Highest packet number sent on this path.
    pub fn last_sent_packet(&self) -> u64 {
        self.last_sent_packet
    }

    /// Highest packet number acknowledged on this path.
    pub fn last_acked_packet(&self) -> u64 {
        self.last_acked_packet
    }

    /// Record that a packet was sent.
    pub fn on_packet_sent(&mut self, packet_number: u64) {
        self.last_sent_packet = self.last_sent_packet.max(packet_number);
    }

    /// Record that a packet was acknowledged. Ends any backoff episode.
    pub fn on_packet_acked(&mut self, packet_number: u64) {
        self.last_acked_packet = self.last_acked_packet.max(packet_number);
        self.nb_retransmit = 0;
    }

    /// Record a retransmission timeout.
    pub fn on_retransmit_timeout(&mut self) {
        self.nb_retransmit = self.nb_retransmit.saturating_add(1);
    }

    /// Store a sample and widen the min/max envelope around it.
    ///
    /// Must run before the smoothing strategy sees the sample.
    pub fn observe(&mut self, sample: u64) {
        self.rtt_sample = sample;
        self.nb_samples += 1;
        if self.nb_samples == 1 {
            self.rtt_min = sample;
            self.rtt_max = sample;
        } else {
            self.rtt_min = self.rtt_min.min(sample);
            self.rtt_max = self.rtt_max.max(sample);
        }
    }

    pub(crate) fn initialize_smoothing(&mut self, rtt: u64) {
        self.smoothed_rtt = rtt;
        self.rtt_variance = rtt / 2;
        self.smoothing_initialized = true;
    }

    /// Fold one (rtt, deviation) pair into the moving averages.
    pub(crate) fn apply_ewma(&mut self, rtt: u64, variance_sample: u64) {
        let variance = (3 * self.rtt_variance as u128 + variance_sample as u128) / 4;
        let smoothed = (7 * self.smoothed_rtt as u128 + rtt as u128) / 8;
        self.rtt_variance = variance as u64;
        self.smoothed_rtt = smoothed as u64;
    }

    pub(crate) fn set_retransmit_timer(&mut self, timer: u64) {
        self.retransmit_timer = timer;
    }

    pub(crate) fn period_mut(&mut self) -> &mut RttPeriod {
        &mut self.period
    }

    pub(crate) fn set_one_way_delay(&mut self, delay: u64) {
        self.one_way_delay_sample = delay;
    }

    pub(crate) fn record_delay_outlier(&mut self) {
        self.nb_delay_outliers += 1;
    }
}

/// A network path as seen by the timing engine.
#[derive(Debug, Clone)]
pub struct Path {
    id: PathId,
    peer_addr: SocketAddr,
    receive_rate_max: u64,
    /// Timing statistics.
    pub timing: PathTiming,
}

impl Path {
    /// Create a path towards `peer_addr`.
    pub fn new(id: PathId, peer_addr: SocketAddr, config: &TimingConfig) -> Self {
        Self {
            id,
            peer_addr,
            receive_rate_max: 0,
            timing: PathTiming::from_config(config),
        }
    }

    /// Path identifier.
    pub fn id(&self) -> PathId {
        self.id
    }

    /// Current peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Record a peer address change (migration or NAT rebinding).
    pub fn set_peer_addr(&mut self, addr: SocketAddr) {
        self.peer_addr = addr;
    }

    /// Highest receive rate observed on the path, in bytes per second.
    pub fn receive_rate_max(&self) -> u64 {
        self.receive_rate_max
    }

    /// Update the highest receive rate.
    pub fn set_receive_rate_max(&mut self, rate: u64) {
        self.receive_rate_max = rate;
    }
}
