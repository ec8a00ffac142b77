//! Connection-level timing state and the per-acknowledgment update.
//!
//! A [`Connection`] owns its paths and the [`ConnectionTiming`] context shared
//! by all of them. Paths are addressed by [`PathId`]; a path never holds a
//! reference back to its connection.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::core::{
    AckFrequencyPolicy, CongestionNotifier, PathQualityObserver, TimingObserver, TimingResult,
    constants::RTT_GRANULARITY,
};

use super::ack_frequency::{AckFrequency, RttScaledAckFrequency};
use super::config::TimingConfig;
use super::congestion::CongestionBridge;
use super::metrics::MetricsUpdated;
use super::one_way::{OneWayInput, OneWayOutcome, initial_phase_delay, reconcile_phase};
use super::path::{Path, PathId, PathTiming};
use super::rto::compute_retransmit_timeout;
use super::sampler::sample_rtt;
use super::seed::{BdpSeed, SeedSlot};
use super::smoothing::{SmoothingInput, SmoothingStrategy};

/// Which end of the connection we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// We opened the connection.
    Client,
    /// We accepted the connection.
    Server,
}

/// Connection lifecycle phase, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionPhase {
    /// Handshake in progress.
    Handshaking,
    /// Handshake complete, not yet confirmed by the peer.
    HandshakeComplete,
    /// Handshake confirmed, data transfer active.
    Established,
    /// Connection closing.
    Closing,
    /// Connection closed.
    Closed,
}

impl ConnectionPhase {
    /// Whether the handshake has completed.
    pub fn is_handshake_complete(self) -> bool {
        self >= ConnectionPhase::HandshakeComplete
    }

    /// Whether ack delays reported by the peer can be trusted.
    pub fn trusts_ack_delay(self) -> bool {
        self >= ConnectionPhase::Established
    }
}

/// Timing context shared by all paths of a connection.
#[derive(Debug)]
pub struct ConnectionTiming {
    role: Role,
    phase: ConnectionPhase,
    start_time: u64,
    phase_delay: Option<i64>,
    seed: SeedSlot,
    config: TimingConfig,
    ack_frequency_negotiated: bool,
    ack_frequency_updated: bool,
    ack_frequency: AckFrequency,
}

impl ConnectionTiming {
    /// Create the context for a connection started at `start_time`.
    pub fn new(role: Role, start_time: u64, config: TimingConfig) -> Self {
        let ack_frequency = AckFrequency::initial(config.local_max_ack_delay);
        Self {
            role,
            phase: ConnectionPhase::Handshaking,
            start_time,
            phase_delay: None,
            seed: SeedSlot::default(),
            config,
            ack_frequency_negotiated: false,
            ack_frequency_updated: false,
            ack_frequency,
        }
    }

    /// Our role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Connection start time.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Clock offset to the peer, once estimated.
    pub fn phase_delay(&self) -> Option<i64> {
        self.phase_delay
    }

    /// Timing configuration.
    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// BDP seed slot.
    pub fn seed(&self) -> &SeedSlot {
        &self.seed
    }

    /// Delayed-ack parameters to request from the peer.
    pub fn ack_frequency(&self) -> AckFrequency {
        self.ack_frequency
    }

    /// Whether an ACK_FREQUENCY update should be sent to the peer.
    pub fn is_ack_frequency_updated(&self) -> bool {
        self.ack_frequency_updated
    }

    /// Clear the pending ACK_FREQUENCY update once it has been sent.
    pub fn clear_ack_frequency_updated(&mut self) {
        self.ack_frequency_updated = false;
    }

    /// Whether the peer negotiated the ack-frequency extension.
    pub fn is_ack_frequency_negotiated(&self) -> bool {
        self.ack_frequency_negotiated
    }

    /// Record whether the peer negotiated the ack-frequency extension.
    pub fn set_ack_frequency_negotiated(&mut self, negotiated: bool) {
        self.ack_frequency_negotiated = negotiated;
    }

    /// Move to a new phase.
    pub fn set_phase(&mut self, phase: ConnectionPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "connection phase change");
        self.phase = phase;
    }

    /// Set the peer's max_ack_delay once transport parameters are known.
    pub fn set_remote_max_ack_delay(&mut self, delay: u64) {
        self.config.remote_max_ack_delay = delay;
    }

    /// Set the peer's idle timeout, in milliseconds.
    pub fn set_idle_timeout_ms(&mut self, idle_timeout_ms: u64) {
        self.config.idle_timeout_ms = idle_timeout_ms;
    }

    /// Enable or disable one-way timestamps.
    pub fn set_time_stamps(&mut self, enabled: bool) {
        self.config.time_stamps = enabled;
    }

    fn reconcile_one_way(&mut self, timing: &mut PathTiming, input: OneWayInput) -> OneWayOutcome {
        let role = self.role;
        let phase = *self
            .phase_delay
            .get_or_insert_with(|| initial_phase_delay(timing.rtt_sample(), role));

        let outcome = reconcile_phase(phase, &input);
        match outcome {
            OneWayOutcome::Accepted {
                one_way_delay,
                phase_delay,
                adjusted,
            } => {
                if adjusted {
                    tracing::debug!(from = phase, to = phase_delay, "phase delay adjusted");
                }
                self.phase_delay = Some(phase_delay);
                timing.set_one_way_delay(one_way_delay);
            }
            OneWayOutcome::Outlier => {
                timing.record_delay_outlier();
                tracing::debug!(
                    send_time = input.send_time,
                    current_time = input.current_time,
                    remote_timestamp = input.remote_timestamp,
                    outliers = timing.nb_delay_outliers(),
                    "one-way delay sample discarded"
                );
            }
        }
        outcome
    }

    fn refresh_ack_frequency(&mut self, policy: &dyn AckFrequencyPolicy, path: &Path) {
        self.ack_frequency_updated = self.ack_frequency_negotiated;
        if !self.ack_frequency_negotiated || self.phase != ConnectionPhase::Established {
            self.ack_frequency = policy.compute(
                path.timing.rtt_min(),
                self.config.ack_delay_min,
                path.receive_rate_max(),
            );
        }
    }
}

/// What one call to [`Connection::record_rtt_sample`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttUpdate {
    /// Path updated.
    pub path: PathId,
    /// Sample applied to the statistics.
    pub rtt_sample: u64,
    /// Estimate reported to congestion control.
    pub rtt_estimate: u64,
    /// Whether smoothed RTT and variance changed.
    pub statistics_updated: bool,
    /// One-way reconciliation result, when the ack carried a timestamp.
    pub one_way: Option<OneWayOutcome>,
    /// Whether the BDP seed was confirmed by this sample.
    pub seed_applied: bool,
    /// Retransmission timeout after the update.
    pub retransmit_timeout: u64,
}

/// A connection's paths and timing collaborators.
pub struct Connection {
    timing: ConnectionTiming,
    paths: Vec<Option<Path>>,
    strategy: Box<dyn SmoothingStrategy>,
    congestion: CongestionBridge,
    ack_policy: Box<dyn AckFrequencyPolicy>,
    quality: Option<Box<dyn PathQualityObserver>>,
    observer: Option<Box<dyn TimingObserver>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("timing", &self.timing)
            .field("paths", &self.paths)
            .field("strategy", &self.strategy)
            .field("congestion", &self.congestion)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a connection using the strategy named in `config`.
    pub fn new(role: Role, start_time: u64, config: TimingConfig) -> Self {
        let strategy = config.smoothing.strategy();
        let ack_policy = Box::new(RttScaledAckFrequency::new(config.local_max_ack_delay));
        Self {
            timing: ConnectionTiming::new(role, start_time, config),
            paths: Vec::new(),
            strategy,
            congestion: CongestionBridge::default(),
            ack_policy,
            quality: None,
            observer: None,
        }
    }

    /// Validate `config` and create a connection.
    pub fn with_config(role: Role, start_time: u64, config: TimingConfig) -> TimingResult<Self> {
        config.validate()?;
        Ok(Self::new(role, start_time, config))
    }

    /// Replace the smoothing strategy.
    ///
    /// Ignored once any path has recorded a sample, so one run never mixes
    /// strategies.
    pub fn with_strategy(mut self, strategy: Box<dyn SmoothingStrategy>) -> Self {
        if self.has_samples() {
            tracing::warn!(
                current = self.strategy.name(),
                requested = strategy.name(),
                "smoothing strategy change after first sample ignored"
            );
            return self;
        }
        self.strategy = strategy;
        self
    }

    /// Attach a congestion controller.
    pub fn with_congestion_notifier(mut self, controller: Box<dyn CongestionNotifier>) -> Self {
        self.congestion.attach(controller);
        self
    }

    /// Replace the ack-frequency policy.
    pub fn with_ack_frequency_policy(mut self, policy: Box<dyn AckFrequencyPolicy>) -> Self {
        self.ack_policy = policy;
        self
    }

    /// Attach a path-quality observer.
    pub fn with_quality_observer(mut self, observer: Box<dyn PathQualityObserver>) -> Self {
        self.quality = Some(observer);
        self
    }

    /// Attach a timing observer.
    pub fn with_observer(mut self, observer: Box<dyn TimingObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Shared timing context.
    pub fn timing(&self) -> &ConnectionTiming {
        &self.timing
    }

    /// Mutable timing context.
    pub fn timing_mut(&mut self) -> &mut ConnectionTiming {
        &mut self.timing
    }

    /// Congestion bridge.
    pub fn congestion_mut(&mut self) -> &mut CongestionBridge {
        &mut self.congestion
    }

    /// Name of the smoothing strategy in use.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Create a path towards `peer_addr`. The first path is the primary one.
    pub fn add_path(&mut self, peer_addr: SocketAddr) -> PathId {
        let id = PathId(self.paths.len() as u32);
        self.paths
            .push(Some(Path::new(id, peer_addr, &self.timing.config)));
        tracing::debug!(path = %id, %peer_addr, "path created");
        id
    }

    /// Remove a path. Later updates for it are ignored.
    pub fn remove_path(&mut self, id: PathId) -> Option<Path> {
        let removed = self.paths.get_mut(id.index()).and_then(Option::take);
        if removed.is_some() {
            tracing::debug!(path = %id, "path removed");
        }
        removed
    }

    /// Look up a path.
    pub fn path(&self, id: PathId) -> Option<&Path> {
        self.paths.get(id.index()).and_then(Option::as_ref)
    }

    /// Look up a path mutably.
    pub fn path_mut(&mut self, id: PathId) -> Option<&mut Path> {
        self.paths.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Whether any live path has recorded an RTT sample.
    pub fn has_samples(&self) -> bool {
        self.paths().any(|path| path.timing.has_sample())
    }

    /// Live paths, in creation order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().flatten()
    }

    /// Record that a packet was sent on `id`.
    pub fn on_packet_sent(&mut self, id: PathId, packet_number: u64) {
        if let Some(path) = self.path_mut(id) {
            path.timing.on_packet_sent(packet_number);
        }
    }

    /// Record that a packet sent on `id` was acknowledged.
    pub fn on_packet_acked(&mut self, id: PathId, packet_number: u64) {
        if let Some(path) = self.path_mut(id) {
            path.timing.on_packet_acked(packet_number);
        }
    }

    /// Record a retransmission timeout on `id`.
    pub fn on_retransmit_timeout(&mut self, id: PathId) {
        if let Some(path) = self.path_mut(id) {
            path.timing.on_retransmit_timeout();
            tracing::debug!(
                path = %id,
                nb_retransmit = path.timing.nb_retransmit(),
                "retransmission timeout"
            );
        }
    }

    /// Current retransmission timeout of a path.
    pub fn retransmit_timeout(&self, id: PathId) -> Option<u64> {
        self.path(id).map(|path| {
            compute_retransmit_timeout(self.timing.phase, &path.timing, &self.timing.config)
        })
    }

    /// Install a BDP seed. Only allowed before any path has recorded a sample.
    pub fn apply_bdp_seed(
        &mut self,
        seed_rtt_min: u64,
        seed_cwin: u64,
        seed_peer_ip: IpAddr,
    ) -> TimingResult<()> {
        let seed = BdpSeed::new(seed_rtt_min, seed_cwin, seed_peer_ip)?;
        self.timing.seed.install(seed, self.has_samples())?;
        tracing::debug!(
            rtt_min = seed_rtt_min,
            cwin = seed_cwin,
            "BDP seed installed"
        );
        Ok(())
    }

    /// Fold an acknowledgment into the path's timing.
    ///
    /// Runs the sampler, one-way reconciliation (when `remote_timestamp` is a
    /// non-zero peer stamp), the smoothing strategy, the ack-frequency refresh,
    /// congestion notification, seed validation and the observer hooks, in
    /// that order. Returns `None` if the path no longer exists.
    pub fn record_rtt_sample(
        &mut self,
        id: PathId,
        send_time: u64,
        current_time: u64,
        ack_delay: u64,
        remote_timestamp: Option<u64>,
    ) -> Option<RttUpdate> {
        let Some(path) = self.paths.get_mut(id.index()).and_then(Option::as_mut) else {
            tracing::trace!(path = %id, "RTT sample for removed path ignored");
            return None;
        };
        let ctx = &mut self.timing;

        let bound = ctx
            .phase
            .trusts_ack_delay()
            .then_some(ctx.config.local_max_ack_delay);
        let rtt_min = path.timing.rtt_min();
        let raw = sample_rtt(send_time, current_time, ack_delay, rtt_min, bound);

        let mut timing = path.timing;
        timing.observe(raw.rtt.max(RTT_GRANULARITY));

        let mut one_way = None;
        if let Some(stamp) = remote_timestamp.filter(|stamp| *stamp != 0) {
            let input = OneWayInput {
                send_time,
                current_time,
                ack_delay: raw.ack_delay,
                remote_timestamp: stamp,
                start_time: ctx.start_time,
            };
            one_way = Some(ctx.reconcile_one_way(&mut timing, input));
        }

        let smoothed = self.strategy.update(
            timing,
            SmoothingInput {
                sample: timing.rtt_sample(),
                now: current_time,
                remote_max_ack_delay: ctx.config.remote_max_ack_delay,
            },
        );
        path.timing = smoothed.timing;

        if smoothed.statistics_updated && id.is_primary() {
            ctx.refresh_ack_frequency(self.ack_policy.as_ref(), path);
        }

        let one_way_delay = if ctx.config.time_stamps {
            path.timing.one_way_delay_sample()
        } else {
            0
        };
        self.congestion
            .rtt_measurement(id, smoothed.rtt_estimate, one_way_delay, current_time);

        let mut seed_applied = false;
        let rtt_sample = path.timing.rtt_sample();
        let peer_ip = path.peer_addr().ip();
        if path.timing.nb_samples() == 1
            && let Some(cwin) = ctx.seed.validate(id.is_primary(), rtt_sample, peer_ip)
        {
            seed_applied = true;
            tracing::debug!(path = %id, cwin, rtt = rtt_sample, "BDP seed confirmed");
            self.congestion.seed_cwin(id, cwin, current_time);
        }

        if let Some(quality) = self.quality.as_mut() {
            quality.on_path_quality_changed(ctx, path);
        }

        let retransmit_timeout = compute_retransmit_timeout(ctx.phase, &path.timing, &ctx.config);

        tracing::trace!(
            path = %id,
            strategy = self.strategy.name(),
            rtt = path.timing.rtt_sample(),
            smoothed_rtt = path.timing.smoothed_rtt(),
            rtt_variance = path.timing.rtt_variance(),
            rto = retransmit_timeout,
            "RTT sample applied"
        );

        if let Some(observer) = self.observer.as_mut() {
            let time = current_time.saturating_sub(ctx.start_time);
            let update = MetricsUpdated::new(time, id, &path.timing, retransmit_timeout);
            observer.on_timing_update(&update);
        }

        Some(RttUpdate {
            path: id,
            rtt_sample: path.timing.rtt_sample(),
            rtt_estimate: smoothed.rtt_estimate,
            statistics_updated: smoothed.statistics_updated,
            one_way,
            seed_applied,
            retransmit_timeout,
        })
    }
}
