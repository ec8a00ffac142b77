//! Timing configuration.

use crate::core::{ConfigError, constants};

use super::smoothing::{ContinuousSmoothing, SmoothingStrategy, WindowedSmoothing};

/// Which smoothing strategy a connection runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SmoothingKind {
    /// Per-sample exponential smoothing.
    Continuous,
    /// Aggregate samples and update a few times per round trip.
    #[default]
    Windowed,
}

impl SmoothingKind {
    /// Build the strategy for this kind.
    pub fn strategy(self) -> Box<dyn SmoothingStrategy> {
        match self {
            SmoothingKind::Continuous => Box::new(ContinuousSmoothing),
            SmoothingKind::Windowed => Box::new(WindowedSmoothing),
        }
    }
}

/// Per-connection timing configuration.
///
/// Durations are microseconds except `idle_timeout_ms`, which keeps the unit
/// of the idle_timeout transport parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimingConfig {
    /// RTT assumed before the first sample.
    pub initial_rtt: u64,
    /// Retransmit timer before the first sample.
    pub initial_retransmit_timer: u64,
    /// Floor for the delayed-ack timer.
    pub ack_delay_min: u64,
    /// RTO ceiling while the handshake is in progress.
    pub initial_max_retransmit_timer: u64,
    /// RTO ceiling on an established connection.
    pub large_retransmit_timer: u64,
    /// Minimum RTT above which a path counts as a satellite link.
    pub satellite_rtt_threshold: u64,
    /// Expected upper bound on handshake duration.
    pub handshake_max: u64,
    /// Our max_ack_delay; bounds the ack delay the peer may claim.
    pub local_max_ack_delay: u64,
    /// Peer's max_ack_delay; added to the retransmit timer.
    pub remote_max_ack_delay: u64,
    /// Negotiated idle timeout, in milliseconds.
    pub idle_timeout_ms: u64,
    /// Smoothing strategy.
    pub smoothing: SmoothingKind,
    /// Whether the peer exchanges one-way timestamps.
    pub time_stamps: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            initial_rtt: constants::INITIAL_RTT,
            initial_retransmit_timer: constants::INITIAL_RETRANSMIT_TIMER,
            ack_delay_min: constants::ACK_DELAY_MIN,
            initial_max_retransmit_timer: constants::INITIAL_MAX_RETRANSMIT_TIMER,
            large_retransmit_timer: constants::LARGE_RETRANSMIT_TIMER,
            satellite_rtt_threshold: constants::TARGET_SATELLITE_RTT,
            handshake_max: constants::HANDSHAKE_MAX,
            local_max_ack_delay: constants::DEFAULT_MAX_ACK_DELAY,
            remote_max_ack_delay: constants::DEFAULT_MAX_ACK_DELAY,
            idle_timeout_ms: constants::DEFAULT_IDLE_TIMEOUT_MS,
            smoothing: SmoothingKind::default(),
            time_stamps: false,
        }
    }
}

impl TimingConfig {
    /// Check that the configuration can drive a retransmission timer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("initial_rtt", self.initial_rtt),
            ("initial_retransmit_timer", self.initial_retransmit_timer),
            (
                "initial_max_retransmit_timer",
                self.initial_max_retransmit_timer,
            ),
            ("large_retransmit_timer", self.large_retransmit_timer),
        ];
        if let Some(&(field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero { field });
        }

        if self.initial_max_retransmit_timer > self.large_retransmit_timer {
            return Err(ConfigError::Inverted {
                lower: "initial_max_retransmit_timer",
                lower_value: self.initial_max_retransmit_timer,
                upper: "large_retransmit_timer",
                upper_value: self.large_retransmit_timer,
            });
        }

        if self.ack_delay_min > self.local_max_ack_delay {
            return Err(ConfigError::Inverted {
                lower: "ack_delay_min",
                lower_value: self.ack_delay_min,
                upper: "local_max_ack_delay",
                upper_value: self.local_max_ack_delay,
            });
        }

        Ok(())
    }

    /// Select the smoothing strategy.
    pub fn with_smoothing(mut self, smoothing: SmoothingKind) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Enable or disable one-way timestamps.
    pub fn with_time_stamps(mut self, enabled: bool) -> Self {
        self.time_stamps = enabled;
        self
    }
}
