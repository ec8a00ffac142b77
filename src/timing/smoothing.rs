//! RTT smoothing strategies.
//!
//! Both strategies fold samples into the same exponentially weighted moving
//! averages (`srtt = 7/8 srtt + 1/8 rtt`, `rttvar = 3/4 rttvar + 1/4 dev`).
//! They differ in how often they do it:
//!
//! - [`ContinuousSmoothing`] updates on every sample.
//! - [`WindowedSmoothing`] aggregates samples into periods and updates a few
//!   times per round trip, which keeps multipath acknowledgment bursts from
//!   dominating the averages.
//!
//! Strategies are pure: they take a [`PathTiming`] by value and return the
//! updated copy. The sample must already have been recorded with
//! [`PathTiming::observe`].

use std::fmt;

use crate::core::constants;

use super::path::PathTiming;

/// Inputs to one smoothing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothingInput {
    /// RTT sample, as recorded with [`PathTiming::observe`].
    pub sample: u64,
    /// Current time.
    pub now: u64,
    /// Peer's max_ack_delay.
    pub remote_max_ack_delay: u64,
}

/// Output of one smoothing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smoothed {
    /// Updated timing state.
    pub timing: PathTiming,
    /// RTT value to report to congestion control.
    pub rtt_estimate: u64,
    /// Whether smoothed RTT and variance changed.
    pub statistics_updated: bool,
}

/// A smoothing strategy, chosen once per connection.
pub trait SmoothingStrategy: fmt::Debug + Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Fold one sample into the path statistics.
    fn update(&self, timing: PathTiming, input: SmoothingInput) -> Smoothed;
}

/// Classic per-sample RTT estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuousSmoothing;

impl SmoothingStrategy for ContinuousSmoothing {
    fn name(&self) -> &'static str {
        "continuous"
    }

    fn update(&self, mut timing: PathTiming, input: SmoothingInput) -> Smoothed {
        let sample = input.sample;

        if timing.is_smoothing_initialized() {
            let deviation = timing.smoothed_rtt().abs_diff(sample);
            timing.apply_ewma(sample, deviation);
        } else {
            timing.initialize_smoothing(sample);
        }

        timing.set_retransmit_timer(retransmit_timer(
            &timing,
            constants::CONTINUOUS_VARIANCE_FACTOR,
            input.remote_max_ack_delay,
        ));

        Smoothed {
            timing,
            rtt_estimate: sample,
            statistics_updated: true,
        }
    }
}

/// Periodic windowed RTT estimator.
///
/// A period closes when either condition holds, whichever comes first:
/// - the highest acknowledged packet reaches the highest packet sent when the
///   previous period closed (one round trip of packets), or
/// - a quarter of the current sample has elapsed since the previous closure.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowedSmoothing;

impl WindowedSmoothing {
    fn period_closes(timing: &PathTiming, input: &SmoothingInput) -> bool {
        let period = timing.period();
        timing.last_acked_packet() >= period.boundary()
            || input.now >= period.last_update().saturating_add(input.sample / 4)
    }
}

impl SmoothingStrategy for WindowedSmoothing {
    fn name(&self) -> &'static str {
        "windowed"
    }

    fn update(&self, mut timing: PathTiming, input: SmoothingInput) -> Smoothed {
        let sample = input.sample;

        timing.period_mut().push(sample);
        if timing.retransmit_timer() < sample {
            timing.set_retransmit_timer(sample);
        }

        if !Self::period_closes(&timing, &input) {
            return Smoothed {
                timing,
                rtt_estimate: sample,
                statistics_updated: false,
            };
        }

        let period = *timing.period();
        let rtt = period.average().unwrap_or(sample);

        if timing.is_smoothing_initialized() {
            let deviation = period_deviation(
                timing.smoothed_rtt(),
                period.min().unwrap_or(sample),
                period.max().unwrap_or(sample),
            );
            timing.apply_ewma(rtt, deviation);
            timing.set_retransmit_timer(retransmit_timer(
                &timing,
                constants::WINDOWED_VARIANCE_FACTOR,
                input.remote_max_ack_delay,
            ));
        } else {
            // First closure keeps the raised initial timer until a variance is seen
            timing.initialize_smoothing(rtt);
        }

        tracing::debug!(
            samples = period.count(),
            average = rtt,
            smoothed_rtt = timing.smoothed_rtt(),
            rtt_variance = timing.rtt_variance(),
            "RTT period closed"
        );

        let boundary = timing.last_sent_packet();
        timing.period_mut().reset(boundary, input.now);

        Smoothed {
            timing,
            rtt_estimate: rtt,
            statistics_updated: true,
        }
    }
}

/// Largest distance from the smoothed RTT to the period's extremes.
fn period_deviation(smoothed: u64, min: u64, max: u64) -> u64 {
    if smoothed > max {
        smoothed - min
    } else if smoothed < min {
        max - smoothed
    } else {
        (smoothed - min).max(max - smoothed)
    }
}

fn retransmit_timer(timing: &PathTiming, variance_factor: u64, max_ack_delay: u64) -> u64 {
    timing
        .smoothed_rtt()
        .saturating_add(timing.rtt_variance().saturating_mul(variance_factor))
        .saturating_add(max_ack_delay)
}
