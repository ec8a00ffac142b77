//! Raw RTT sampling.
//!
//! Turns a send/acknowledge timestamp pair into an RTT sample, discounting
//! the acknowledgment delay reported by the peer when it can be trusted.

/// A raw RTT sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttSample {
    /// Round-trip time, after ack delay correction.
    pub rtt: u64,
    /// Ack delay as used for the sample (clamped when trusted).
    pub ack_delay: u64,
}

/// Compute an RTT sample.
///
/// `ack_delay_bound` is `Some(max_ack_delay)` once the handshake is confirmed
/// and the peer's ack delay can be trusted, `None` before that.
///
/// - A `current_time` at or before `send_time` yields a zero sample.
/// - The ack delay is clamped to the bound and subtracted only if the result
///   stays above `rtt_min`.
pub fn sample_rtt(
    send_time: u64,
    current_time: u64,
    ack_delay: u64,
    rtt_min: u64,
    ack_delay_bound: Option<u64>,
) -> RttSample {
    if current_time <= send_time {
        return RttSample { rtt: 0, ack_delay };
    }

    let mut rtt = current_time - send_time;
    let mut ack_delay = ack_delay;

    if let Some(bound) = ack_delay_bound
        && ack_delay > 0
    {
        ack_delay = ack_delay.min(bound);
        if rtt_min.saturating_add(ack_delay) < rtt {
            rtt -= ack_delay;
        }
    }

    RttSample { rtt, ack_delay }
}
