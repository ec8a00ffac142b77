//! Retransmission timeout computation.

use crate::core::constants::MAX_BACKOFF_SHIFT;

use super::config::TimingConfig;
use super::connection::ConnectionPhase;
use super::path::PathTiming;

/// Current retransmission timeout for a path, in microseconds.
///
/// Starts from the path's retransmit timer with exponential backoff:
///
/// - Before the handshake completes the timer is capped at
///   `initial_max_retransmit_timer`. When the negotiated idle timeout exceeds
///   the handshake ceiling (very slow bootstrap links) the backoff is not
///   capped and the result is bounded by `100 * idle_timeout_ms` instead.
/// - Once established, backoff is capped at x4, and a timer above
///   `large_retransmit_timer` is brought down to that ceiling, or to
///   `1.5 * smoothed_rtt` on satellite-class paths, whichever is smaller.
///
/// This function does not touch any state.
pub fn compute_retransmit_timeout(
    phase: ConnectionPhase,
    timing: &PathTiming,
    config: &TimingConfig,
) -> u64 {
    let base = timing.retransmit_timer();
    let mut rto = backoff(base, timing.nb_retransmit().min(MAX_BACKOFF_SHIFT));

    if !phase.is_handshake_complete() {
        if config.handshake_max / 1000 < config.idle_timeout_ms {
            let ceiling = config.idle_timeout_ms.saturating_mul(100);
            rto = backoff(base, timing.nb_retransmit()).min(ceiling);
        } else {
            rto = rto.min(config.initial_max_retransmit_timer);
        }
    } else if rto > config.large_retransmit_timer {
        let alt_rto = if timing.rtt_min() > config.satellite_rtt_threshold {
            timing.smoothed_rtt().saturating_mul(3) / 2
        } else {
            config.large_retransmit_timer
        };
        rto = rto.min(alt_rto);
    }

    rto
}

/// `timer << shift`, saturating instead of overflowing.
fn backoff(timer: u64, shift: u32) -> u64 {
    match 1u64.checked_shl(shift) {
        Some(factor) => timer.saturating_mul(factor),
        None if timer == 0 => 0,
        None => u64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing_with_timer(timer: u64, nb_retransmit: u32) -> PathTiming {
        let mut timing = PathTiming::new(timer, timer);
        for _ in 0..nb_retransmit {
            timing.on_retransmit_timeout();
        }
        timing
    }

    #[test]
    fn test_backoff_cap_established() {
        let config = TimingConfig::default();
        let expected = [100_000, 200_000, 400_000, 400_000, 400_000];

        for (nb, want) in expected.iter().enumerate() {
            let timing = timing_with_timer(100_000, nb as u32);
            assert_eq!(
                compute_retransmit_timeout(ConnectionPhase::Established, &timing, &config),
                *want,
                "nb_retransmit = {nb}"
            );
        }
    }

    #[test]
    fn test_handshake_ceiling() {
        let config = TimingConfig::default();
        let timing = timing_with_timer(400_000, 2);

        // 1.6s capped to the 1s handshake ceiling
        assert_eq!(
            compute_retransmit_timeout(ConnectionPhase::Handshaking, &timing, &config),
            config.initial_max_retransmit_timer
        );
    }

    #[test]
    fn test_long_idle_timeout_uncapped_backoff() {
        let config = TimingConfig {
            idle_timeout_ms: 120_000,
            ..Default::default()
        };
        let timing = timing_with_timer(500_000, 4);

        // 500ms << 4 = 8s, below the 12s bound
        assert_eq!(
            compute_retransmit_timeout(ConnectionPhase::Handshaking, &timing, &config),
            8_000_000
        );

        let timing = timing_with_timer(500_000, 10);
        assert_eq!(
            compute_retransmit_timeout(ConnectionPhase::Handshaking, &timing, &config),
            12_000_000
        );
    }

    #[test]
    fn test_large_ceiling_established() {
        let config = TimingConfig::default();
        let timing = timing_with_timer(900_000, 2);

        assert_eq!(
            compute_retransmit_timeout(ConnectionPhase::Established, &timing, &config),
            config.large_retransmit_timer
        );
    }

    #[test]
    fn test_satellite_ceiling() {
        let config = TimingConfig::default();
        let mut timing = PathTiming::new(100_000, 3_000_000);
        timing.observe(700_000);
        // observe() moves rtt_min above the satellite threshold while the
        // smoothed RTT keeps its 100ms value
        assert_eq!(timing.smoothed_rtt(), 100_000);

        assert_eq!(
            compute_retransmit_timeout(ConnectionPhase::Established, &timing, &config),
            config.large_retransmit_timer.min(150_000)
        );
    }

    #[test]
    fn test_handshake_complete_uses_established_rules() {
        let config = TimingConfig::default();
        let timing = timing_with_timer(100_000, 3);
        assert_eq!(
            compute_retransmit_timeout(ConnectionPhase::HandshakeComplete, &timing, &config),
            400_000
        );
    }

    #[test]
    fn test_backoff_saturates() {
        assert_eq!(backoff(1, 0), 1);
        assert_eq!(backoff(3, 2), 12);
        assert_eq!(backoff(u64::MAX / 2, 2), u64::MAX);
        assert_eq!(backoff(1_000_000, 200), u64::MAX);
    }

    #[test]
    fn test_pure() {
        let config = TimingConfig::default();
        let timing = timing_with_timer(100_000, 1);
        let before = timing;
        let a = compute_retransmit_timeout(ConnectionPhase::Established, &timing, &config);
        let b = compute_retransmit_timeout(ConnectionPhase::Established, &timing, &config);
        assert_eq!(a, b);
        assert_eq!(timing, before);
    }
}
