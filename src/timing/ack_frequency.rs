//! Delayed-acknowledgment parameters derived from the path RTT.

use crate::core::{AckFrequencyPolicy, constants};

/// Ack gap and ack delay to request from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AckFrequency {
    /// Ack-eliciting packets to receive before acknowledging.
    pub gap: u64,
    /// Maximum ack delay, in microseconds.
    pub delay: u64,
}

impl AckFrequency {
    /// Parameters used before any RTT is known.
    pub fn initial(max_ack_delay: u64) -> Self {
        Self {
            gap: constants::ACK_GAP_MIN,
            delay: max_ack_delay,
        }
    }
}

/// Default policy: a quarter RTT of delay and a quarter RTT worth of packets.
#[derive(Debug, Clone, Copy)]
pub struct RttScaledAckFrequency {
    max_ack_delay: u64,
}

impl RttScaledAckFrequency {
    /// Policy bounded by our max_ack_delay.
    pub fn new(max_ack_delay: u64) -> Self {
        Self { max_ack_delay }
    }
}

impl AckFrequencyPolicy for RttScaledAckFrequency {
    fn compute(&self, rtt_min: u64, ack_delay_floor: u64, max_receive_rate: u64) -> AckFrequency {
        let ceiling = self.max_ack_delay.max(ack_delay_floor);
        let delay = (rtt_min / 4).clamp(ack_delay_floor, ceiling);

        // Packets arriving in a quarter RTT at the peak receive rate
        let bytes = u128::from(max_receive_rate) * u128::from(rtt_min) / 4 / 1_000_000;
        let packets = u64::try_from(bytes / u128::from(constants::ACK_GAP_PACKET_SIZE))
            .unwrap_or(u64::MAX);
        let gap = packets.clamp(constants::ACK_GAP_MIN, constants::ACK_GAP_MAX);

        AckFrequency { gap, delay }
    }
}
