//! One-way delay estimation without synchronized clocks.
//!
//! The peer stamps its acknowledgments with its own clock (microseconds since
//! its connection start). We map that stamp onto our clock through a phase
//! offset, and nudge the phase only as far as needed to keep the mapped stamp
//! between the packet's send time and the ack's arrival time.

use super::connection::Role;

/// Inputs to one phase reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneWayInput {
    /// When the acknowledged packet was sent (local clock).
    pub send_time: u64,
    /// When the acknowledgment arrived (local clock).
    pub current_time: u64,
    /// Ack delay reported by the peer.
    pub ack_delay: u64,
    /// Peer timestamp carried by the acknowledgment.
    pub remote_timestamp: u64,
    /// Local connection start time.
    pub start_time: u64,
}

/// Result of a phase reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneWayOutcome {
    /// The mapped stamp is plausible.
    Accepted {
        /// Mapped stamp minus send time.
        one_way_delay: u64,
        /// Phase to keep for the next reconciliation.
        phase_delay: i64,
        /// Whether the phase had to move.
        adjusted: bool,
    },
    /// No phase adjustment makes the stamp plausible.
    Outlier,
}

/// First phase estimate: half an RTT, negative on the server side.
///
/// Client and server pick opposite signs so their offsets describe the same
/// clock relationship from both ends.
pub fn initial_phase_delay(rtt_sample: u64, role: Role) -> i64 {
    let half = i64::try_from(rtt_sample / 2).unwrap_or(i64::MAX);
    match role {
        Role::Client => half,
        Role::Server => -half,
    }
}

/// Map the peer timestamp onto the local clock, adjusting `phase_delay` if
/// the mapped value falls outside `[send_time, current_time]`.
pub fn reconcile_phase(phase_delay: i64, input: &OneWayInput) -> OneWayOutcome {
    let send = i128::from(input.send_time);
    let now = i128::from(input.current_time);
    // Remote stamp expressed on the local clock, minus the phase.
    let base = i128::from(input.remote_timestamp) - i128::from(input.ack_delay)
        + i128::from(input.start_time);

    let mut phase = i128::from(phase_delay);
    let mut candidate = base + phase;
    let mut adjusted = false;

    if candidate < send {
        let min_phase = send - base;
        candidate = base + min_phase;
        if candidate > now {
            return OneWayOutcome::Outlier;
        }
        phase = min_phase;
        adjusted = true;
    } else if candidate > now {
        let max_phase = now - base;
        candidate = base + max_phase;
        if candidate < send {
            return OneWayOutcome::Outlier;
        }
        phase = max_phase;
        adjusted = true;
    }

    let (Ok(phase_delay), Ok(one_way_delay)) =
        (i64::try_from(phase), u64::try_from(candidate - send))
    else {
        return OneWayOutcome::Outlier;
    };

    OneWayOutcome::Accepted {
        one_way_delay,
        phase_delay,
        adjusted,
    }
}
