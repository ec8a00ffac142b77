//! Bandwidth-delay-product seeding.
//!
//! A client resuming a connection may remember the congestion window and
//! minimum RTT it reached last time. The hint is only trusted if the first RTT
//! measured on the primary path confirms it and the peer address is the same.

use std::net::IpAddr;

use crate::core::{SeedError, constants::SEED_RTT_TOLERANCE_DIVISOR};

/// A remembered BDP hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BdpSeed {
    rtt_min: u64,
    cwin: u64,
    peer_ip: IpAddr,
}

impl BdpSeed {
    /// Create a seed. Zero windows and zero RTTs are rejected.
    pub fn new(rtt_min: u64, cwin: u64, peer_ip: IpAddr) -> Result<Self, SeedError> {
        if cwin == 0 {
            return Err(SeedError::Invalid("zero congestion window"));
        }
        if rtt_min == 0 {
            return Err(SeedError::Invalid("zero RTT"));
        }
        Ok(Self {
            rtt_min,
            cwin,
            peer_ip,
        })
    }

    /// Minimum RTT recorded with the seed.
    pub fn rtt_min(&self) -> u64 {
        self.rtt_min
    }

    /// Congestion window recorded with the seed.
    pub fn cwin(&self) -> u64 {
        self.cwin
    }

    /// Peer address recorded with the seed.
    pub fn peer_ip(&self) -> IpAddr {
        self.peer_ip
    }

    /// Whether a first RTT sample towards `peer_ip` confirms this seed.
    ///
    /// The sample must be at least the seed RTT and less than 25% above it.
    pub fn confirmed_by(&self, rtt_sample: u64, peer_ip: IpAddr) -> bool {
        self.rtt_min <= rtt_sample
            && rtt_sample - self.rtt_min < self.rtt_min / SEED_RTT_TOLERANCE_DIVISOR
            && same_address(self.peer_ip, peer_ip)
    }
}

/// Byte-wise address comparison; an IPv4 address never matches its
/// IPv4-mapped IPv6 form.
fn same_address(a: IpAddr, b: IpAddr) -> bool {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => a.octets() == b.octets(),
        (IpAddr::V6(a), IpAddr::V6(b)) => a.octets() == b.octets(),
        _ => false,
    }
}

/// Write-once seed slot held by the connection.
#[derive(Debug, Clone, Default)]
pub struct SeedSlot {
    seed: Option<BdpSeed>,
    cwin_notified: bool,
}

impl SeedSlot {
    /// Install a seed. Fails if one is present or sampling already started.
    pub fn install(&mut self, seed: BdpSeed, sampling_started: bool) -> Result<(), SeedError> {
        if self.seed.is_some() {
            return Err(SeedError::AlreadySeeded);
        }
        if sampling_started {
            return Err(SeedError::SampleAlreadyRecorded);
        }
        self.seed = Some(seed);
        Ok(())
    }

    /// Installed seed, if any.
    pub fn seed(&self) -> Option<&BdpSeed> {
        self.seed.as_ref()
    }

    /// Whether the seed window was already handed to congestion control.
    pub fn is_consumed(&self) -> bool {
        self.cwin_notified
    }

    /// Consume the seed if `rtt_sample` on the primary path confirms it.
    ///
    /// Returns the window to notify, at most once per connection.
    pub fn validate(&mut self, is_primary: bool, rtt_sample: u64, peer_ip: IpAddr) -> Option<u64> {
        if !is_primary || self.cwin_notified {
            return None;
        }
        let seed = self.seed?;
        if !seed.confirmed_by(rtt_sample, peer_ip) {
            return None;
        }
        self.cwin_notified = true;
        Some(seed.cwin)
    }
}
