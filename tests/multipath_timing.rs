//! End-to-end timing behaviour through the public connection API.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use pathtime::prelude::*;

#[derive(Default, Clone)]
struct Recorder(Arc<Mutex<Vec<CongestionEvent>>>);

impl Recorder {
    fn events(&self) -> Vec<CongestionEvent> {
        self.0.lock().unwrap().clone()
    }

    fn seed_events(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| e.kind == CongestionEventKind::SeedCwin)
            .count()
    }
}

impl CongestionNotifier for Recorder {
    fn notify(&mut self, event: &CongestionEvent) {
        self.0.lock().unwrap().push(*event);
    }
}

fn addr(last: u8) -> SocketAddr {
    SocketAddr::from(([198, 51, 100, last], 443))
}

fn connection(kind: SmoothingKind) -> (Connection, Recorder) {
    let recorder = Recorder::default();
    let config = TimingConfig::default().with_smoothing(kind);
    let conn = Connection::new(Role::Client, 1_000, config)
        .with_congestion_notifier(Box::new(recorder.clone()));
    (conn, recorder)
}

#[test_log::test]
fn test_continuous_reference_values() {
    let (mut conn, _) = connection(SmoothingKind::Continuous);
    let id = conn.add_path(addr(1));

    conn.record_rtt_sample(id, 1_000, 101_000, 0, None);
    let timing = conn.path(id).unwrap().timing;
    assert_eq!(timing.smoothed_rtt(), 100_000);
    assert_eq!(timing.rtt_variance(), 50_000);
    assert_eq!(timing.rtt_min(), 100_000);
    assert_eq!(timing.rtt_max(), 100_000);
    assert_eq!(timing.retransmit_timer(), 325_000);

    conn.record_rtt_sample(id, 200_000, 340_000, 0, None);
    let timing = conn.path(id).unwrap().timing;
    assert_eq!(timing.rtt_variance(), 47_500);
    assert_eq!(timing.smoothed_rtt(), 105_000);
    assert_eq!(timing.rtt_max(), 140_000);
}

#[test_log::test]
fn test_smoothed_within_bounds_for_both_strategies() {
    for kind in [SmoothingKind::Continuous, SmoothingKind::Windowed] {
        let (mut conn, _) = connection(kind);
        let a = conn.add_path(addr(1));
        let b = conn.add_path(addr(2));

        let mut now = 1_000;
        for (i, rtt) in [30_000u64, 90_000, 45_000, 200_000, 12_000, 60_000, 61_000]
            .into_iter()
            .enumerate()
        {
            let pn = i as u64 + 1;
            for id in [a, b] {
                conn.on_packet_sent(id, pn);
                conn.on_packet_acked(id, pn);
                conn.record_rtt_sample(id, now, now + rtt, 0, None);
                let timing = conn.path(id).unwrap().timing;
                assert!(timing.rtt_min() <= timing.smoothed_rtt(), "{kind:?}");
                assert!(timing.smoothed_rtt() <= timing.rtt_max(), "{kind:?}");
            }
            now += rtt + 5_000;
        }
    }
}

#[test_log::test]
fn test_windowed_paths_are_independent() {
    let (mut conn, recorder) = connection(SmoothingKind::Windowed);
    let fast = conn.add_path(addr(1));
    let slow = conn.add_path(addr(2));

    conn.on_packet_sent(fast, 10);
    conn.on_packet_sent(slow, 10);
    let first_fast = conn.record_rtt_sample(fast, 1_000, 21_000, 0, None).unwrap();
    let first_slow = conn.record_rtt_sample(slow, 1_000, 301_000, 0, None).unwrap();
    assert!(first_fast.statistics_updated);
    assert!(first_slow.statistics_updated);

    // Still inside the period on the fast path: same time, packet below boundary
    conn.on_packet_acked(fast, 5);
    let inside = conn.record_rtt_sample(fast, 20_000, 21_000, 0, None).unwrap();
    assert!(!inside.statistics_updated);
    assert_eq!(conn.path(fast).unwrap().timing.smoothed_rtt(), 20_000);
    assert_eq!(conn.path(slow).unwrap().timing.smoothed_rtt(), 300_000);

    // First closure leaves the initial timer in place
    let slow_timing = conn.path(slow).unwrap().timing;
    assert_eq!(slow_timing.retransmit_timer(), 1_000_000);

    let paths: Vec<_> = recorder.events().iter().map(|e| e.path).collect();
    assert_eq!(paths, vec![fast, slow, fast]);
}

#[test_log::test]
fn test_retransmit_timeout_backoff_and_reset() {
    let (mut conn, _) = connection(SmoothingKind::Continuous);
    let id = conn.add_path(addr(1));
    conn.timing_mut().set_phase(ConnectionPhase::Established);
    conn.record_rtt_sample(id, 1_000, 11_000, 0, None);

    let base = conn.retransmit_timeout(id).unwrap();
    let mut timeouts = vec![base];
    for _ in 0..4 {
        conn.on_retransmit_timeout(id);
        timeouts.push(conn.retransmit_timeout(id).unwrap());
    }
    assert_eq!(
        timeouts,
        vec![base, base * 2, base * 4, base * 4, base * 4]
    );

    conn.on_packet_acked(id, 1);
    assert_eq!(conn.retransmit_timeout(id), Some(base));
}

#[test_log::test]
fn test_satellite_path_ceiling() {
    let (mut conn, _) = connection(SmoothingKind::Continuous);
    let id = conn.add_path(addr(1));
    conn.timing_mut().set_phase(ConnectionPhase::Established);
    conn.record_rtt_sample(id, 1_000, 701_000, 0, None);

    for _ in 0..3 {
        conn.on_retransmit_timeout(id);
    }
    // 1.5 * 700_000 is below the large ceiling
    assert_eq!(conn.retransmit_timeout(id), Some(1_050_000));
}

#[test_log::test]
fn test_seed_fires_once_across_paths() {
    let (mut conn, recorder) = connection(SmoothingKind::Continuous);
    let primary = conn.add_path(addr(1));
    let secondary = conn.add_path(addr(1));
    conn.apply_bdp_seed(100_000, 80_000, addr(1).ip()).unwrap();

    let on_secondary = conn.record_rtt_sample(secondary, 1_000, 106_000, 0, None).unwrap();
    assert!(!on_secondary.seed_applied);
    assert_eq!(recorder.seed_events(), 0);

    let on_primary = conn.record_rtt_sample(primary, 1_000, 106_000, 0, None).unwrap();
    assert!(on_primary.seed_applied);

    for i in 0..5 {
        let start = 200_000 + i * 200_000;
        conn.record_rtt_sample(primary, start, start + 105_000, 0, None);
    }
    assert_eq!(recorder.seed_events(), 1);
}

#[test_log::test]
fn test_seed_needs_matching_address() {
    let (mut conn, recorder) = connection(SmoothingKind::Continuous);
    let id = conn.add_path(addr(1));
    let mapped = IpAddr::V6(Ipv6Addr::from([0, 0, 0, 0, 0, 0xffff, 0xc633, 0x6401]));
    conn.apply_bdp_seed(100_000, 80_000, mapped).unwrap();

    let update = conn.record_rtt_sample(id, 1_000, 101_000, 0, None).unwrap();
    assert!(!update.seed_applied);
    assert_eq!(recorder.seed_events(), 0);
}

#[test_log::test]
fn test_seed_too_slow_is_ignored() {
    let (mut conn, recorder) = connection(SmoothingKind::Continuous);
    let id = conn.add_path(addr(1));
    conn.apply_bdp_seed(100_000, 80_000, addr(1).ip()).unwrap();

    // Exactly 25% above the seed RTT is outside the window
    conn.record_rtt_sample(id, 1_000, 126_000, 0, None);
    assert_eq!(recorder.seed_events(), 0);
    assert!(!conn.timing().seed().is_consumed());
}

#[test_log::test]
fn test_one_way_delay_only_with_time_stamps() {
    let (mut conn, recorder) = connection(SmoothingKind::Continuous);
    let id = conn.add_path(addr(1));

    let update = conn
        .record_rtt_sample(id, 1_000, 101_000, 0, Some(30_000))
        .unwrap();
    assert!(matches!(
        update.one_way,
        Some(OneWayOutcome::Accepted { .. })
    ));
    assert!(conn.path(id).unwrap().timing.one_way_delay_sample() > 0);
    assert_eq!(recorder.events()[0].one_way_delay, 0);

    conn.timing_mut().set_time_stamps(true);
    conn.record_rtt_sample(id, 200_000, 300_000, 0, Some(230_000));
    let reported = recorder.events()[1].one_way_delay;
    assert_eq!(
        reported,
        conn.path(id).unwrap().timing.one_way_delay_sample()
    );
    assert!(reported <= 100_000);
}

#[test_log::test]
fn test_one_way_candidate_stays_in_window() {
    let (mut conn, _) = connection(SmoothingKind::Continuous);
    let id = conn.add_path(addr(1));
    conn.timing_mut().set_time_stamps(true);

    let acks = [
        (1_000u64, 101_000u64, 10_000u64),
        (150_000, 240_000, 500_000),
        (300_000, 410_000, 1),
        (500_000, 590_000, 560_000),
    ];
    for (send, now, stamp) in acks {
        let update = conn.record_rtt_sample(id, send, now, 0, Some(stamp)).unwrap();
        let timing = conn.path(id).unwrap().timing;
        match update.one_way {
            Some(OneWayOutcome::Accepted { one_way_delay, .. }) => {
                assert!(one_way_delay <= now - send);
            }
            Some(OneWayOutcome::Outlier) => assert!(timing.nb_delay_outliers() > 0),
            None => panic!("timestamp was not reconciled"),
        }
    }
}

#[test_log::test]
fn test_implausible_stamp_is_discarded() {
    let (mut conn, _) = connection(SmoothingKind::Continuous);
    let id = conn.add_path(addr(1));

    let first = conn
        .record_rtt_sample(id, 1_000, 101_000, 0, Some(30_000))
        .unwrap();
    assert!(matches!(
        first.one_way,
        Some(OneWayOutcome::Accepted { .. })
    ));
    let phase = conn.timing().phase_delay();
    let one_way_delay = conn.path(id).unwrap().timing.one_way_delay_sample();
    assert_eq!(phase, Some(50_000));
    assert_eq!(one_way_delay, 80_000);

    // Ack arrives before the packet was sent: no phase can place the stamp
    let update = conn
        .record_rtt_sample(id, 300_000, 250_000, 0, Some(200_000))
        .unwrap();
    assert_eq!(update.one_way, Some(OneWayOutcome::Outlier));

    let timing = conn.path(id).unwrap().timing;
    assert_eq!(timing.nb_delay_outliers(), 1);
    assert_eq!(timing.one_way_delay_sample(), one_way_delay);
    assert_eq!(conn.timing().phase_delay(), phase);
}

#[test_log::test]
fn test_windowed_first_closure_keeps_initial_timer() {
    let (mut conn, _) = connection(SmoothingKind::Windowed);
    let id = conn.add_path(addr(1));
    conn.on_packet_sent(id, 10);

    let update = conn.record_rtt_sample(id, 0, 100_000, 0, None).unwrap();
    assert!(update.statistics_updated);

    let timing = conn.path(id).unwrap().timing;
    assert_eq!(timing.smoothed_rtt(), 100_000);
    assert_eq!(timing.rtt_variance(), 50_000);
    assert_eq!(timing.retransmit_timer(), 1_000_000);
}

#[test_log::test]
fn test_metrics_observer_sees_every_update() {
    let log = MetricsLog::new(16);
    let (conn, _) = connection(SmoothingKind::Continuous);
    let mut conn = conn.with_observer(Box::new(log.clone()));
    let a = conn.add_path(addr(1));
    let b = conn.add_path(addr(2));

    conn.record_rtt_sample(a, 1_000, 51_000, 0, None);
    conn.record_rtt_sample(b, 1_000, 81_000, 0, None);

    let snapshots = log.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].path, a);
    assert_eq!(snapshots[0].time, 50_000);
    assert_eq!(snapshots[1].latest_rtt, 80_000);
    assert_eq!(Some(snapshots[1].pto), conn.retransmit_timeout(b));
}

#[cfg(feature = "serde")]
#[test_log::test]
fn test_metrics_export_as_qlog_lines() {
    let log = MetricsLog::new(16);
    let (conn, _) = connection(SmoothingKind::Continuous);
    let mut conn = conn.with_observer(Box::new(log.clone()));
    let id = conn.add_path(addr(1));
    conn.record_rtt_sample(id, 1_000, 101_000, 0, None);
    conn.record_rtt_sample(id, 200_000, 340_000, 0, None);

    let lines = log.to_json_lines();
    let events: Vec<serde_json::Value> = lines
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1][2], "metrics_updated");
    assert_eq!(events[1][3]["smoothed_rtt"], 105_000);
    assert_eq!(events[1][3]["path"], 0);
}

#[cfg(feature = "serde")]
#[test_log::test]
fn test_config_from_json() {
    let config: TimingConfig =
        serde_json::from_str(r#"{"smoothing": "continuous", "time_stamps": true}"#).unwrap();
    assert_eq!(config.smoothing, SmoothingKind::Continuous);
    assert!(config.time_stamps);
    assert!(config.validate().is_ok());

    let conn = Connection::with_config(Role::Server, 0, config).unwrap();
    assert_eq!(conn.strategy_name(), "continuous");
}

#[test_log::test]
fn test_seed_follows_migrated_address() {
    let (mut conn, recorder) = connection(SmoothingKind::Continuous);
    let id = conn.add_path(addr(1));
    conn.apply_bdp_seed(100_000, 80_000, addr(9).ip()).unwrap();

    conn.path_mut(id).unwrap().set_peer_addr(addr(9));
    let update = conn.record_rtt_sample(id, 1_000, 101_000, 0, None).unwrap();
    assert!(update.seed_applied);
    assert_eq!(recorder.seed_events(), 1);
}
