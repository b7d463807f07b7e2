//! Integration tests for the registry pipeline.
//!
//! Frames run through the scripted dissector in `common`, so every test also
//! checks that no decode handle outlives its frame.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::tempdir;

use common::{beacon_fields, data_fields, eapol_fields, raw_beacon, Script, ScriptedDissector};
use wlanscope::clock::ManualClock;
use wlanscope::config::PipelineConfig;
use wlanscope::dissect::{DissectionGate, FieldKey};
use wlanscope::io::{scan_container, LiveFeed, Subscription};
use wlanscope::pcap::{LinkType, PcapContainer, PcapWriter};
use wlanscope::registry::{
    ApRegistry, FrameOutcome, HandshakeMessage, Rejection, Transition,
};

const BSSID: &str = "AA:BB:CC:DD:EE:FF";
const STATION: &str = "10:22:33:44:55:66";

fn registry_with(script: &Script, config: &PipelineConfig) -> (ApRegistry<ScriptedDissector>, Arc<ManualClock>) {
    let gate = Arc::new(DissectionGate::with_timeout(script.dissector(), config.gate_timeout));
    let clock = Arc::new(ManualClock::new(1_000));
    let registry = ApRegistry::with_clock(gate, config, clock.clone());
    (registry, clock)
}

fn registry(script: &Script) -> (ApRegistry<ScriptedDissector>, Arc<ManualClock>) {
    registry_with(script, &PipelineConfig::default())
}

fn wpa2_beacon(script: &Script, seq: u64, ssid: &str, channel: u16) -> wlanscope::frame::FrameRecord {
    script.frame(seq, beacon_fields("aa:bb:cc:dd:ee:ff", ssid, channel, "0,1,3,48", "", true))
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_beacon_then_data_from_container() {
    let script = Script::new();
    let dir = tempdir().unwrap();
    let path = dir.path().join("scenario.pcap");

    let beacon = raw_beacon([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], "Test");
    script.register(&beacon, beacon_fields("aa:bb:cc:dd:ee:ff", "Test", 6, "0,1,3,48", "", true));
    // The source's first octet (0x11) has the multicast bit set.
    let multicast_source = script.payload(data_fields(BSSID, "11:22:33:44:55:66", BSSID, "0x01"));
    let unicast_source = script.payload(data_fields(BSSID, STATION, BSSID, "0x01"));

    let mut writer = PcapWriter::create(&path).unwrap();
    for payload in [&beacon, &multicast_source, &unicast_source] {
        writer.write_frame(&[], payload, LinkType::Ieee80211Radiotap).unwrap();
    }
    writer.finish().unwrap();

    let (registry, _) = registry(&script);
    let mut container = PcapContainer::open(&path).unwrap();
    assert_eq!(container.link_type().pcap(), 127);

    let summary = scan_container(&registry, &mut container, 2).unwrap();
    assert_eq!((summary.frames, summary.skipped), (3, 0));

    let ap = registry.get_access_point("aa:bb:cc:dd:ee:ff").unwrap();
    assert_eq!(ap.ssid, "Test");
    assert_eq!(ap.beacons, 1);
    assert_eq!(ap.channel, Some(6));
    assert_eq!(ap.encryption.to_string(), "WPA2");
    assert!(ap.station("11:22:33:44:55:66").is_none());
    assert_eq!(ap.stations.len(), 1);
    assert_eq!(ap.station(STATION).unwrap().data_frames, 1);

    // The stored beacon is the raw record, usable without the dissector.
    let stored = ap.beacon.as_ref().unwrap();
    assert_eq!(stored.seq(), 1);
    assert_eq!(stored.beacon_ssid().as_deref(), Some("Test"));

    assert_eq!(script.outstanding(), 0);
    assert_eq!(script.decoded(), 3);
}

#[test]
fn test_beacon_dedup_updates_in_place() {
    let script = Script::new();
    let (registry, clock) = registry(&script);

    let first = registry.on_frame(wpa2_beacon(&script, 1, "Old", 1));
    assert_eq!(
        first,
        FrameOutcome::Updated {
            beacon: Some(true),
            station: false
        }
    );

    clock.advance(500);
    let second = registry.on_frame(wpa2_beacon(&script, 2, "New", 11));
    assert_eq!(
        second,
        FrameOutcome::Updated {
            beacon: Some(false),
            station: false
        }
    );

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.all_access_points().len(), 1);
    let ap = registry.get_access_point(BSSID).unwrap();
    assert_eq!(ap.ssid, "New");
    assert_eq!(ap.channel, Some(11));
    assert_eq!(ap.beacons, 2);
    assert_eq!(ap.last_seen_ms, 1_500);
    assert_eq!(ap.beacon.as_ref().unwrap().seq(), 1, "beacon frame kept from creation");
    assert_eq!(registry.all_beacons().len(), 1);
}

#[test]
fn test_encryption_labels_from_beacons() {
    let script = Script::new();
    let (registry, _) = registry(&script);

    let cases = [
        ("02:00:00:00:00:01", "0,1,48", "1,4", false, "WPA WPS WPA2"),
        ("02:00:00:00:00:02", "0,1,3", "", true, "WEP"),
        ("02:00:00:00:00:03", "0,1,3", "", false, "OPEN"),
        ("02:00:00:00:00:04", "0,221", "1", true, "WPA"),
    ];
    for (i, (bssid, tags, ouis, privacy, _)) in cases.iter().enumerate() {
        registry.on_frame(script.frame(i as u64 + 1, beacon_fields(bssid, "net", 1, tags, ouis, *privacy)));
    }

    for (bssid, _, _, _, label) in cases {
        assert_eq!(registry.get_access_point(bssid).unwrap().encryption.label(), label);
    }
}

#[test]
fn test_broadcast_beacon_ignored() {
    let script = Script::new();
    let (registry, _) = registry(&script);

    let outcome = registry.on_frame(script.frame(
        1,
        beacon_fields("ff:ff:ff:ff:ff:ff", "Bogus", 1, "", "", false),
    ));
    assert!(matches!(outcome, FrameOutcome::Ignored(_)));
    assert!(registry.is_empty());
}

#[test]
fn test_multicast_stations_never_created() {
    let script = Script::new();
    let (registry, _) = registry(&script);
    registry.on_frame(wpa2_beacon(&script, 1, "Test", 6));

    let destinations = ["ff:ff:ff:ff:ff:ff", "01:00:5e:00:00:fb", "33:33:00:00:00:01"];
    for (i, destination) in destinations.iter().enumerate() {
        let outcome = registry.on_frame(script.frame(i as u64 + 2, data_fields(BSSID, BSSID, destination, "0x02")));
        assert!(matches!(outcome, FrameOutcome::Ignored(_)), "{destination}: {outcome:?}");
    }

    // fromDS: the station is the destination.
    let outcome = registry.on_frame(script.frame(10, data_fields(BSSID, BSSID, STATION, "0x02")));
    assert_eq!(
        outcome,
        FrameOutcome::Updated {
            beacon: None,
            station: true
        }
    );

    let ap = registry.get_access_point(BSSID).unwrap();
    assert_eq!(ap.stations.keys().collect::<Vec<_>>(), vec![STATION]);
}

#[test]
fn test_station_frames_counted_per_direction() {
    let script = Script::new();
    let (registry, clock) = registry(&script);
    registry.on_frame(wpa2_beacon(&script, 1, "Test", 6));

    registry.on_frame(script.frame(2, data_fields(BSSID, STATION, BSSID, "0x01")));
    clock.advance(40);
    registry.on_frame(script.frame(3, data_fields(BSSID, BSSID, STATION, "0x02")));
    // Both DS bits (WDS) and neither bit carry no station.
    registry.on_frame(script.frame(4, data_fields(BSSID, STATION, BSSID, "0x03")));
    registry.on_frame(script.frame(5, data_fields(BSSID, STATION, BSSID, "0x00")));

    let ap = registry.get_access_point(BSSID).unwrap();
    let station = ap.station(STATION).unwrap();
    assert_eq!(station.data_frames, 2);
    assert_eq!(station.last_seen_ms, 1_040);
    assert_eq!(ap.signal_dbm, Some(-60));
}

#[test]
fn test_data_for_unknown_access_point() {
    let script = Script::new();
    let (registry, _) = registry(&script);

    let outcome = registry.on_frame(script.frame(1, data_fields(BSSID, STATION, BSSID, "0x01")));
    assert!(matches!(outcome, FrameOutcome::Ignored(_)));
    assert!(registry.get_access_point(BSSID).is_none());
    assert_eq!(script.outstanding(), 0);
}

/// Feed handshake messages (one per clock step of 100 ms) after a beacon.
fn run_handshake(script: &Script, messages: &[u8]) -> (ApRegistry<ScriptedDissector>, Vec<FrameOutcome>) {
    let (registry, clock) = registry(script);
    registry.on_frame(wpa2_beacon(script, 1, "Test", 6));

    let outcomes = messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            clock.advance(100);
            registry.on_frame(script.frame(i as u64 + 2, eapol_fields(BSSID, STATION, *m)))
        })
        .collect();
    (registry, outcomes)
}

#[test]
fn test_handshake_in_order() {
    let script = Script::new();
    let (registry, outcomes) = run_handshake(&script, &[1, 2, 3, 4]);

    assert!(outcomes
        .iter()
        .all(|o| *o == FrameOutcome::Handshake(Transition::Accepted)));

    let ap = registry.get_access_point(BSSID).unwrap();
    let handshake = ap.handshake(STATION).unwrap();
    assert!(handshake.is_complete());
    assert_eq!(handshake.messages(), HandshakeMessage::ALL.to_vec());

    let seqs: Vec<u64> = registry
        .all_complete_handshake_frames()
        .iter()
        .map(|f| f.seq())
        .collect();
    assert_eq!(seqs, vec![2, 3, 4, 5]);
    assert_eq!(registry.stats().handshake_messages, 4);
    assert_eq!(script.outstanding(), 0);
}

#[test]
fn test_handshake_three_before_two() {
    let script = Script::new();
    let (registry, outcomes) = run_handshake(&script, &[1, 3, 2, 4]);

    assert_eq!(
        outcomes,
        vec![
            FrameOutcome::Handshake(Transition::Accepted),
            FrameOutcome::Handshake(Transition::Rejected(Rejection::OutOfOrder)),
            FrameOutcome::Handshake(Transition::Accepted),
            FrameOutcome::Handshake(Transition::Rejected(Rejection::OutOfOrder)),
        ]
    );

    let ap = registry.get_access_point(BSSID).unwrap();
    assert!(ap.handshake(STATION).unwrap().is_complete());
    let seqs: Vec<u64> = registry
        .all_complete_handshake_frames()
        .iter()
        .map(|f| f.seq())
        .collect();
    assert_eq!(seqs, vec![2, 4]);
}

#[test]
fn test_handshake_two_before_one() {
    let script = Script::new();
    let (registry, outcomes) = run_handshake(&script, &[2, 1]);

    assert_eq!(
        outcomes[0],
        FrameOutcome::Handshake(Transition::Rejected(Rejection::OutOfOrder))
    );
    let ap = registry.get_access_point(BSSID).unwrap();
    let handshake = ap.handshake(STATION).unwrap();
    assert!(!handshake.is_complete());
    assert_eq!(handshake.messages(), vec![HandshakeMessage::One]);
    assert!(registry.all_complete_handshake_frames().is_empty());
}

#[test]
fn test_handshake_window_uses_clock() {
    let script = Script::new();
    let (registry, clock) = registry(&script);
    registry.on_frame(wpa2_beacon(&script, 1, "Test", 6));

    registry.on_frame(script.frame(2, eapol_fields(BSSID, STATION, 1)));
    clock.advance(3_001);
    let late = registry.on_frame(script.frame(3, eapol_fields(BSSID, STATION, 2)));
    assert_eq!(
        late,
        FrameOutcome::Handshake(Transition::Rejected(Rejection::WindowExpired { elapsed_ms: 3_001 }))
    );

    // A fresh message 1 restarts the window.
    registry.on_frame(script.frame(4, eapol_fields(BSSID, STATION, 1)));
    clock.advance(3_000);
    let on_time = registry.on_frame(script.frame(5, eapol_fields(BSSID, STATION, 2)));
    assert_eq!(on_time, FrameOutcome::Handshake(Transition::Accepted));
}

#[test]
fn test_handshake_window_from_config() {
    let script = Script::new();
    let config = PipelineConfig::default().with_handshake_window_ms(50);
    let (registry, clock) = registry_with(&script, &config);
    registry.on_frame(wpa2_beacon(&script, 1, "Test", 6));

    registry.on_frame(script.frame(2, eapol_fields(BSSID, STATION, 1)));
    clock.advance(51);
    let outcome = registry.on_frame(script.frame(3, eapol_fields(BSSID, STATION, 2)));
    assert!(matches!(
        outcome,
        FrameOutcome::Handshake(Transition::Rejected(Rejection::WindowExpired { .. }))
    ));
}

#[test]
fn test_handshake_for_unknown_access_point() {
    let script = Script::new();
    let (registry, _) = registry(&script);

    let outcome = registry.on_frame(script.frame(1, eapol_fields(BSSID, STATION, 1)));
    assert!(matches!(outcome, FrameOutcome::Ignored(_)));
    assert!(registry.is_empty());
    assert_eq!(registry.stats().eapol_frames, 1);
}

#[test]
fn test_write_handshakes() {
    let script = Script::new();
    let (registry, _) = run_handshake(&script, &[1, 2, 3, 4]);
    let dir = tempdir().unwrap();
    let path = dir.path().join("handshakes.pcap");

    assert_eq!(registry.write_handshakes(&path).unwrap(), 4);

    let expected: Vec<Vec<u8>> = registry
        .all_complete_handshake_frames()
        .iter()
        .map(|f| f.payload().to_vec())
        .collect();
    let mut container = PcapContainer::open(&path).unwrap();
    assert_eq!(container.link_type(), LinkType::Ieee80211Radiotap);
    let written: Vec<Vec<u8>> = container
        .read_records(1, 0)
        .unwrap()
        .iter()
        .map(|r| r.payload.to_vec())
        .collect();
    assert_eq!(written, expected);
}

#[test]
fn test_write_handshakes_without_complete_ones() {
    let script = Script::new();
    let (registry, _) = run_handshake(&script, &[1]);
    let dir = tempdir().unwrap();
    let path = dir.path().join("none.pcap");

    assert_eq!(registry.write_handshakes(&path).unwrap(), 0);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_undecodable_frame_skipped() {
    let script = Script::new();
    let (registry, _) = registry(&script);

    let unknown = wlanscope::frame::FrameRecord::new(1, LinkType::Ieee80211Radiotap, Vec::new(), vec![0xde, 0xad]);
    assert_eq!(registry.on_frame(unknown), FrameOutcome::Skipped);

    let empty = wlanscope::frame::FrameRecord::new(2, LinkType::Ieee80211Radiotap, Vec::new(), Vec::new());
    assert_eq!(registry.on_frame(empty), FrameOutcome::Skipped);

    registry.on_frame(wpa2_beacon(&script, 3, "Test", 6));
    let stats = registry.stats();
    assert_eq!((stats.frames, stats.skipped, stats.beacons), (3, 2, 1));
    assert_eq!(script.outstanding(), 0);
}

#[test]
fn test_gate_timeout_skips_frame() {
    let script = Script::new();
    let config = PipelineConfig::default().with_gate_timeout(Some(Duration::from_millis(20)));
    let (registry, _) = registry_with(&script, &config);
    let frame = wpa2_beacon(&script, 1, "Test", 6);

    let held = registry.gate().acquire().unwrap();
    let outcome = thread::scope(|s| s.spawn(|| registry.on_frame(frame)).join().unwrap());
    drop(held);

    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(registry.gate().timeouts(), 1);
    assert!(registry.is_empty());

    // The gate is usable again once released.
    assert!(matches!(
        registry.on_frame(wpa2_beacon(&script, 2, "Test", 6)),
        FrameOutcome::Updated { .. }
    ));
}

#[test]
fn test_concurrent_frames() {
    let script = Script::new();
    let (registry, _) = registry(&script);

    let frames: Vec<Vec<_>> = (0..4u8)
        .map(|t| {
            (0..50u64)
                .map(|i| {
                    let bssid = format!("02:00:00:00:{t:02x}:{:02x}", i % 5);
                    script.frame(i, beacon_fields(&bssid, "net", 1, "48", "", false))
                })
                .collect()
        })
        .collect();

    thread::scope(|s| {
        for batch in frames {
            let registry = &registry;
            s.spawn(move || {
                for frame in batch {
                    registry.on_frame(frame);
                }
            });
        }
    });

    assert_eq!(registry.len(), 20);
    let total: u64 = registry.all_access_points().values().map(|ap| ap.beacons).sum();
    assert_eq!(total, 200);
    assert!(!registry.gate().is_held());
    assert_eq!(script.outstanding(), 0);
}

#[test]
fn test_snapshots_are_not_torn() {
    let script = Script::new();
    let (registry, _) = registry(&script);
    registry.on_frame(wpa2_beacon(&script, 1, "Before", 6));

    let snapshot = registry.get_access_point(BSSID).unwrap();
    registry.on_frame(wpa2_beacon(&script, 2, "After", 6));
    registry.on_frame(script.frame(3, data_fields(BSSID, STATION, BSSID, "0x01")));

    assert_eq!(snapshot.ssid, "Before");
    assert_eq!(snapshot.beacons, 1);
    assert!(snapshot.stations.is_empty());
    assert_eq!(registry.get_access_point(BSSID).unwrap().ssid, "After");
}

#[test]
fn test_live_feed_into_registry() {
    let script = Script::new();
    let config = PipelineConfig::default();
    let (registry, _) = registry(&script);
    let registry = Arc::new(registry);

    let (feed, queue) = LiveFeed::new(&config);
    let subscription = Subscription::to_registry(queue, Arc::clone(&registry)).unwrap();

    let beacon = script.payload(beacon_fields(BSSID, "Live", 3, "48", "", true));
    let data = script.payload(data_fields(BSSID, STATION, BSSID, "0x01"));
    assert!(feed.push(Vec::new(), beacon));
    for _ in 0..5 {
        assert!(feed.push(Vec::new(), data.clone()));
    }

    wait_for(|| subscription.handled() == 6);
    assert_eq!(subscription.stop(), 6);

    let ap = registry.get_access_point(BSSID).unwrap();
    assert_eq!(ap.ssid, "Live");
    assert_eq!(ap.station(STATION).unwrap().data_frames, 5);
    assert_eq!(ap.beacon.as_ref().unwrap().seq(), 1);
    assert_eq!(script.outstanding(), 0);
}

#[test]
fn test_field_tree_through_gate() {
    let script = Script::new();
    let gate = DissectionGate::new(script.dissector());
    let mut frame = wpa2_beacon(&script, 7, "Tree", 6);

    let mut guard = gate.acquire().unwrap();
    assert_eq!(frame.field(&mut guard, FieldKey::Ssid).unwrap().as_deref(), Some("Tree"));
    assert_eq!(frame.field(&mut guard, FieldKey::FrameTime).unwrap(), None);

    let tree = frame.field_tree(&mut guard).unwrap();
    assert!(tree.get(FieldKey::Ssid.name()).is_some());
    assert_eq!(script.outstanding(), 1);

    frame.cleanup(&mut guard);
    drop(guard);
    assert_eq!(script.outstanding(), 0);
    assert!(!frame.is_dissected());
}

#[test]
fn test_clear_and_stats() {
    let script = Script::new();
    let (registry, _) = run_handshake(&script, &[1, 2]);
    registry.on_frame(script.frame(10, data_fields(BSSID, STATION, BSSID, "0x01")));

    let stats = registry.stats();
    assert_eq!(stats.frames, 4);
    assert_eq!(stats.beacons, 1);
    assert_eq!(stats.eapol_frames, 2);
    assert_eq!(stats.handshake_messages, 2);
    assert_eq!(stats.station_frames, 1);
    assert_eq!(stats.skip_ratio(), 0.0);

    registry.clear();
    assert!(registry.is_empty());
    assert!(registry.all_access_points().is_empty());
    assert!(registry.all_complete_handshake_frames().is_empty());
}
