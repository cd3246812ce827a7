//! S4 — an IDMT definite-time overcurrent point: the expected operate
//! time is fixed regardless of current multiple, and an external
//! observer raises the trip flag 500 ms after the stimulus changes.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use svts_common::config::StreamConfig;
use svts_runtime::manager::PublisherManager;
use svts_scenario::testers::{Curve, OvercurrentConfig, OvercurrentPoint, OvercurrentTester, TesterContext, Tolerance};

use super::common::{fresh_trip, manager_simulated, worker_pool};

#[test]
fn s4_idmt_definite_time() {
    let pool = worker_pool(2);
    let manager: Arc<PublisherManager> = manager_simulated(pool);
    let config = StreamConfig { stream_id: "s4".to_string(), ..StreamConfig::default() };
    let stream_id = config.stream_id.clone();
    manager.create_stream(config).unwrap();
    manager.start(&stream_id).unwrap();

    let (trip, trip_getter) = fresh_trip();
    let ctx = TesterContext::new(Arc::clone(&manager), trip_getter);

    let observer_trip = trip.clone();
    let observer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        observer_trip.set("overcurrent", 0);
    });

    let tester = OvercurrentTester::new(ctx);
    let results = tester
        .run(OvercurrentConfig {
            stream_id,
            channel: svts_signal::ChannelKind::IA,
            curve: Curve::DefiniteTime,
            tms: 0.5,
            i_pickup: 100.0,
            points: vec![OvercurrentPoint {
                label: "M=2".to_string(),
                multiple: 2.0,
                tolerance: Tolerance::Absolute(0.1),
            }],
            max_test_duration: Duration::from_secs(2),
        })
        .unwrap();

    observer.join().unwrap();

    assert_eq!(results.len(), 1);
    let measured = results[0].operate_time_s.expect("expected a trip to be observed");
    assert!((measured - 0.5).abs() <= 0.1, "measured_time {measured} should be within 100ms of 0.5s");
    assert!(results[0].passed);
}
