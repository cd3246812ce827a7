//! S2 — ramp a three-phase voltage from 0 to 100 V while an external
//! observer thread raises the trip flag once the value crosses 50 V,
//! checking that the ramping tester records a pickup in range.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use svts_common::config::StreamConfig;
use svts_runtime::manager::PublisherManager;
use svts_scenario::testers::{RampVariable, RampingConfig, RampingTester, TesterContext};

use super::common::{fresh_trip, manager_simulated, worker_pool};

#[test]
fn s2_ramp_pickup_detection() {
    let pool = worker_pool(2);
    let manager: Arc<PublisherManager> = manager_simulated(pool);
    let config = StreamConfig { stream_id: "s2".to_string(), ..StreamConfig::default() };
    let stream_id = config.stream_id.clone();
    manager.create_stream(config).unwrap();
    manager.start(&stream_id).unwrap();

    let (trip, trip_getter) = fresh_trip();
    let ctx = TesterContext::new(Arc::clone(&manager), trip_getter);

    let observer_trip = trip.clone();
    let observer_manager = Arc::clone(&manager);
    let observer_stream = stream_id.clone();
    let observer = thread::spawn(move || loop {
        if let Some(state) = observer_manager.phasor_state(&observer_stream).ok() {
            if state.get(svts_signal::ChannelKind::VA).magnitude >= 50.0 {
                observer_trip.set("pickup", 0);
                break;
            }
        }
        thread::sleep(Duration::from_millis(2));
    });

    let tester = RampingTester::new(ctx);
    let result = tester
        .run(RampingConfig {
            stream_id,
            variable: RampVariable::V3Ph,
            start_value: 0.0,
            end_value: 100.0,
            step_size: 5.0,
            step_duration: Duration::from_millis(20),
            monitor_trip: true,
        })
        .unwrap();

    observer.join().unwrap();

    assert!(result.completed);
    let (pickup_value, pickup_time) = result.pickup.expect("expected a pickup edge");
    assert!((50.0..=55.0).contains(&pickup_value), "pickup_value {pickup_value} out of [50, 55]");
    assert!(pickup_time > 0.0);
}
