//! S6 — a two-state sequence whose second state exits on a GOOSE trip
//! edge rather than a timer: raising the trip flag shortly after entry
//! should complete the run well inside the state's 2 s timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use svts_common::config::StreamConfig;
use svts_common::state::EngineState;
use svts_runtime::manager::PublisherManager;
use svts_scenario::{Sequence, SequenceEngine, SequenceState, TransitionType};
use svts_signal::PhasorState;

use super::common::{fresh_trip, manager_simulated, worker_pool};

#[test]
fn s6_sequence_goose_trip_short_circuits_timeout() {
    let pool = worker_pool(2);
    let manager: Arc<PublisherManager> = manager_simulated(pool.clone());
    let config = StreamConfig { stream_id: "s6".to_string(), ..StreamConfig::default() };
    let stream_id = config.stream_id.clone();
    manager.create_stream(config).unwrap();
    manager.start(&stream_id).unwrap();

    let (trip, trip_getter) = fresh_trip();
    let engine = Arc::new(SequenceEngine::new(Arc::clone(&manager), trip_getter, pool, Duration::from_secs(1)));

    let mut first_phasors = HashMap::new();
    first_phasors.insert(stream_id.clone(), PhasorState::flat(60.0));
    let mut second_phasors = HashMap::new();
    second_phasors.insert(stream_id.clone(), PhasorState::flat(60.0));

    let sequence = Sequence {
        states: vec![
            SequenceState {
                name: "pre-fault".to_string(),
                duration_sec: 0.1,
                transition: TransitionType::Time,
                phasors: first_phasors,
            },
            SequenceState {
                name: "await-trip".to_string(),
                duration_sec: 2.0,
                transition: TransitionType::GooseTrip,
                phasors: second_phasors,
            },
        ],
    };

    let start = Instant::now();
    engine.start(sequence, vec![stream_id]).unwrap();

    // The first state dwells 100 ms; raise the trip flag 50 ms after
    // that, i.e. roughly 50 ms into the second state, as the scenario
    // specifies.
    thread::sleep(Duration::from_millis(150));
    trip.set("observer", 0);

    let deadline = Instant::now() + Duration::from_secs(1);
    while engine.status() == EngineState::Running && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    let elapsed = start.elapsed();
    assert_eq!(engine.status(), EngineState::Completed);
    assert!(elapsed < Duration::from_millis(300), "elapsed {elapsed:?} should be well under the 2s timeout");
}
