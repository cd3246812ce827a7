//! Shared scaffolding for the end-to-end scenario tests in this module.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use svts_common::config::{StreamConfig, WorkerPoolConfig};
use svts_common::trip_flag::{TripGetter, TripSignal};
use svts_runtime::manager::{PublisherManager, SinkBuilder};
use svts_runtime::pool::WorkerPool;
use svts_scenario::testers::TesterContext;
use svts_sink::{PacketSink, SimulatedSink};

/// A sink that records every transmitted frame into a handle the test
/// keeps, since the publisher manager owns the sink once a stream is
/// started and a test cannot reach back into it afterward.
pub struct CapturingSink {
    mac: [u8; 6],
    captured: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CapturingSink {
    #[must_use]
    pub fn new(mac: [u8; 6], captured: Arc<Mutex<Vec<Vec<u8>>>>) -> Self {
        Self { mac, captured }
    }
}

impl PacketSink for CapturingSink {
    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn write(&mut self, frame: &[u8]) -> svts_common::SvtsResult<()> {
        self.captured.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    fn read(&mut self, _timeout: Duration) -> svts_common::SvtsResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn close(&mut self) -> svts_common::SvtsResult<()> {
        Ok(())
    }
}

#[must_use]
pub fn worker_pool(num_workers: usize) -> Arc<WorkerPool> {
    Arc::new(
        WorkerPool::new(WorkerPoolConfig {
            num_workers,
            queue_capacity: 32,
            rt_priority: 0,
            ..Default::default()
        })
        .unwrap(),
    )
}

/// A manager whose sink builder records every frame into the returned
/// capture buffer.
#[must_use]
pub fn manager_with_capture(pool: Arc<WorkerPool>) -> (Arc<PublisherManager>, Arc<Mutex<Vec<Vec<u8>>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let for_builder = Arc::clone(&captured);
    let builder: SinkBuilder = Arc::new(move |_cfg: &StreamConfig| {
        Ok(Box::new(CapturingSink::new([0x02, 0x02, 0x02, 0x02, 0x02, 0x02], Arc::clone(&for_builder))) as Box<dyn PacketSink>)
    });
    (Arc::new(PublisherManager::new(pool, builder, Duration::from_secs(2))), captured)
}

/// A manager backed by a plain [`SimulatedSink`], for scenarios that
/// only care about phasor or trip state, not the emitted wire bytes.
#[must_use]
pub fn manager_simulated(pool: Arc<WorkerPool>) -> Arc<PublisherManager> {
    let builder: SinkBuilder =
        Arc::new(|_cfg: &StreamConfig| Ok(Box::new(SimulatedSink::new([0x01, 0x01, 0x01, 0x01, 0x01, 0x01])) as Box<dyn PacketSink>));
    Arc::new(PublisherManager::new(pool, builder, Duration::from_secs(2)))
}

/// A fresh trip signal plus its `TripGetter` handle, for wiring a
/// `TesterContext` or `SequenceEngine` while keeping a clone an
/// external observer thread can raise independently.
#[must_use]
pub fn fresh_trip() -> (TripSignal, Arc<dyn TripGetter>) {
    let trip = TripSignal::new(16);
    let getter: Arc<dyn TripGetter> = Arc::new(trip.clone());
    (trip, getter)
}

/// A `TesterContext` over a freshly created, started stream, plus the
/// stream id and a `TripSignal` an observer thread can raise.
pub fn tester_context(manager: Arc<PublisherManager>, config: StreamConfig) -> (TesterContext, String, TripSignal) {
    let stream_id = config.stream_id.clone();
    manager.create_stream(config).unwrap();
    manager.start(&stream_id).unwrap();
    let (trip, getter) = fresh_trip();
    (TesterContext::new(manager, getter), stream_id, trip)
}

/// Locate the `smpCnt` tag (`0x82`, 2-byte length) inside a raw SV
/// frame and return its value. Panics if not found, since every frame
/// in this suite carries exactly one `smpCnt`.
#[must_use]
pub fn find_smp_cnt(frame: &[u8]) -> u16 {
    for w in 0..frame.len().saturating_sub(3) {
        if frame[w] == svts_codec::tags::SMP_CNT && frame[w + 1] == 2 {
            return u16::from_be_bytes([frame[w + 2], frame[w + 3]]);
        }
    }
    panic!("smpCnt tag not found in frame");
}
