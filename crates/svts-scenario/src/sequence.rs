//! Sequence engine (component J): a time-/event-driven state machine
//! that drives phasor state across a set of active streams and
//! integrates the trip-rule evaluator's output as an alternate
//! transition condition.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use svts_common::state::{EngineState, StateMachine};
use svts_common::trip_flag::TripGetter;
use svts_common::{SvtsError, SvtsResult};
use svts_runtime::manager::PublisherManager;
use svts_runtime::pool::{TaskHandle, WorkerPool};
use svts_signal::PhasorState;
use tracing::{info, warn};

/// Tick granularity of the sequence engine's internal clock.
pub const TICK_PERIOD: Duration = Duration::from_millis(10);

/// How a [`SequenceState`] advances to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionType {
    /// Advance once `duration_sec` has elapsed in this state.
    Time,
    /// Advance on the trip flag's 0→1 edge, or on timeout, whichever
    /// comes first.
    GooseTrip,
}

/// One state in a [`Sequence`]: a phasor snapshot to push to every
/// active stream on entry, plus how long to dwell and how to leave.
#[derive(Debug, Clone)]
pub struct SequenceState {
    /// Human-readable label surfaced through the progress callback.
    pub name: String,
    /// Dwell time, or timeout for a `GooseTrip` transition.
    pub duration_sec: f64,
    /// Exit condition.
    pub transition: TransitionType,
    /// Per-stream phasor snapshot applied on entry to this state.
    pub phasors: HashMap<String, PhasorState>,
}

/// An ordered run plan.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    /// States in execution order.
    pub states: Vec<SequenceState>,
}

/// Signature of the progress callback: `(state_index, total_states,
/// state_name, state_elapsed_sec, message)`.
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str, f64, &str) + Send + Sync>;

struct Inner {
    state_machine: StateMachine,
    sequence: Sequence,
    active_streams: Vec<String>,
    state_index: usize,
    /// Wall-clock instant the current state was entered, adjusted on
    /// resume so that elapsed-in-state is preserved across a pause.
    state_entry: Instant,
    /// Elapsed-in-state duration captured at `pause()`, consumed by the
    /// matching `resume()`. `None` while running.
    frozen_elapsed: Option<Duration>,
    progress_cb: Option<ProgressCallback>,
}

/// Owns one sequence run at a time. Integrates the
/// publisher manager (4.I, downstream writer) and the trip flag (4.F,
/// upstream reader).
pub struct SequenceEngine {
    manager: Arc<PublisherManager>,
    trip: Arc<dyn TripGetter>,
    pool: Arc<WorkerPool>,
    inner: Mutex<Inner>,
    tick_handle: Mutex<Option<TaskHandle>>,
    tick_count: AtomicUsize,
    stop_timeout: Duration,
}

impl SequenceEngine {
    /// Construct an idle engine bound to the given manager, trip
    /// signal, and worker pool.
    #[must_use]
    pub fn new(manager: Arc<PublisherManager>, trip: Arc<dyn TripGetter>, pool: Arc<WorkerPool>, stop_timeout: Duration) -> Self {
        Self {
            manager,
            trip,
            pool,
            inner: Mutex::new(Inner {
                state_machine: StateMachine::new(),
                sequence: Sequence::default(),
                active_streams: Vec::new(),
                state_index: 0,
                state_entry: Instant::now(),
                frozen_elapsed: None,
                progress_cb: None,
            }),
            tick_handle: Mutex::new(None),
            tick_count: AtomicUsize::new(0),
            stop_timeout,
        }
    }

    /// Register a progress callback, replacing any previous one.
    pub fn set_progress_callback(&self, cb: ProgressCallback) {
        self.inner.lock().unwrap().progress_cb = Some(cb);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> EngineState {
        self.inner.lock().unwrap().state_machine.current()
    }

    /// Number of 10 ms ticks this engine has processed since
    /// construction, exposed for tests.
    #[must_use]
    pub fn tick_count(&self) -> usize {
        self.tick_count.load(Ordering::Relaxed)
    }

    /// Validate and start a run: the sequence must name at least one
    /// state and `active_streams` must be non-empty; every state's
    /// `transition` is already typed so there is nothing further to
    /// check there. Spawns the internal 10 ms tick thread.
    pub fn start(self: &Arc<Self>, sequence: Sequence, active_streams: Vec<String>) -> SvtsResult<()> {
        if sequence.states.is_empty() {
            return Err(SvtsError::ConfigInvalid("sequence must have at least one state".into()));
        }
        if active_streams.is_empty() {
            return Err(SvtsError::ConfigInvalid("sequence requires at least one active stream".into()));
        }

        {
            let mut inner = self.inner.lock().unwrap();
            inner.state_machine.transition(EngineState::Running)?;
            inner.sequence = sequence;
            inner.active_streams = active_streams;
            inner.state_index = 0;
            inner.state_entry = Instant::now();
        }
        self.enter_state(0)?;

        let this = Arc::clone(self);
        let handle = self
            .pool
            .spawn_repeating("sequence-engine-tick", move || this.tick_once())?;
        *self.tick_handle.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Push the named state's phasor snapshot to every active stream
    /// and record the new entry time.
    fn enter_state(&self, index: usize) -> SvtsResult<()> {
        let (name, phasors, active_streams) = {
            let inner = self.inner.lock().unwrap();
            let state = &inner.sequence.states[index];
            (state.name.clone(), state.phasors.clone(), inner.active_streams.clone())
        };
        for stream_id in &active_streams {
            if let Some(snapshot) = phasors.get(stream_id) {
                let partial: Vec<_> = svts_signal::ALL_CHANNELS
                    .iter()
                    .map(|&kind| (kind, *snapshot.get(kind)))
                    .collect();
                self.manager.update_phasors(stream_id, &partial)?;
            }
        }
        self.trip.clear();
        let mut inner = self.inner.lock().unwrap();
        inner.state_entry = Instant::now();
        info!(state = %name, "sequence entered state");
        Ok(())
    }

    /// One 10 ms step of the internal clock. Returns `true` to keep the
    /// tick thread alive, `false` once the run has left `Running`.
    fn tick_once(&self) -> bool {
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        std::thread::sleep(TICK_PERIOD);

        let mut inner = self.inner.lock().unwrap();
        if inner.state_machine.current() != EngineState::Running {
            return inner.state_machine.current() == EngineState::Paused;
        }

        let index = inner.state_index;
        let total = inner.sequence.states.len();
        let state = inner.sequence.states[index].clone();
        let elapsed = inner.state_entry.elapsed().as_secs_f64();

        if let Some(cb) = &inner.progress_cb {
            cb(index, total, &state.name, elapsed, "running");
        }

        let should_advance = match state.transition {
            TransitionType::Time => elapsed >= state.duration_sec,
            TransitionType::GooseTrip => self.trip.is_set() || elapsed >= state.duration_sec,
        };

        if !should_advance {
            return true;
        }

        let next_index = index + 1;
        if next_index >= total {
            let _ = inner.state_machine.transition(EngineState::Completed);
            if let Some(cb) = &inner.progress_cb {
                cb(index, total, &state.name, elapsed, "completed");
            }
            return false;
        }

        inner.state_index = next_index;
        drop(inner);
        if let Err(e) = self.enter_state(next_index) {
            warn!(?e, "failed to enter next sequence state");
            let mut inner = self.inner.lock().unwrap();
            let _ = inner.state_machine.transition(EngineState::Stopped);
            return false;
        }
        true
    }

    /// Stop the run; the last phasor state pushed to each stream is
    /// retained. Resumable only by starting a fresh sequence.
    pub fn stop(&self) -> SvtsResult<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state_machine.current().is_terminal() {
                return Ok(());
            }
            inner.state_machine.transition(EngineState::Stopped)?;
        }
        if let Some(handle) = self.tick_handle.lock().unwrap().take() {
            handle.stop();
            handle.join(self.stop_timeout)?;
        }
        Ok(())
    }

    /// Suspend stepping; the elapsed-in-state timer is frozen.
    pub fn pause(&self) -> SvtsResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let elapsed = inner.state_entry.elapsed();
        inner.state_machine.transition(EngineState::Paused)?;
        inner.frozen_elapsed = Some(elapsed);
        Ok(())
    }

    /// Resume stepping with the per-state timer offset so elapsed time
    /// already spent in the current state is preserved.
    pub fn resume(&self) -> SvtsResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let frozen_elapsed = inner.frozen_elapsed.take().unwrap_or_default();
        inner.state_machine.transition(EngineState::Running)?;
        inner.state_entry = Instant::now() - frozen_elapsed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use svts_common::config::{StreamConfig, WorkerPoolConfig};
    use svts_sink::{PacketSink, SimulatedSink};
    use svts_runtime::manager::SinkBuilder;

    struct TestTrip(AtomicBool);

    impl TripGetter for TestTrip {
        fn is_set(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
        fn clear(&self) {
            self.0.store(false, Ordering::SeqCst);
        }
    }

    fn engine_with_stream() -> (Arc<SequenceEngine>, String) {
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig { num_workers: 2, queue_capacity: 8, rt_priority: 0, ..Default::default() }).unwrap());
        let builder: SinkBuilder = Arc::new(|_cfg: &StreamConfig| Ok(Box::new(SimulatedSink::new([1, 1, 1, 1, 1, 1])) as Box<dyn PacketSink>));
        let manager = Arc::new(PublisherManager::new(Arc::clone(&pool), builder, Duration::from_secs(1)));
        let cfg = StreamConfig::default();
        let stream_id = cfg.stream_id.clone();
        manager.create_stream(cfg).unwrap();
        manager.start(&stream_id).unwrap();
        let trip: Arc<dyn TripGetter> = Arc::new(TestTrip(AtomicBool::new(false)));
        let engine = Arc::new(SequenceEngine::new(manager, trip, pool, Duration::from_secs(1)));
        (engine, stream_id)
    }

    fn one_state(name: &str, duration_sec: f64, transition: TransitionType, stream_id: &str) -> Sequence {
        let mut phasors = HashMap::new();
        phasors.insert(stream_id.to_string(), PhasorState::flat(60.0));
        Sequence {
            states: vec![SequenceState { name: name.to_string(), duration_sec, transition, phasors }],
        }
    }

    #[test]
    fn test_start_rejects_empty_sequence() {
        let (engine, stream_id) = engine_with_stream();
        let result = engine.start(Sequence::default(), vec![stream_id]);
        assert!(result.is_err());
    }

    #[test]
    fn test_start_rejects_no_active_streams() {
        let (engine, stream_id) = engine_with_stream();
        let seq = one_state("s1", 1.0, TransitionType::Time, &stream_id);
        assert!(engine.start(seq, vec![]).is_err());
    }

    #[test]
    fn test_single_time_state_completes() {
        let (engine, stream_id) = engine_with_stream();
        let seq = one_state("s1", 0.02, TransitionType::Time, &stream_id);
        engine.start(seq, vec![stream_id]).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(engine.status(), EngineState::Completed);
    }

    #[test]
    fn test_stop_retains_last_state() {
        let (engine, stream_id) = engine_with_stream();
        let seq = one_state("s1", 10.0, TransitionType::Time, &stream_id);
        engine.start(seq, vec![stream_id]).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        engine.stop().unwrap();
        assert_eq!(engine.status(), EngineState::Stopped);
    }

    #[test]
    fn test_pause_resume_preserves_progress() {
        let (engine, stream_id) = engine_with_stream();
        let seq = one_state("s1", 10.0, TransitionType::Time, &stream_id);
        engine.start(seq, vec![stream_id]).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        engine.pause().unwrap();
        assert_eq!(engine.status(), EngineState::Paused);
        engine.resume().unwrap();
        assert_eq!(engine.status(), EngineState::Running);
        engine.stop().unwrap();
    }

    #[test]
    fn test_pause_freezes_elapsed_in_state() {
        let (engine, stream_id) = engine_with_stream();
        let seq = one_state("s1", 10.0, TransitionType::Time, &stream_id);
        engine.start(seq, vec![stream_id]).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        engine.pause().unwrap();
        let frozen = { engine.inner.lock().unwrap().frozen_elapsed.unwrap() };

        std::thread::sleep(Duration::from_millis(300));
        engine.resume().unwrap();

        let elapsed_after_resume = { engine.inner.lock().unwrap().state_entry.elapsed() };
        // Resuming immediately should read back close to the frozen
        // value, not frozen + the 300 ms spent paused.
        assert!(
            elapsed_after_resume < frozen + Duration::from_millis(100),
            "pause duration leaked into elapsed-in-state: frozen={frozen:?} after_resume={elapsed_after_resume:?}"
        );
        engine.stop().unwrap();
    }
}
