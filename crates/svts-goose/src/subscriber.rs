//! GOOSE subscriber instance (component E, receive half): binds one
//! sink in receive mode, decodes and de-duplicates inbound PDUs, writes
//! `allData` into the shared [`GooseDataMap`], and invokes the
//! trip-rule evaluator (component F) on every state-changing PDU.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use svts_common::{SvtsError, SvtsResult, TripSignal};
use svts_sink::PacketSink;
use tracing::{debug, info, warn};

use crate::datamap::GooseDataMap;
use crate::decode::decode_frame;
use crate::rule::RuleSet;

/// Lifecycle state of one GOOSE subscriber instance, mirroring the SV
/// publisher's state names for consistency across the two receive/send
/// halves of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberStatus {
    /// Constructed but never started.
    Created,
    /// Receive loop is active.
    Running,
    /// Stop requested; receive loop unwinding.
    Stopping,
    /// Stopped cleanly.
    Stopped,
    /// The instance hit an unrecoverable fault (e.g. interface down).
    Failed,
}

impl From<u8> for SubscriberStatus {
    fn from(v: u8) -> Self {
        match v {
            1 => SubscriberStatus::Running,
            2 => SubscriberStatus::Stopping,
            3 => SubscriberStatus::Stopped,
            4 => SubscriberStatus::Failed,
            _ => SubscriberStatus::Created,
        }
    }
}

impl From<SubscriberStatus> for u8 {
    fn from(s: SubscriberStatus) -> Self {
        match s {
            SubscriberStatus::Created => 0,
            SubscriberStatus::Running => 1,
            SubscriberStatus::Stopping => 2,
            SubscriberStatus::Stopped => 3,
            SubscriberStatus::Failed => 4,
        }
    }
}

/// Runtime counters for one subscriber instance.
#[derive(Debug, Default)]
pub struct SubscriberRuntime {
    status: AtomicU8,
    frames_seen: AtomicU64,
    pdus_decoded: AtomicU64,
    duplicates_dropped: AtomicU64,
    parse_errors: AtomicU64,
    state_changes: AtomicU64,
}

impl SubscriberRuntime {
    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> SubscriberStatus {
        SubscriberStatus::from(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: SubscriberStatus) {
        self.status.store(status.into(), Ordering::Release);
    }

    /// Number of frames read off the wire, GOOSE or not.
    #[must_use]
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen.load(Ordering::Relaxed)
    }

    /// Number of GOOSE PDUs successfully decoded.
    #[must_use]
    pub fn pdus_decoded(&self) -> u64 {
        self.pdus_decoded.load(Ordering::Relaxed)
    }

    /// Number of PDUs dropped as exact `(gocbRef, stNum, sqNum)` repeats.
    #[must_use]
    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates_dropped.load(Ordering::Relaxed)
    }

    /// Number of malformed GOOSE-tagged frames seen.
    #[must_use]
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    /// Number of PDUs that represented a genuine state change
    /// (new `stNum`, i.e. not a pure retransmission).
    #[must_use]
    pub fn state_changes(&self) -> u64 {
        self.state_changes.load(Ordering::Relaxed)
    }
}

/// Factory invoked at `start()` to open the packet sink in receive mode.
pub type SinkFactory = Box<dyn Fn() -> SvtsResult<Box<dyn PacketSink>> + Send + Sync>;

/// One subscriber instance: one bound sink, one shared data map, one
/// evaluator, and the trip signal it raises on a true rule match.
pub struct GooseSubscriber {
    name: String,
    sink_factory: SinkFactory,
    data_map: Arc<GooseDataMap>,
    rules: Arc<Mutex<RuleSet>>,
    trip_signal: TripSignal,
    runtime: Arc<SubscriberRuntime>,
    poll_timeout: Duration,
    thread: Mutex<Option<SubscriberThread>>,
    stop_timeout: Duration,
}

struct SubscriberThread {
    stop: Arc<std::sync::atomic::AtomicBool>,
    join_handle: std::thread::JoinHandle<()>,
}

impl GooseSubscriber {
    /// Construct a new, not-yet-started subscriber sharing `data_map`
    /// and `rules` with the rest of the system, raising trips on
    /// `trip_signal`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sink_factory: SinkFactory,
        data_map: Arc<GooseDataMap>,
        rules: Arc<Mutex<RuleSet>>,
        trip_signal: TripSignal,
        poll_timeout: Duration,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            sink_factory,
            data_map,
            rules,
            trip_signal,
            runtime: Arc::new(SubscriberRuntime::default()),
            poll_timeout,
            thread: Mutex::new(None),
            stop_timeout,
        }
    }

    /// Instance name, for logging and diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> SubscriberStatus {
        self.runtime.status()
    }

    /// Runtime counters handle, for observers.
    #[must_use]
    pub fn runtime(&self) -> &SubscriberRuntime {
        &self.runtime
    }

    /// Shared data-object map this subscriber writes into.
    #[must_use]
    pub fn data_map(&self) -> Arc<GooseDataMap> {
        Arc::clone(&self.data_map)
    }

    /// Open the sink in receive mode and launch the receive loop on its
    /// own dedicated thread. `CREATED -> RUNNING`.
    pub fn start(&self) -> SvtsResult<()> {
        if matches!(self.status(), SubscriberStatus::Running | SubscriberStatus::Stopping) {
            return Err(SvtsError::Busy(format!("subscriber {} is already running", self.name)));
        }

        let mut sink = (self.sink_factory)()?;
        let data_map = Arc::clone(&self.data_map);
        let rules = Arc::clone(&self.rules);
        let trip_signal = self.trip_signal.clone();
        let runtime = Arc::clone(&self.runtime);
        let name = self.name.clone();
        let poll_timeout = self.poll_timeout;
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        runtime.set_status(SubscriberStatus::Running);
        info!(subscriber = %name, "GOOSE subscriber starting");

        let join_handle = std::thread::Builder::new()
            .name(format!("goose-sub-{name}"))
            .spawn(move || {
                let mut seen: HashMap<String, (u64, u64)> = HashMap::new();
                let mut tick: u64 = 0;
                loop {
                    if stop_for_thread.load(Ordering::Relaxed) {
                        break;
                    }
                    match sink.read(poll_timeout) {
                        Ok(Some(frame)) => {
                            tick += 1;
                            runtime.frames_seen.fetch_add(1, Ordering::Relaxed);
                            handle_frame(&frame, &mut seen, &data_map, &rules, &trip_signal, &runtime, tick, &name);
                        }
                        Ok(None) => {}
                        Err(SvtsError::IfaceDown(msg)) => {
                            tracing::error!(subscriber = %name, error = %msg, "interface down; subscriber entering FAILED");
                            runtime.set_status(SubscriberStatus::Failed);
                            let _ = sink.close();
                            return;
                        }
                        Err(e) => {
                            warn!(subscriber = %name, error = %e, "transient sink read error");
                        }
                    }
                }
                let _ = sink.close();
            })
            .map_err(|e| SvtsError::Internal(format!("failed to spawn subscriber thread: {e}")))?;

        *self.thread.lock().unwrap() = Some(SubscriberThread { stop, join_handle });
        Ok(())
    }

    /// Cooperative stop: `RUNNING -> STOPPING -> STOPPED`, bounded by
    /// `stop_timeout`; a thread that does not exit in time leaves the
    /// instance `FAILED` and the handle detached (never blocks forever).
    pub fn stop(&self) -> SvtsResult<()> {
        let Some(handle) = self.thread.lock().unwrap().take() else {
            return Ok(());
        };
        self.runtime.set_status(SubscriberStatus::Stopping);
        handle.stop.store(true, Ordering::Relaxed);

        let deadline = std::time::Instant::now() + self.stop_timeout;
        // JoinHandle has no timed join; poll is_finished within the bound.
        loop {
            if handle.join_handle.is_finished() {
                let _ = handle.join_handle.join();
                if self.runtime.status() != SubscriberStatus::Failed {
                    self.runtime.set_status(SubscriberStatus::Stopped);
                }
                info!(subscriber = %self.name, "GOOSE subscriber stopped");
                return Ok(());
            }
            if std::time::Instant::now() >= deadline {
                self.runtime.set_status(SubscriberStatus::Failed);
                return Err(SvtsError::Timeout(format!(
                    "subscriber {} did not exit within the bounded stop timeout",
                    self.name
                )));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_frame(
    frame: &[u8],
    seen: &mut HashMap<String, (u64, u64)>,
    data_map: &Arc<GooseDataMap>,
    rules: &Arc<Mutex<RuleSet>>,
    trip_signal: &TripSignal,
    runtime: &Arc<SubscriberRuntime>,
    tick: u64,
    name: &str,
) {
    let pdu = match decode_frame(frame) {
        Ok(Some(pdu)) => pdu,
        Ok(None) => return, // not GOOSE; quick reject
        Err(e) => {
            runtime.parse_errors.fetch_add(1, Ordering::Relaxed);
            debug!(subscriber = %name, error = %e, "dropped malformed GOOSE frame");
            return;
        }
    };

    let is_new_state = match seen.get(&pdu.go_cb_ref) {
        Some(&(last_st, last_sq)) => {
            if pdu.st_num == last_st && pdu.sq_num == last_sq {
                runtime.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            pdu.st_num != last_st
        }
        None => true,
    };
    seen.insert(pdu.go_cb_ref.clone(), (pdu.st_num, pdu.sq_num));
    runtime.pdus_decoded.fetch_add(1, Ordering::Relaxed);
    if is_new_state {
        runtime.state_changes.fetch_add(1, Ordering::Relaxed);
    }

    for (index, value) in pdu.all_data.iter().enumerate() {
        data_map.write(&format!("{}[{}]", pdu.go_cb_ref, index), value.clone());
    }

    let matched = rules.lock().unwrap().evaluate(data_map);
    if let Some(rule_name) = matched {
        trip_signal.set(&rule_name, tick);
        info!(subscriber = %name, rule = %rule_name, "trip-rule matched; trip signal raised");
    }
}
