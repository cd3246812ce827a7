//! SV publisher instance (component H): per-stream lifecycle owning
//! config, phasor state, and sink handle; its tick loop runs on the
//! worker pool (component G) and calls the phasor synthesizer (C) and
//! frame encoder (D) once per sample period.

use std::sync::atomic::{AtomicU16, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use svts_codec::frame::{ChannelSample, FrameEncoder, FrameParams};
use svts_common::config::StreamConfig;
use svts_common::{SvtsError, SvtsResult};
use svts_signal::{ChannelKind, ChannelPhasor, Harmonic, PhasorState, ALL_CHANNELS};
use svts_sink::PacketSink;
use tracing::{error, info, warn};

use crate::pool::{TaskHandle, WorkerPool};

/// Lifecycle state of one SV publisher instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherStatus {
    /// Constructed but never started.
    Created,
    /// Tick loop is active.
    Running,
    /// Stop requested; tick loop unwinding.
    Stopping,
    /// Stopped cleanly.
    Stopped,
    /// The instance hit an unrecoverable fault (`IFACE_DOWN` or a stop
    /// that exceeded its bounded timeout).
    Failed,
}

impl From<u8> for PublisherStatus {
    fn from(v: u8) -> Self {
        match v {
            1 => PublisherStatus::Running,
            2 => PublisherStatus::Stopping,
            3 => PublisherStatus::Stopped,
            4 => PublisherStatus::Failed,
            _ => PublisherStatus::Created,
        }
    }
}

impl From<PublisherStatus> for u8 {
    fn from(s: PublisherStatus) -> Self {
        match s {
            PublisherStatus::Created => 0,
            PublisherStatus::Running => 1,
            PublisherStatus::Stopping => 2,
            PublisherStatus::Stopped => 3,
            PublisherStatus::Failed => 4,
        }
    }
}

/// Single-writer-per-field runtime counters (data model §3). The tick
/// loop is the sole writer of `smp_cnt`/`tick_seq`; all other fields use
/// relaxed atomics since observers only need eventual consistency.
#[derive(Debug, Default)]
pub struct PublisherRuntime {
    smp_cnt: AtomicU16,
    tick_seq: AtomicU64,
    status: AtomicU8,
    missed_ticks: AtomicU64,
    error_count: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl PublisherRuntime {
    /// Current 16-bit wrapping sample counter.
    #[must_use]
    pub fn smp_cnt(&self) -> u16 {
        self.smp_cnt.load(Ordering::Relaxed)
    }

    /// Monotone tick sequence number (never wraps in practice).
    #[must_use]
    pub fn tick_seq(&self) -> u64 {
        self.tick_seq.load(Ordering::Relaxed)
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> PublisherStatus {
        PublisherStatus::from(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: PublisherStatus) {
        self.status.store(status.into(), Ordering::Release);
    }

    /// Count of deadline misses observed so far.
    #[must_use]
    pub fn missed_ticks(&self) -> u64 {
        self.missed_ticks.load(Ordering::Relaxed)
    }

    /// Count of non-fatal emission errors observed so far.
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Last recorded error string, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    fn advance(&self, by: u16) {
        self.smp_cnt.fetch_add(by.max(1), Ordering::Relaxed);
        self.tick_seq.fetch_add(1, Ordering::Relaxed);
    }

    fn record_missed_tick(&self, resync_seq: u64) {
        self.missed_ticks.fetch_add(1, Ordering::Relaxed);
        self.tick_seq.store(resync_seq, Ordering::Relaxed);
    }

    fn record_error(&self, message: String) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap() = Some(message);
    }
}

/// Factory invoked at `start()` to open the packet sink; boxed so the
/// publisher is transport-agnostic (Linux datalink vs. simulated).
pub type SinkFactory = Box<dyn Fn() -> SvtsResult<Box<dyn PacketSink>> + Send + Sync>;

/// Per-stream SV publisher: owns its `StreamConfig` snapshot, its
/// `PhasorState` snapshot, and (while `Running`) exclusive use of one
/// packet sink.
pub struct SvPublisher {
    stream_id: String,
    config: Arc<Mutex<Arc<StreamConfig>>>,
    phasor: Arc<Mutex<Arc<PhasorState>>>,
    runtime: Arc<PublisherRuntime>,
    pool: Arc<WorkerPool>,
    sink_factory: SinkFactory,
    task: Mutex<Option<TaskHandle>>,
    stop_timeout: Duration,
}

impl SvPublisher {
    /// Construct a new, not-yet-started publisher. Rejects an invalid
    /// config at the boundary with no state change.
    pub fn new(
        stream_id: impl Into<String>,
        config: StreamConfig,
        pool: Arc<WorkerPool>,
        sink_factory: SinkFactory,
        stop_timeout: Duration,
    ) -> SvtsResult<Self> {
        config.validate()?;
        let freq = config.nominal_freq;
        Ok(Self {
            stream_id: stream_id.into(),
            config: Arc::new(Mutex::new(Arc::new(config))),
            phasor: Arc::new(Mutex::new(Arc::new(PhasorState::flat(freq)))),
            runtime: Arc::new(PublisherRuntime::default()),
            pool,
            sink_factory,
            task: Mutex::new(None),
            stop_timeout,
        })
    }

    /// Stream identifier this instance serves.
    #[must_use]
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> PublisherStatus {
        self.runtime.status()
    }

    /// Runtime counters handle, for observers.
    #[must_use]
    pub fn runtime(&self) -> &PublisherRuntime {
        &self.runtime
    }

    /// Current config snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<StreamConfig> {
        self.config.lock().unwrap().clone()
    }

    /// Replace the config snapshot under a short writer lock; the tick
    /// reads an `Arc` clone once per iteration, so no frame is torn.
    pub fn set_config(&self, config: StreamConfig) -> SvtsResult<()> {
        config.validate()?;
        *self.config.lock().unwrap() = Arc::new(config);
        Ok(())
    }

    /// Merge a partial channel update into the phasor state
    /// (`updatePhasors`).
    pub fn update_phasors(&self, partial: &[(ChannelKind, ChannelPhasor)]) {
        let mut guard = self.phasor.lock().unwrap();
        let next = guard.with_merged(partial);
        *guard = Arc::new(next);
    }

    /// Replace one channel's harmonic set (`updateHarmonics`).
    pub fn update_harmonics(&self, kind: ChannelKind, harmonics: Vec<Harmonic>) {
        let mut guard = self.phasor.lock().unwrap();
        let mut next = (**guard).clone();
        let mut channel = next.get(kind).clone();
        channel.set_harmonics(harmonics);
        next.set(kind, channel);
        *guard = Arc::new(next);
    }

    /// Current phasor state snapshot.
    #[must_use]
    pub fn phasor_state(&self) -> Arc<PhasorState> {
        self.phasor.lock().unwrap().clone()
    }

    /// Open the sink, resolve `mac_src` if unset, and launch the tick
    /// task on the worker pool. `CREATED -> RUNNING`.
    pub fn start(&self) -> SvtsResult<()> {
        if matches!(self.status(), PublisherStatus::Running | PublisherStatus::Stopping) {
            return Err(SvtsError::Busy(format!(
                "publisher {} is already running",
                self.stream_id
            )));
        }

        let mut sink = (self.sink_factory)()?;

        {
            let mut guard = self.config.lock().unwrap();
            if guard.mac_src.0 == [0u8; 6] {
                let mut resolved = (**guard).clone();
                resolved.mac_src = svts_common::config::MacAddress(sink.mac_address());
                *guard = Arc::new(resolved);
            }
        }

        let config = Arc::clone(&self.config);
        let phasor = Arc::clone(&self.phasor);
        let runtime = Arc::clone(&self.runtime);
        let stream_id = self.stream_id.clone();
        let start_instant = Instant::now();
        let mut encoder = FrameEncoder::new();

        runtime.set_status(PublisherStatus::Running);
        info!(stream_id = %stream_id, "SV publisher starting");

        let task = self.pool.spawn_repeating(format!("sv-pub-{stream_id}"), move || {
            tick(
                sink.as_mut(),
                &config,
                &phasor,
                &runtime,
                &mut encoder,
                start_instant,
                &stream_id,
            )
        })?;
        *self.task.lock().unwrap() = Some(task);
        Ok(())
    }

    /// Cooperative stop: `RUNNING -> STOPPING`, waits for the tick task
    /// to exit (bounded by `stop_timeout`, after which the instance is
    /// `FAILED`), then `STOPPED`.
    pub fn stop(&self) -> SvtsResult<()> {
        let handle = self.task.lock().unwrap().take();
        let Some(handle) = handle else {
            return Ok(());
        };

        self.runtime.set_status(PublisherStatus::Stopping);
        handle.stop();
        match handle.join(self.stop_timeout) {
            Ok(()) => {
                if self.runtime.status() != PublisherStatus::Failed {
                    self.runtime.set_status(PublisherStatus::Stopped);
                }
                info!(stream_id = %self.stream_id, "SV publisher stopped");
                Ok(())
            }
            Err(e) => {
                self.runtime.set_status(PublisherStatus::Failed);
                self.runtime.record_error(e.to_string());
                error!(stream_id = %self.stream_id, error = %e, "publisher stop exceeded bounded timeout");
                Err(e)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn tick(
    sink: &mut dyn PacketSink,
    config: &Arc<Mutex<Arc<StreamConfig>>>,
    phasor: &Arc<Mutex<Arc<PhasorState>>>,
    runtime: &Arc<PublisherRuntime>,
    encoder: &mut FrameEncoder,
    start: Instant,
    stream_id: &str,
) -> bool {
    let cfg = config.lock().unwrap().clone();
    let period_secs = 1.0 / f64::from(cfg.smp_rate);
    let period = Duration::from_secs_f64(period_secs);
    let tick_seq = runtime.tick_seq();
    let next_deadline = start + Duration::from_secs_f64(period_secs * (tick_seq as f64 + 1.0));

    let now = Instant::now();
    if next_deadline > now {
        thread::sleep(next_deadline - now);
    } else if now > next_deadline + period {
        let elapsed = now.duration_since(start).as_secs_f64();
        let resync_seq = (elapsed / period_secs).floor() as u64;
        warn!(stream_id, tick_seq, "SV publisher missed a tick deadline; resynchronizing");
        runtime.record_missed_tick(resync_seq);
        return true;
    }

    let smp_cnt_before = runtime.smp_cnt();
    let phasor_snapshot = phasor.lock().unwrap().clone();
    let n_channels = cfg.n_channels as usize;

    let mut asdus = Vec::with_capacity(cfg.n_asdu as usize);
    for burst_index in 0..cfg.n_asdu {
        let this_smp_cnt = smp_cnt_before.wrapping_add(u16::from(burst_index));
        let mut channels = Vec::with_capacity(n_channels);
        for kind in ALL_CHANNELS.iter().take(n_channels) {
            let value = svts_signal::sample(
                *kind,
                phasor_snapshot.get(*kind),
                phasor_snapshot.freq,
                u64::from(this_smp_cnt),
                cfg.smp_rate,
            );
            channels.push(ChannelSample::valid(value));
        }
        asdus.push(channels);
    }

    let frame_params = FrameParams {
        mac_dst: cfg.mac_dst.0,
        mac_src: cfg.mac_src.0,
        vlan_id: cfg.vlan_id,
        vlan_prio: cfg.vlan_prio,
        vlan_dei: cfg.vlan_dei,
        app_id: cfg.app_id,
        sv_id: cfg.sv_id.clone(),
        dataset_ref: (!cfg.dataset_ref.is_empty()).then(|| cfg.dataset_ref.clone()),
        conf_rev: cfg.conf_rev,
        smp_rate: cfg.smp_rate as u16,
    };

    match encoder.encode(&frame_params, smp_cnt_before, &asdus) {
        Ok(frame) => match sink.write(frame) {
            Ok(()) => {}
            Err(SvtsError::IfaceDown(msg)) => {
                error!(stream_id, error = %msg, "interface down; publisher entering FAILED");
                runtime.set_status(PublisherStatus::Failed);
                runtime.record_error(msg);
                let _ = sink.close();
                return false;
            }
            Err(e) => {
                warn!(stream_id, error = %e, "transient frame emission error");
                runtime.record_error(e.to_string());
            }
        },
        Err(e) => {
            warn!(stream_id, error = %e, "frame encoding error");
            runtime.record_error(e.to_string());
        }
    }

    runtime.advance(cfg.n_asdu as u16);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use svts_common::config::WorkerPoolConfig;
    use svts_sink::SimulatedSink;

    fn pool() -> Arc<WorkerPool> {
        Arc::new(
            WorkerPool::new(WorkerPoolConfig {
                num_workers: 2,
                queue_capacity: 8,
                rt_priority: 0,
                ..Default::default()
            })
            .unwrap(),
        )
    }

    fn fast_config() -> StreamConfig {
        StreamConfig {
            smp_rate: 4800,
            ..Default::default()
        }
    }

    #[test]
    fn test_lifecycle_created_to_running_to_stopped() {
        let publisher = SvPublisher::new(
            "s1",
            fast_config(),
            pool(),
            Box::new(|| Ok(Box::new(SimulatedSink::new([1, 2, 3, 4, 5, 6])) as Box<dyn PacketSink>)),
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(publisher.status(), PublisherStatus::Created);
        publisher.start().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(publisher.status(), PublisherStatus::Running);
        publisher.stop().unwrap();
        assert_eq!(publisher.status(), PublisherStatus::Stopped);
    }

    #[test]
    fn test_smp_cnt_advances_across_ticks() {
        let publisher = SvPublisher::new(
            "s1",
            fast_config(),
            pool(),
            Box::new(|| Ok(Box::new(SimulatedSink::new([0; 6])) as Box<dyn PacketSink>)),
            Duration::from_secs(2),
        )
        .unwrap();
        publisher.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        publisher.stop().unwrap();
        assert!(publisher.runtime().tick_seq() > 0);
    }

    #[test]
    fn test_double_start_rejected() {
        let publisher = SvPublisher::new(
            "s1",
            fast_config(),
            pool(),
            Box::new(|| Ok(Box::new(SimulatedSink::new([0; 6])) as Box<dyn PacketSink>)),
            Duration::from_secs(2),
        )
        .unwrap();
        publisher.start().unwrap();
        assert!(matches!(publisher.start(), Err(SvtsError::Busy(_))));
        publisher.stop().unwrap();
    }

    #[test]
    fn test_mac_src_resolved_from_sink_when_unset() {
        let publisher = SvPublisher::new(
            "s1",
            fast_config(),
            pool(),
            Box::new(|| Ok(Box::new(SimulatedSink::new([9, 8, 7, 6, 5, 4])) as Box<dyn PacketSink>)),
            Duration::from_secs(2),
        )
        .unwrap();
        publisher.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(publisher.config().mac_src.0, [9, 8, 7, 6, 5, 4]);
        publisher.stop().unwrap();
    }

    #[test]
    fn test_update_phasors_merges_only_named_channels() {
        let publisher = SvPublisher::new(
            "s1",
            fast_config(),
            pool(),
            Box::new(|| Ok(Box::new(SimulatedSink::new([0; 6])) as Box<dyn PacketSink>)),
            Duration::from_secs(2),
        )
        .unwrap();
        publisher.update_phasors(&[(ChannelKind::VA, ChannelPhasor::fundamental(100.0, 0.0))]);
        assert_eq!(publisher.phasor_state().get(ChannelKind::VA).magnitude, 100.0);
        assert_eq!(publisher.phasor_state().get(ChannelKind::VB).magnitude, 0.0);
    }
}
