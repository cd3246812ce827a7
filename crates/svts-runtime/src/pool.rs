//! Fixed-size worker pool (component G): owns publisher tick threads
//! with optional RT scheduling and CPU pinning, plus a FIFO queue for
//! short auxiliary tasks. Shutdown is drain-then-join: once signaled, no
//! new one-shot tasks are accepted, but every already-queued task runs
//! to completion before any worker thread exits.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use svts_common::config::WorkerPoolConfig;
use svts_common::{SvtsError, SvtsResult};
use tracing::{debug, error, warn};

use crate::realtime;

type OneShot = Box<dyn FnOnce() + Send>;

/// A fixed pool of OS threads: most of its lifetime is spent running
/// dedicated repeating tick tasks (one per [`spawn_repeating`] call, not
/// drawn from the shared queue); the shared FIFO queue backs short
/// auxiliary work (e.g. a one-off config validation or log flush).
pub struct WorkerPool {
    config: WorkerPoolConfig,
    task_tx: Sender<OneShot>,
    task_rx: Receiver<OneShot>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    next_cpu_index: AtomicUsize,
}

impl WorkerPool {
    /// Start `config.num_workers` worker threads draining the shared
    /// one-shot queue.
    pub fn new(config: WorkerPoolConfig) -> SvtsResult<Self> {
        let (task_tx, task_rx) = bounded::<OneShot>(config.queue_capacity.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(config.num_workers);

        for i in 0..config.num_workers {
            let rx = task_rx.clone();
            let shutdown = Arc::clone(&shutdown);
            let cfg = config.clone();
            let cpu = realtime::pick_cpu(&cfg.cpu_affinity, i);
            let handle = thread::Builder::new()
                .name(format!("svts-worker-{i}"))
                .spawn(move || worker_loop(rx, shutdown, cfg, cpu))
                .map_err(|e| SvtsError::Internal(format!("failed to spawn worker thread: {e}")))?;
            workers.push(handle);
        }

        Ok(Self {
            config,
            task_tx,
            task_rx,
            workers,
            shutdown,
            next_cpu_index: AtomicUsize::new(0),
        })
    }

    /// Enqueue a one-shot task for execution by any idle worker. Rejects
    /// with `Busy` once shutdown has been signaled or the queue is full.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> SvtsResult<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(SvtsError::Busy("worker pool is shutting down".into()));
        }
        self.task_tx
            .try_send(Box::new(task))
            .map_err(|_| SvtsError::Busy("worker pool queue is full".into()))
    }

    /// Spawn a dedicated OS thread that calls `step` repeatedly until it
    /// returns `false` or [`TaskHandle::stop`] is invoked, whichever
    /// comes first. Applies this pool's RT priority/CPU-affinity config
    /// to the new thread, each step non-fatal on failure.
    pub fn spawn_repeating<F>(&self, label: impl Into<String>, mut step: F) -> SvtsResult<TaskHandle>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let label = label.into();
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = bounded::<()>(1);
        let stop_for_thread = Arc::clone(&stop);
        let cpu = realtime::pick_cpu(
            &self.config.cpu_affinity,
            self.next_cpu_index.fetch_add(1, Ordering::Relaxed),
        );
        let rt_priority = self.config.rt_priority;
        let rt_policy = self.config.rt_policy;
        let lock_memory = self.config.lock_memory;

        let handle = thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                if let Some(cpu) = cpu {
                    realtime::pin_to_cpu(cpu);
                }
                if rt_priority > 0 {
                    realtime::apply_scheduling(rt_policy, rt_priority);
                }
                if lock_memory {
                    realtime::lock_memory();
                }
                loop {
                    if stop_for_thread.load(Ordering::Relaxed) {
                        break;
                    }
                    let keep_going = match catch_unwind(AssertUnwindSafe(&mut step)) {
                        Ok(keep_going) => keep_going,
                        Err(_) => {
                            error!(task = %label, "repeating task panicked; stopping thread");
                            false
                        }
                    };
                    if !keep_going {
                        break;
                    }
                }
                let _ = done_tx.send(());
            })
            .map_err(|e| SvtsError::Internal(format!("failed to spawn repeating task: {e}")))?;

        Ok(TaskHandle {
            stop,
            done_rx,
            join_handle: Some(handle),
        })
    }

    /// Signal shutdown: no further `submit` calls are accepted, but this
    /// call blocks until every already-queued one-shot task has run and
    /// all worker threads have exited (invariant #9).
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);
        // A sentinel per worker guarantees each drains to empty and
        // observes shutdown even if the queue was already idle.
        for _ in 0..self.workers.len() {
            let _ = self.task_tx.try_send(Box::new(|| {}));
        }
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.join() {
                warn!(?e, "worker thread panicked during shutdown");
            }
        }
    }
}

fn worker_loop(
    rx: Receiver<OneShot>,
    shutdown: Arc<AtomicBool>,
    _config: WorkerPoolConfig,
    cpu: Option<usize>,
) {
    if let Some(cpu) = cpu {
        realtime::pin_to_cpu(cpu);
    }
    loop {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(task) => {
                if let Err(_e) = catch_unwind(AssertUnwindSafe(task)) {
                    error!("worker task panicked; worker continues");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Acquire) && rx.is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("worker thread exiting");
}

/// Handle to a repeating task spawned via [`WorkerPool::spawn_repeating`].
pub struct TaskHandle {
    stop: Arc<AtomicBool>,
    done_rx: Receiver<()>,
    join_handle: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Cooperative stop: checked once per loop iteration by the task.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Whether `stop()` has been called.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Block until the task thread exits or `timeout` elapses.
    pub fn join(mut self, timeout: Duration) -> SvtsResult<()> {
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.join_handle.take() {
                    let _ = handle.join();
                }
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(SvtsError::Timeout(
                "repeating task did not exit within the bounded join timeout".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn test_config(num_workers: usize) -> WorkerPoolConfig {
        WorkerPoolConfig {
            num_workers,
            queue_capacity: 16,
            rt_priority: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_one_shot_tasks_all_execute_before_shutdown_returns() {
        let pool = WorkerPool::new(test_config(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let c = Arc::clone(&counter);
            pool.submit(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_repeating_task_runs_until_stopped() {
        let pool = WorkerPool::new(test_config(1)).unwrap();
        let ticks = Arc::new(AtomicU32::new(0));
        let t = Arc::clone(&ticks);
        let handle = pool
            .spawn_repeating("test-tick", move || {
                t.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
                true
            })
            .unwrap();
        thread::sleep(Duration::from_millis(30));
        handle.stop();
        handle.join(Duration::from_secs(1)).unwrap();
        assert!(ticks.load(Ordering::SeqCst) > 0);
        pool.shutdown();
    }

    #[test]
    fn test_repeating_task_can_self_terminate() {
        let pool = WorkerPool::new(test_config(1)).unwrap();
        let handle = pool.spawn_repeating("self-stop", || false).unwrap();
        handle.join(Duration::from_secs(1)).unwrap();
        pool.shutdown();
    }

    #[test]
    fn test_submit_rejected_after_shutdown_signal() {
        let pool = WorkerPool::new(test_config(1)).unwrap();
        pool.shutdown.store(true, Ordering::Release);
        assert!(matches!(pool.submit(|| {}), Err(SvtsError::Busy(_))));
        pool.workers.iter().for_each(|_| {});
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(test_config(1)).unwrap();
        pool.submit(|| panic!("boom")).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        pool.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
