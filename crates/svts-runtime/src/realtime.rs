//! Best-effort real-time scheduling and CPU affinity for worker threads
//! (component G supplement). Every step is independently non-fatal: a
//! failed `mlockall` or `sched_setscheduler` call falls back to normal
//! scheduling with a logged warning, never aborting the worker.

use svts_common::config::{CpuAffinity, SchedPolicy};
use tracing::warn;

/// Apply RT scheduling policy/priority to the calling thread, if enabled.
#[cfg(target_os = "linux")]
pub fn apply_scheduling(policy: SchedPolicy, priority: u8) {
    if priority == 0 {
        return;
    }
    let linux_policy = match policy {
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::Rr => libc::SCHED_RR,
        SchedPolicy::Other => return,
    };
    let param = libc::sched_param {
        sched_priority: i32::from(priority.clamp(1, 99)),
    };
    // SAFETY: sched_setscheduler is safe with a stack-local sched_param.
    let result = unsafe { libc::sched_setscheduler(0, linux_policy, &param) };
    if result == -1 {
        warn!(
            error = %std::io::Error::last_os_error(),
            "sched_setscheduler failed; worker falls back to normal scheduling"
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn apply_scheduling(_policy: SchedPolicy, _priority: u8) {
    warn!("RT scheduling not available on this platform");
}

/// Lock the calling process's current and future memory pages.
#[cfg(target_os = "linux")]
pub fn lock_memory() {
    use nix::sys::mman::{mlockall, MlockAllFlags};
    if let Err(e) = mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        warn!(error = %e, "mlockall failed; continuing without locked memory");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn lock_memory() {
    warn!("mlockall not available on this platform");
}

/// Pin the calling thread to a single CPU, chosen round-robin from
/// `affinity` by the caller (who passes the pre-selected `cpu`).
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut set = CpuSet::new();
    if set.set(cpu).is_err() {
        warn!(cpu, "invalid CPU index for affinity set");
        return;
    }
    if let Err(e) = sched_setaffinity(Pid::from_raw(0), &set) {
        warn!(cpu, error = %e, "sched_setaffinity failed; worker left unpinned");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu: usize) {
    warn!("CPU affinity not available on this platform");
}

/// Pick the next CPU from an affinity set round-robin, given the
/// worker's ordinal index within the pool.
#[must_use]
pub fn pick_cpu(affinity: &CpuAffinity, worker_index: usize) -> Option<usize> {
    match affinity {
        CpuAffinity::None => None,
        CpuAffinity::Set(cpus) if cpus.is_empty() => None,
        CpuAffinity::Set(cpus) => Some(cpus[worker_index % cpus.len()]),
    }
}
