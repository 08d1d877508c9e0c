//! Real-time thread setup: memory locking, stack prefault, SCHED_FIFO.
//!
//! Everything here needs CAP_SYS_NICE / CAP_IPC_LOCK, so it sits behind
//! the `rt` cargo feature and compiles to a no-op otherwise. The TAI
//! clock and absolute sleeps are unprivileged and live in [`crate::clock`].

use thiserror::Error;

/// RT setup failure. Fatal at startup when the `rt` feature is active.
#[derive(Debug, Error)]
pub enum RtError {
    /// `mlockall` was refused.
    #[error("locking memory failed: {0}")]
    MemoryLock(nix::Error),

    /// The SCHED_FIFO priority was rejected.
    #[error("setting SCHED_FIFO priority {0} failed: {1}")]
    Scheduler(i32, std::io::Error),
}

/// Bytes of stack touched ahead of time so the RT thread never page-faults.
#[cfg(feature = "rt")]
const PREFAULT_STACK_SIZE: usize = 64 * 1024;

/// Prepare the calling thread for cyclic real-time work: lock all
/// current and future pages, prefault the stack, switch to SCHED_FIFO at
/// `priority`.
#[cfg(feature = "rt")]
pub fn init_rt_thread(priority: i32) -> Result<(), RtError> {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
        .map_err(RtError::MemoryLock)?;

    let mut stack = [0u8; PREFAULT_STACK_SIZE];
    for byte in stack.iter_mut().step_by(4096) {
        unsafe { std::ptr::write_volatile(byte, 0) };
    }

    let param = libc::sched_param {
        sched_priority: priority,
    };
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(RtError::Scheduler(
            priority,
            std::io::Error::from_raw_os_error(rc),
        ));
    }

    tracing::info!(priority, "thread switched to SCHED_FIFO");
    Ok(())
}

/// Without the `rt` feature the thread keeps its inherited scheduling.
#[cfg(not(feature = "rt"))]
pub fn init_rt_thread(priority: i32) -> Result<(), RtError> {
    tracing::debug!(priority, "rt feature disabled, keeping default scheduling");
    Ok(())
}
