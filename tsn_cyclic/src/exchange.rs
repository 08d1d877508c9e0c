//! Bounded-wait access to state shared between the cyclic threads and
//! the rest of the process.
//!
//! An RT thread must never block for an unknown duration, so the mutex is
//! only ever polled with `try_lock` until an absolute deadline. The
//! non-RT side may use the blocking accessor.

use std::sync::{Mutex, MutexGuard, TryLockError};

use thiserror::Error;

use tsn_common::time::TaiTime;

use crate::clock::Clock;

/// Why a bounded-wait exchange did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The deadline expired before the lock was free. The caller carries
    /// on with the previous cycle's value.
    #[error("shared state not available before deadline")]
    TimedOut,

    /// A writer panicked while holding the lock; the state is suspect.
    #[error("shared state poisoned")]
    Fault,
}

/// A mutex whose RT-side accessor gives up at an absolute deadline.
#[derive(Debug, Default)]
pub struct DeadlineMutex<T> {
    inner: Mutex<T>,
}

impl<T> DeadlineMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Run `f` on the shared value, spinning on `try_lock` until
    /// `deadline`. Intended for the cyclic threads only.
    ///
    /// # Errors
    ///
    /// - `TimedOut` once `clock.now()` reaches the deadline
    /// - `Fault` if the lock is poisoned
    pub fn try_exchange<C, R>(
        &self,
        clock: &C,
        deadline: TaiTime,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, ExchangeError>
    where
        C: Clock,
    {
        loop {
            match self.inner.try_lock() {
                Ok(mut guard) => return Ok(f(&mut guard)),
                Err(TryLockError::Poisoned(_)) => return Err(ExchangeError::Fault),
                Err(TryLockError::WouldBlock) => {
                    if clock.now() >= deadline {
                        return Err(ExchangeError::TimedOut);
                    }
                    std::hint::spin_loop();
                }
            }
        }
    }

    /// Blocking access for the non-RT side.
    ///
    /// # Errors
    ///
    /// `Fault` if the lock is poisoned.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>, ExchangeError> {
        self.inner.lock().map_err(|_| ExchangeError::Fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Clock that advances a fixed step on every `now()` call.
    struct TickClock {
        t: std::cell::Cell<u64>,
    }

    impl Clock for TickClock {
        fn now(&self) -> TaiTime {
            let t = self.t.get();
            self.t.set(t + 1_000);
            TaiTime::from_nanos(t)
        }

        fn sleep_until(&self, t: TaiTime) {
            self.t.set(t.as_nanos() as u64);
        }
    }

    fn tick_clock() -> TickClock {
        TickClock {
            t: std::cell::Cell::new(0),
        }
    }

    #[test]
    fn uncontended_exchange_succeeds() {
        let m = DeadlineMutex::new(41);
        let clock = tick_clock();
        let r = m
            .try_exchange(&clock, TaiTime::from_nanos(10_000), |v| {
                *v += 1;
                *v
            })
            .unwrap();
        assert_eq!(r, 42);
    }

    #[test]
    fn contended_exchange_times_out() {
        let m = DeadlineMutex::new(0);
        let clock = tick_clock();

        let guard = m.lock().unwrap();
        let r = m.try_exchange(&clock, TaiTime::from_nanos(50_000), |v| *v);
        assert_eq!(r, Err(ExchangeError::TimedOut));
        drop(guard);

        // Lock free again, the next cycle gets through.
        assert!(m
            .try_exchange(&clock, TaiTime::from_nanos(1_000_000), |v| *v)
            .is_ok());
    }

    #[test]
    fn poisoned_lock_reports_fault() {
        let m = Arc::new(DeadlineMutex::new(0));
        let m2 = Arc::clone(&m);
        let _ = std::thread::spawn(move || {
            let _guard = m2.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let clock = tick_clock();
        let r = m.try_exchange(&clock, TaiTime::from_nanos(1_000_000), |v| *v);
        assert_eq!(r, Err(ExchangeError::Fault));
        assert_eq!(m.lock().unwrap_err(), ExchangeError::Fault);
    }

    #[test]
    fn deadline_in_past_fails_without_spinning_forever() {
        let m = DeadlineMutex::new(0);
        let clock = tick_clock();
        let guard = m.lock().unwrap();
        let r = m.try_exchange(&clock, TaiTime::ZERO, |v| *v);
        assert_eq!(r, Err(ExchangeError::TimedOut));
        drop(guard);
    }
}
