//! Wall-clock budgets for long-running searches.
//!
//! A budget is polled between units of work. The signal-driven variant arms
//! `SIGALRM` through `setitimer(ITIMER_REAL)`; the handler only flips an
//! atomic flag, so the search observes expiry at its next poll regardless of
//! how the calling thread is scheduled. The clock variant compares against a
//! monotonic deadline and is what in-process callers and tests use.

use crate::error::BudgetError;
use std::time::{Duration, Instant};

/// Time budget for one unit of search work
#[derive(Debug, Default)]
pub enum Budget {
    /// Never expires
    #[default]
    Unbounded,
    /// Expires once the monotonic clock passes the deadline
    Deadline(Instant),
    /// Expires when the armed `SIGALRM` fires.
    ///
    /// The handler only sets a flag. Work stops at the next poll, which
    /// searches do before every trial period and every trial duration.
    Alarm(AlarmGuard),
}

impl Budget {
    /// Budget that expires `limit` from now according to the monotonic clock
    pub fn clock(limit: Duration) -> Self {
        Budget::Deadline(Instant::now() + limit)
    }

    /// Arm a process-wide `SIGALRM` that expires the budget after `limit`.
    ///
    /// Fails with [`BudgetError::AlreadyArmed`] while another alarm budget is
    /// alive. The timer is cancelled and the previous handler restored when
    /// the budget is dropped.
    pub fn alarm(limit: Duration) -> Result<Self, BudgetError> {
        AlarmGuard::arm(limit).map(Budget::Alarm)
    }

    /// Whether the budget is exhausted
    pub fn expired(&self) -> bool {
        match self {
            Budget::Unbounded => false,
            Budget::Deadline(deadline) => Instant::now() >= *deadline,
            Budget::Alarm(guard) => guard.fired(),
        }
    }
}

#[cfg(unix)]
mod alarm {
    use super::BudgetError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    static ARMED: AtomicBool = AtomicBool::new(false);
    static FIRED: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_alarm(_signum: libc::c_int) {
        FIRED.store(true, Ordering::SeqCst);
    }

    fn timer(limit: Duration) -> libc::itimerval {
        let zero = libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // A zero it_value would disarm the timer instead of firing at once
        let micros = limit.subsec_micros().max(u32::from(limit.as_secs() == 0));
        libc::itimerval {
            it_interval: zero,
            it_value: libc::timeval {
                tv_sec: limit.as_secs() as libc::time_t,
                tv_usec: micros as libc::suseconds_t,
            },
        }
    }

    /// Installed `SIGALRM` handler plus running interval timer
    pub struct AlarmGuard {
        previous: libc::sigaction,
    }

    impl AlarmGuard {
        pub(super) fn arm(limit: Duration) -> Result<Self, BudgetError> {
            if ARMED
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Err(BudgetError::AlreadyArmed);
            }
            FIRED.store(false, Ordering::SeqCst);

            // SAFETY: the handler only stores to an atomic, which is
            // async-signal-safe; both structs are fully initialised.
            unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction = on_alarm as extern "C" fn(libc::c_int) as libc::sighandler_t;
                action.sa_flags = libc::SA_RESTART;
                libc::sigemptyset(&mut action.sa_mask);

                let mut previous: libc::sigaction = std::mem::zeroed();
                if libc::sigaction(libc::SIGALRM, &action, &mut previous) != 0 {
                    ARMED.store(false, Ordering::SeqCst);
                    return Err(BudgetError::Os(std::io::Error::last_os_error()));
                }

                let value = timer(limit);
                if libc::setitimer(libc::ITIMER_REAL, &value, std::ptr::null_mut()) != 0 {
                    let err = std::io::Error::last_os_error();
                    libc::sigaction(libc::SIGALRM, &previous, std::ptr::null_mut());
                    ARMED.store(false, Ordering::SeqCst);
                    return Err(BudgetError::Os(err));
                }

                Ok(Self { previous })
            }
        }

        pub(super) fn fired(&self) -> bool {
            FIRED.load(Ordering::SeqCst)
        }
    }

    impl Drop for AlarmGuard {
        fn drop(&mut self) {
            // SAFETY: disarming a timer and restoring the handler saved at arm time
            unsafe {
                let stop: libc::itimerval = std::mem::zeroed();
                libc::setitimer(libc::ITIMER_REAL, &stop, std::ptr::null_mut());
                libc::sigaction(libc::SIGALRM, &self.previous, std::ptr::null_mut());
            }
            FIRED.store(false, Ordering::SeqCst);
            ARMED.store(false, Ordering::SeqCst);
        }
    }

    impl std::fmt::Debug for AlarmGuard {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("AlarmGuard")
                .field("fired", &self.fired())
                .finish()
        }
    }
}

#[cfg(not(unix))]
mod alarm {
    use super::BudgetError;
    use std::time::Duration;

    #[derive(Debug)]
    pub struct AlarmGuard;

    impl AlarmGuard {
        pub(super) fn arm(_limit: Duration) -> Result<Self, BudgetError> {
            Err(BudgetError::Unsupported)
        }

        pub(super) fn fired(&self) -> bool {
            false
        }
    }
}

pub use alarm::AlarmGuard;
