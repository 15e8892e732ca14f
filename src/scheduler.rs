// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Delayed task execution for the transport clock.
//!
//! The transport never sleeps itself; it asks a [`Scheduler`] to run its next tick later. The
//! tokio scheduler does that against the wall clock, the manual one against a virtual clock that
//! only moves when told to.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::time::Instant;

use crate::playsync::CancelHandle;

/// A unit of work to run later.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after a delay.
pub trait Scheduler: Send + Sync {
    /// Time elapsed on this scheduler's clock.
    fn now(&self) -> Duration;

    /// Runs the task once `delay` has elapsed, unless the returned handle is cancelled first.
    fn schedule_after(&self, delay: Duration, task: Task) -> CancelHandle;
}

/// Schedules tasks on a tokio runtime.
pub struct TokioScheduler {
    handle: Handle,
    origin: Instant,
}

impl TokioScheduler {
    /// Creates a scheduler that spawns onto the given runtime.
    pub fn new(handle: Handle) -> TokioScheduler {
        TokioScheduler {
            handle,
            origin: Instant::now(),
        }
    }

    /// Creates a scheduler on the runtime we're currently inside of.
    pub fn current() -> Result<TokioScheduler, TryCurrentError> {
        Ok(TokioScheduler::new(Handle::try_current()?))
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> CancelHandle {
        let cancel_handle = CancelHandle::new();
        let task_cancel_handle = cancel_handle.clone();
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !task_cancel_handle.is_cancelled() {
                task();
            }
        });
        cancel_handle
    }
}

impl std::fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("now", &self.now())
            .finish()
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    /// Ordered by due time, then by scheduling order.
    tasks: BTreeMap<(Duration, u64), (CancelHandle, Task)>,
}

/// A scheduler driven by hand. Time stands still until [`ManualScheduler::advance`] is called,
/// which makes timing deterministic in tests and lets offline rendering run faster than real
/// time.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> ManualScheduler {
        ManualScheduler::default()
    }

    /// Moves the clock forward by `duration`, running everything that comes due on the way.
    pub fn advance(&self, duration: Duration) {
        let target = self.now() + duration;
        self.advance_to(target);
    }

    /// Moves the clock to `target`, running due tasks in order. The clock reads each task's due
    /// time while it runs, so tasks scheduled from within a task are picked up in the same call.
    pub fn advance_to(&self, target: Duration) {
        loop {
            let next = {
                let mut state = self.state.lock();
                let due = match state.tasks.keys().next() {
                    Some(key) if key.0 <= target => *key,
                    _ => break,
                };
                state.now = state.now.max(due.0);
                state.tasks.remove(&due)
            };

            // Run without holding the lock so the task can schedule its successor.
            if let Some((cancel_handle, task)) = next {
                if !cancel_handle.is_cancelled() {
                    task();
                }
            }
        }

        let mut state = self.state.lock();
        state.now = state.now.max(target);
    }

    /// Number of tasks waiting to run that haven't been cancelled.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .tasks
            .values()
            .filter(|(cancel_handle, _)| !cancel_handle.is_cancelled())
            .count()
    }

    /// Due time of the earliest live task.
    pub fn next_due(&self) -> Option<Duration> {
        self.state
            .lock()
            .tasks
            .iter()
            .find(|(_, (cancel_handle, _))| !cancel_handle.is_cancelled())
            .map(|(key, _)| key.0)
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.state.lock().now
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> CancelHandle {
        let cancel_handle = CancelHandle::new();
        let mut state = self.state.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .tasks
            .insert((due, seq), (cancel_handle.clone(), task));
        cancel_handle
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}
