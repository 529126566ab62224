//! Timer queue with cancellable handles

use heapless::Vec;

use crate::state::{Phase, RunId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum outstanding timers
pub const MAX_TIMERS: usize = 8;

/// Work the scheduler can dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Task {
    /// Interlock/relay poll
    SafetyTick,
    /// Breakdown poll
    BreakdownTick,
    /// Auto-range poll
    RangeTick,
    /// Recorder sample
    RecorderTick,
    /// End of the dwell time of `phase` in `run`
    PhaseTimer { run: RunId, phase: Phase },
}

impl Task {
    /// Dispatch order among tasks that are due together; lower runs first
    ///
    /// Safety always runs before the sequencer can act.
    pub const fn priority(&self) -> u8 {
        match self {
            Task::SafetyTick => 0,
            Task::BreakdownTick => 1,
            Task::PhaseTimer { .. } => 2,
            Task::RangeTick => 3,
            Task::RecorderTick => 4,
        }
    }
}

/// Handle to a scheduled timer
///
/// Cancelling a fired or already cancelled handle is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CancelHandle {
    id: u32,
}

/// All timer slots are in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerFull;

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: u32,
    due_ms: u64,
    task: Task,
}

/// Cooperative timer scheduler
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: Vec<Entry, MAX_TIMERS>,
    next_id: u32,
    now_ms: u64,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            now_ms: 0,
        }
    }

    /// Scheduler clock (ms)
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Move the clock forward; it never goes back
    pub fn advance(&mut self, now_ms: u64) {
        if now_ms > self.now_ms {
            self.now_ms = now_ms;
        }
    }

    /// Run `task` after `delay_ms`
    pub fn schedule(&mut self, delay_ms: u64, task: Task) -> Result<CancelHandle, SchedulerFull> {
        self.schedule_at(self.now_ms.saturating_add(delay_ms), task)
    }

    /// Run `task` at an absolute time
    pub fn schedule_at(&mut self, due_ms: u64, task: Task) -> Result<CancelHandle, SchedulerFull> {
        let id = self.next_id;
        self.entries
            .push(Entry { id, due_ms, task })
            .map_err(|_| SchedulerFull)?;
        self.next_id = self.next_id.wrapping_add(1);
        trace!("scheduled {:?} at {} ms", task, due_ms);
        Ok(CancelHandle { id })
    }

    /// Cancel a timer; returns whether it was still pending
    pub fn cancel(&mut self, handle: CancelHandle) -> bool {
        match self.entries.iter().position(|e| e.id == handle.id) {
            Some(index) => {
                self.entries.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer
    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    pub fn is_pending(&self, handle: CancelHandle) -> bool {
        self.entries.iter().any(|e| e.id == handle.id)
    }

    /// Number of pending timers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.due_ms).min()
    }

    /// Take the next due task
    ///
    /// Among due tasks the highest priority wins, then the earliest
    /// deadline, then the order of scheduling.
    pub fn pop_due(&mut self) -> Option<Task> {
        let now = self.now_ms;
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due_ms <= now)
            .min_by_key(|(_, e)| (e.task.priority(), e.due_ms, e.id))
            .map(|(index, _)| index)?;
        let entry = self.entries.swap_remove(index);
        trace!("dispatch {:?} (due {} ms)", entry.task, entry.due_ms);
        Some(entry.task)
    }
}
