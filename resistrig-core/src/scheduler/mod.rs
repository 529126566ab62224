//! Cooperative timer scheduler
//!
//! One logical thread drives every recurring poll and every phase timer.
//! Tasks are plain values; the controller dispatches them and re-registers
//! recurring ones explicitly.

pub mod timer;

pub use timer::{CancelHandle, Scheduler, SchedulerFull, Task, MAX_TIMERS};
