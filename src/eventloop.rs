//! Cooperative event loop: a bounded FIFO task queue plus a timer
//! min-heap ordered by absolute deadline.
//!
//! The loop itself is driven by the interpreter's thread (see
//! `Interpreter::run_event_loop`), so a timer or task that carries a
//! host object re-enters the interpreter directly through the
//! callback bridge instead of blocking on a condition variable.
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use crate::value::Reference;

/// Capacity of the task queue; submissions past it are dropped.
pub const TASK_QUEUE_LIMIT: usize = 1000;

/// Idle poll interval while waiting for a timer to come due.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// What a task or timer does when it fires: either a diagnostic
/// report line, or a host object whose `run ()V` method the callback
/// bridge executes.
#[derive(Debug, Clone)]
pub enum TaskBody {
    Report,
    Runnable(Reference),
}

/// A unit of work in the FIFO queue.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: i32,
    pub name: String,
    pub body: TaskBody,
}

/// A scheduled task with an absolute deadline. `interval` makes it
/// periodic; `ticks` counts how many times it has fired.
#[derive(Debug, Clone)]
pub struct TimerTask {
    pub id: i32,
    pub name: String,
    pub body: TaskBody,
    pub deadline: Instant,
    pub interval: Option<Duration>,
    pub delay_ms: i64,
    pub ticks: u32,
    seq: u64,
}

// Min-heap order: earliest deadline first, submission order breaking
// ties.
impl Ord for TimerTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerTask {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerTask {}

/// The event loop's queues and counters. `running` guards against
/// re-entrant `run` calls; `stop_requested` short-circuits the next
/// tick without interrupting a task that is already executing.
pub struct EventLoop {
    tasks: Mutex<VecDeque<Task>>,
    timers: Mutex<BinaryHeap<TimerTask>>,
    running: AtomicBool,
    stop_requested: AtomicBool,
    task_count: AtomicU32,
    timer_count: AtomicU32,
    timer_seq: AtomicU64,
}

impl EventLoop {
    pub fn new() -> EventLoop {
        EventLoop {
            tasks: Mutex::new(VecDeque::new()),
            timers: Mutex::new(BinaryHeap::new()),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            task_count: AtomicU32::new(0),
            timer_count: AtomicU32::new(0),
            timer_seq: AtomicU64::new(0),
        }
    }

    /// Queue a task. Overflow past the queue limit drops the task.
    pub fn submit(&self, id: i32, name: &str, body: TaskBody) {
        let mut tasks = self.tasks.lock();
        if tasks.len() >= TASK_QUEUE_LIMIT {
            log::warn!("event loop task queue full, dropping task {id} ({name})");
            return;
        }
        tasks.push_back(Task {
            id,
            name: name.to_string(),
            body,
        });
    }

    /// Schedule a one-shot timer `delay_ms` from now.
    pub fn set_timeout(&self, id: i32, name: &str, delay_ms: i64, body: TaskBody) {
        self.push_timer(id, name, delay_ms, None, body);
    }

    /// Schedule a periodic timer with period `period_ms`.
    pub fn set_interval(&self, id: i32, name: &str, period_ms: i64, body: TaskBody) {
        let period = Duration::from_millis(period_ms.max(0) as u64);
        self.push_timer(id, name, period_ms, Some(period), body);
    }

    fn push_timer(
        &self,
        id: i32,
        name: &str,
        delay_ms: i64,
        interval: Option<Duration>,
        body: TaskBody,
    ) {
        let timer = TimerTask {
            id,
            name: name.to_string(),
            body,
            deadline: Instant::now() + Duration::from_millis(delay_ms.max(0) as u64),
            interval,
            delay_ms,
            ticks: 0,
            seq: self.timer_seq.fetch_add(1, AtomicOrdering::Relaxed),
        };
        self.timers.lock().push(timer);
    }

    /// Pop the next timer whose deadline has passed, if any.
    pub fn take_ready_timer(&self, now: Instant) -> Option<TimerTask> {
        let mut timers = self.timers.lock();
        if timers.peek().map(|t| t.deadline <= now) == Some(true) {
            timers.pop()
        } else {
            None
        }
    }

    /// Re-queue a periodic timer at `deadline + interval`, so a period
    /// `p` fires at t0, t0+p, t0+2p regardless of execution time.
    pub fn reschedule(&self, mut timer: TimerTask) {
        if let Some(interval) = timer.interval {
            timer.deadline += interval;
            self.timers.lock().push(timer);
        }
    }

    /// Pop the next queued task, if any.
    pub fn take_task(&self) -> Option<Task> {
        self.tasks.lock().pop_front()
    }

    pub fn count_task(&self) {
        self.task_count.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn count_timer(&self) {
        self.timer_count.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// True when both queues are empty.
    pub fn is_idle(&self) -> bool {
        self.tasks.lock().is_empty() && self.timers.lock().is_empty()
    }

    /// Try to take the running flag; false when the loop already runs.
    pub fn begin_run(&self) -> bool {
        if self.running.swap(true, AtomicOrdering::SeqCst) {
            return false;
        }
        self.stop_requested.store(false, AtomicOrdering::SeqCst);
        true
    }

    pub fn end_run(&self) {
        self.running.store(false, AtomicOrdering::SeqCst);
    }

    /// Request the loop to stop before its next tick.
    pub fn stop(&self) {
        self.stop_requested.store(true, AtomicOrdering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(AtomicOrdering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(AtomicOrdering::SeqCst)
    }

    /// (tasks processed, timers fired)
    pub fn stats(&self) -> (u32, u32) {
        (
            self.task_count.load(AtomicOrdering::Relaxed),
            self.timer_count.load(AtomicOrdering::Relaxed),
        )
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.lock().len()
    }

    /// Drop all queued work and zero the counters.
    pub fn reset(&self) {
        self.tasks.lock().clear();
        self.timers.lock().clear();
        self.task_count.store(0, AtomicOrdering::Relaxed);
        self.timer_count.store(0, AtomicOrdering::Relaxed);
        self.stop_requested.store(false, AtomicOrdering::SeqCst);
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        EventLoop::new()
    }
}
