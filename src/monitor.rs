//! Per-object reentrant monitors with condition-style wait/notify.
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::VmError;
use crate::exception::ILLEGAL_MONITOR_STATE_EXCEPTION;
use crate::value::Reference;

/// Identity key of a monitor: the reference value itself. Objects and
/// arrays key by heap id, class tokens by name, strings by pointer
/// identity of their interned storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MonitorKey {
    Object(u64),
    Array(u64),
    Class(String),
    Str(usize),
}

impl MonitorKey {
    /// Key for a reference; `None` for null (the caller raises the
    /// NullPointerException) and for host tokens.
    pub fn for_reference(reference: &Reference) -> Option<MonitorKey> {
        match reference {
            Reference::Object(id) => Some(MonitorKey::Object(*id)),
            Reference::Array(id) => Some(MonitorKey::Array(*id)),
            Reference::Class(name) => Some(MonitorKey::Class(name.to_string())),
            Reference::Str(s) => Some(MonitorKey::Str(Arc::as_ptr(s) as *const u8 as usize)),
            Reference::Null | Reference::Host(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    owner: Option<i64>,
    entry_count: u32,
    wait_count: u32,
}

/// A reentrant lock with a wait set. Owner identity is the thread id.
pub struct Monitor {
    state: Mutex<MonitorState>,
    cond: Condvar,
}

impl Monitor {
    fn new() -> Monitor {
        Monitor {
            state: Mutex::new(MonitorState::default()),
            cond: Condvar::new(),
        }
    }

    /// Acquire the monitor, blocking the host thread until it is free
    /// or already owned by the caller.
    pub fn enter(&self, thread_id: i64) {
        let mut state = self.state.lock();
        while state.owner.is_some() && state.owner != Some(thread_id) {
            self.cond.wait(&mut state);
        }
        state.owner = Some(thread_id);
        state.entry_count += 1;
    }

    /// Release one entry. Raises `IllegalMonitorStateException` when
    /// the caller is not the owner.
    pub fn exit(&self, thread_id: i64) -> Result<(), VmError> {
        let mut state = self.state.lock();
        if state.owner != Some(thread_id) {
            return Err(VmError::exception(ILLEGAL_MONITOR_STATE_EXCEPTION));
        }
        state.entry_count -= 1;
        if state.entry_count == 0 {
            state.owner = None;
            self.cond.notify_one();
        }
        Ok(())
    }

    /// Release the monitor entirely and wait to be notified, then
    /// re-acquire with the saved entry count.
    pub fn wait(&self, thread_id: i64) -> Result<(), VmError> {
        let mut state = self.state.lock();
        if state.owner != Some(thread_id) {
            return Err(VmError::exception(ILLEGAL_MONITOR_STATE_EXCEPTION));
        }

        let saved_count = state.entry_count;
        state.entry_count = 0;
        state.owner = None;
        state.wait_count += 1;
        self.cond.notify_one();

        self.cond.wait(&mut state);
        while state.owner.is_some() && state.owner != Some(thread_id) {
            self.cond.wait(&mut state);
        }

        state.owner = Some(thread_id);
        state.entry_count = saved_count;
        state.wait_count -= 1;
        Ok(())
    }

    /// Wake one waiter. Requires ownership.
    pub fn notify(&self, thread_id: i64) -> Result<(), VmError> {
        let state = self.state.lock();
        if state.owner != Some(thread_id) {
            return Err(VmError::exception(ILLEGAL_MONITOR_STATE_EXCEPTION));
        }
        if state.wait_count > 0 {
            self.cond.notify_one();
        }
        Ok(())
    }

    /// Wake every waiter. Requires ownership.
    pub fn notify_all(&self, thread_id: i64) -> Result<(), VmError> {
        let state = self.state.lock();
        if state.owner != Some(thread_id) {
            return Err(VmError::exception(ILLEGAL_MONITOR_STATE_EXCEPTION));
        }
        self.cond.notify_all();
        Ok(())
    }

    pub fn owner(&self) -> Option<i64> {
        self.state.lock().owner
    }

    pub fn entry_count(&self) -> u32 {
        self.state.lock().entry_count
    }
}

/// The monitor map: one monitor per identity, created on first use and
/// retained indefinitely.
#[derive(Default)]
pub struct MonitorMap {
    monitors: Mutex<HashMap<MonitorKey, Arc<Monitor>>>,
}

impl MonitorMap {
    pub fn new() -> MonitorMap {
        MonitorMap::default()
    }

    pub fn monitor_for(&self, key: MonitorKey) -> Arc<Monitor> {
        let mut monitors = self.monitors.lock();
        monitors
            .entry(key)
            .or_insert_with(|| Arc::new(Monitor::new()))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.monitors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.lock().is_empty()
    }
}
