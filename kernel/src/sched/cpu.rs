//! The CPU token.
//!
//! Exactly one process thread executes at a time. This gate is the only
//! place the kernel uses OS blocking primitives; every process thread parks
//! here until the scheduler names it the current process. Exit status flows
//! back through the same monitor so `execute` can sleep until its child is
//! gone.

use std::sync::{Condvar, Mutex, MutexGuard};

use common::limits::MAX_TASK;

use crate::process::Pid;

struct CpuState {
    current: Option<Pid>,
    exit_status: [Option<u8>; MAX_TASK],
}

pub struct Cpu {
    state: Mutex<CpuState>,
    cv: Condvar,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CpuState {
                current: None,
                exit_status: [None; MAX_TASK],
            }),
            cv: Condvar::new(),
        }
    }

    fn locked(&self) -> MutexGuard<'_, CpuState> {
        // A poisoned monitor only means some process thread unwound; the
        // state itself stays consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current(&self) -> Option<Pid> {
        self.locked().current
    }

    /// Name the process that may run; `None` idles the CPU.
    pub fn set_current(&self, pid: Option<Pid>) {
        self.locked().current = pid;
        self.cv.notify_all();
    }

    /// Park until this process is the current one.
    pub fn wait_until_current(&self, pid: Pid) {
        let mut state = self.locked();
        while state.current != Some(pid) {
            state = self.cv.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Record a child's exit and pass the CPU on, atomically.
    pub fn hand_off_exit(&self, child: Pid, status: u8, next: Option<Pid>) {
        let mut state = self.locked();
        state.exit_status[child.0] = Some(status);
        state.current = next;
        drop(state);
        self.cv.notify_all();
    }

    /// Sleep until `child` posts its exit status, then consume it.
    pub fn wait_exit(&self, child: Pid) -> u8 {
        let mut state = self.locked();
        loop {
            if let Some(status) = state.exit_status[child.0].take() {
                return status;
            }
            state = self.cv.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
