//! Round-robin scheduling across terminal sessions.
//!
//! The unit of scheduling is a terminal: each session keeps a stack of the
//! processes launched on it, and only the top of a stack ever runs. The
//! timer rotates the active terminal; terminals with no process are skipped.

pub mod cpu;

pub use cpu::Cpu;

use common::limits::MAX_TERMINAL_NUM;

use crate::process::Pid;

pub struct SchedState {
    running: usize,
    stacks: [Vec<Pid>; MAX_TERMINAL_NUM],
}

impl SchedState {
    pub fn new() -> Self {
        Self {
            running: 0,
            stacks: core::array::from_fn(|_| Vec::new()),
        }
    }

    /// Terminal whose top process holds (or is next to hold) the CPU.
    pub fn running(&self) -> usize {
        self.running
    }

    pub fn set_running(&mut self, terminal: usize) {
        assert!(terminal < MAX_TERMINAL_NUM);
        self.running = terminal;
    }

    pub fn push(&mut self, terminal: usize, pid: Pid) {
        self.stacks[terminal].push(pid);
    }

    pub fn pop(&mut self, terminal: usize) -> Option<Pid> {
        self.stacks[terminal].pop()
    }

    /// Top of a terminal's process stack; the only runnable process there.
    pub fn top(&self, terminal: usize) -> Option<Pid> {
        self.stacks[terminal].last().copied()
    }

    pub fn depth(&self, terminal: usize) -> usize {
        self.stacks[terminal].len()
    }

    /// A terminal's process stack, bottom first.
    pub fn stack(&self, terminal: usize) -> &[Pid] {
        &self.stacks[terminal]
    }

    /// Next terminal to run, walking forward from the current one and
    /// skipping sessions with no process. The current terminal is
    /// reconsidered last, so a lone busy terminal keeps the CPU.
    pub fn next_running(&self) -> Option<usize> {
        (1..=MAX_TERMINAL_NUM)
            .map(|i| (self.running + i) % MAX_TERMINAL_NUM)
            .find(|&t| !self.stacks[t].is_empty())
    }
}

impl Default for SchedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_visits_busy_terminals_equally() {
        let mut sched = SchedState::new();
        for t in 0..MAX_TERMINAL_NUM {
            sched.push(t, Pid(t));
        }
        let mut visits = [0usize; MAX_TERMINAL_NUM];
        for _ in 0..9 {
            let next = sched.next_running().unwrap();
            visits[next] += 1;
            sched.set_running(next);
        }
        assert_eq!(visits, [3, 3, 3]);
    }

    #[test]
    fn empty_terminals_are_skipped() {
        let mut sched = SchedState::new();
        sched.push(0, Pid(0));
        sched.push(2, Pid(1));
        assert_eq!(sched.next_running(), Some(2));
        sched.set_running(2);
        assert_eq!(sched.next_running(), Some(0));
    }

    #[test]
    fn lone_busy_terminal_keeps_the_cpu() {
        let mut sched = SchedState::new();
        sched.push(1, Pid(0));
        sched.set_running(1);
        assert_eq!(sched.next_running(), Some(1));
    }

    #[test]
    fn no_processes_means_no_next() {
        assert_eq!(SchedState::new().next_running(), None);
    }

    #[test]
    fn only_the_stack_top_is_runnable() {
        let mut sched = SchedState::new();
        sched.push(0, Pid(0));
        sched.push(0, Pid(3));
        assert_eq!(sched.top(0), Some(Pid(3)));
        assert_eq!(sched.pop(0), Some(Pid(3)));
        assert_eq!(sched.top(0), Some(Pid(0)));
    }
}
