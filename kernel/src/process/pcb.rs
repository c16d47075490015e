use std::sync::Arc;

use common::limits::MAX_FD;
use common::{FileOps, OpenContext, Signal};

use crate::signal::SignalDisposition;

/// Process identifier, 0-based slot in the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Pid(pub usize);

/// An open file: its operations vector plus per-open state.
#[derive(Clone)]
pub struct FdEntry {
    pub ops: Arc<dyn FileOps>,
    pub ctx: OpenContext,
}

/// Process Control Block
pub struct Pcb {
    /// Process ID
    pub pid: Pid,

    /// Parent process ID; the root of a terminal is its own parent
    pub parent: Pid,

    /// Terminal session this process belongs to
    pub terminal: usize,

    /// Command name, for logging
    pub name: String,

    /// Argument text, stripped of surrounding whitespace
    pub args: String,

    /// Open file table; 0 and 1 are pre-bound to the terminal
    pub files: [Option<FdEntry>; MAX_FD],

    /// Single-slot pending signal
    pub pending: Option<Signal>,

    /// Per-signal dispositions
    pub handlers: [SignalDisposition; Signal::COUNT],

    /// Whether the process asked for the user video page
    pub vidmapped: bool,
}

impl Pcb {
    pub fn new(pid: Pid, parent: Pid, terminal: usize, name: String, args: String) -> Self {
        Self {
            pid,
            parent,
            terminal,
            name,
            args,
            files: core::array::from_fn(|_| None),
            pending: None,
            handlers: [SignalDisposition::Default; Signal::COUNT],
            vidmapped: false,
        }
    }

    /// Lowest free descriptor at or above `MIN_FD`.
    pub fn free_fd(&self) -> Option<usize> {
        (common::limits::MIN_FD..MAX_FD).find(|&fd| self.files[fd].is_none())
    }

    pub fn fd(&self, fd: i32) -> Option<&FdEntry> {
        let fd = usize::try_from(fd).ok()?;
        self.files.get(fd)?.as_ref()
    }

    pub fn fd_mut(&mut self, fd: i32) -> Option<&mut FdEntry> {
        let fd = usize::try_from(fd).ok()?;
        self.files.get_mut(fd)?.as_mut()
    }
}
