//! Kernel state guarded by the one core lock, and the staging path that
//! turns a command line into a ready process.

use std::sync::Arc;

use common::limits::{ARG_MAX, ENTRY_OFFSET, EXEC_MAGIC};
use common::{FileOps, FileType, KError, KResult, OpenContext};
use devices::fsimg::FsImage;
use log::{debug, warn};

use crate::mm::{AddressSpace, FrameArena};
use crate::process::{FdEntry, KernelStack, Pcb, Pid, ProcessTable, Tss};
use crate::sched::SchedState;

/// Everything a context switch or syscall mutates. Held behind a spinlock;
/// holding it is the hosted equivalent of running with interrupts off.
pub struct Core {
    pub table: ProcessTable,
    pub space: AddressSpace,
    pub arena: FrameArena,
    pub sched: SchedState,
    pub tss: Tss,
}

/// A process staged but not yet running: its thread still has to be spawned
/// and handed the CPU.
#[derive(Debug, Clone, Copy)]
pub struct StagedProcess {
    pub pid: Pid,
    pub entry: u32,
}

/// Split a command line into program name and argument text.
pub fn parse_command(command: &str) -> KResult<(&str, &str)> {
    let command = command.trim();
    let mut parts = command.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    if name.is_empty() {
        return Err(KError::InvalidArgument);
    }
    Ok((name, parts.next().unwrap_or("").trim()))
}

fn clip_args(args: &str) -> &str {
    if args.len() <= ARG_MAX {
        return args;
    }
    let mut end = ARG_MAX;
    while !args.is_char_boundary(end) {
        end -= 1;
    }
    &args[..end]
}

impl Core {
    pub fn new() -> Self {
        Self {
            table: ProcessTable::new(),
            space: AddressSpace::new(),
            arena: FrameArena::new(),
            sched: SchedState::new(),
            tss: Tss::default(),
        }
    }

    /// Build a process from `command`: validate the executable, claim a pid,
    /// bind the terminal descriptors, load the image, and push the process
    /// onto its terminal's stack. The caller spawns the thread and hands the
    /// CPU over.
    ///
    /// A `None` parent marks the root of a terminal, which is its own
    /// parent and is relaunched when it halts.
    pub fn stage_process(
        &mut self,
        fs: &FsImage,
        terminal: usize,
        parent: Option<Pid>,
        command: &str,
        stdin: Arc<dyn FileOps>,
        stdout: Arc<dyn FileOps>,
    ) -> KResult<StagedProcess> {
        let (name, args) = parse_command(command)?;
        let dentry = fs.read_dentry_by_name(name)?;
        if dentry.ftype() != FileType::Regular {
            return Err(KError::BadExecutable);
        }
        let image = fs.data(dentry.inode())?;
        if image.len() < ENTRY_OFFSET + 4 || image[..4] != EXEC_MAGIC {
            return Err(KError::BadExecutable);
        }
        let entry = u32::from_le_bytes(image[ENTRY_OFFSET..ENTRY_OFFSET + 4].try_into().unwrap());

        let pid = self.table.allocate()?;
        let mut pcb = Pcb::new(
            pid,
            parent.unwrap_or(pid),
            terminal,
            name.to_owned(),
            clip_args(args).to_owned(),
        );
        let ctx = OpenContext {
            inode: 0,
            pos: 0,
            terminal,
        };
        pcb.files[0] = Some(FdEntry { ops: stdin, ctx });
        pcb.files[1] = Some(FdEntry { ops: stdout, ctx });
        self.table.insert(pcb);

        self.space.map_program(pid.0);
        self.space.load_program(&mut self.arena, pid.0, image);
        self.tss.load(&KernelStack::new(pid));
        self.sched.push(terminal, pid);
        debug!("staged pid {} ({name}) on terminal {terminal}", pid.0);
        Ok(StagedProcess { pid, entry })
    }

    /// Re-point the address space, kernel stack, and video window at `pid`.
    pub fn switch_to(&mut self, pid: Pid, foreground: usize) {
        let Some(pcb) = self.table.get(pid) else {
            warn!("switch to dead pid {}", pid.0);
            return;
        };
        let terminal = pcb.terminal;
        self.space.map_program(pid.0);
        self.tss.load(&KernelStack::new(pid));
        if terminal == foreground {
            self.space.map_user_video();
        } else {
            self.space.map_terminal_video(terminal);
        }
        self.sched.set_running(terminal);
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}
