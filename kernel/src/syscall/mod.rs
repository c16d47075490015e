//! The syscall surface.
//!
//! Every process thread owns a [`ProcHandle`]; the handle is the process's
//! only door into the kernel. Each call first waits for the CPU token and
//! drains any pending signal, so signal delivery always happens on the
//! target's own thread at a kernel crossing. Blocking operations are built
//! from try-once device calls: the device answers `WouldBlock` and the
//! dispatcher retries, giving the scheduler and signal delivery a chance to
//! run between attempts.

use std::panic::panic_any;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::limits::{
    EXCEPTION_RETURN, EXCEPTION_STATUS, FOUR_MB, MIN_FD, USER_BASE, USER_VIDEO, program_phys_base,
};
use common::{FileOps, FileType, KError, KResult, OpenContext, Signal, SignalHandlerFn, Syscalls};
use devices::fsimg::{DirectoryFile, RegularFile};
use devices::rtc::RtcFile;
use log::{debug, trace};

use crate::kcore::Kernel;
use crate::process::{FdEntry, Pid};
use crate::signal::{ProcessExit, SignalDisposition, default_kills, fatal_status};

/// Syscall numbers, as user code would place them in a trap frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Halt = 1,
    Execute = 2,
    Read = 3,
    Write = 4,
    Open = 5,
    Close = 6,
    Getargs = 7,
    Vidmap = 8,
    SetHandler = 9,
    Sigreturn = 10,
    Play = 11,
}

/// A process's kernel door: its pid plus a reference to the kernel.
pub struct ProcHandle {
    kernel: Arc<Kernel>,
    pid: Pid,
}

impl ProcHandle {
    pub(crate) fn new(kernel: Arc<Kernel>, pid: Pid) -> Self {
        Self { kernel, pid }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Kernel crossing: hold until scheduled, then drain a pending signal.
    fn enter(&self, call: Syscall) {
        self.kernel.cpu.wait_until_current(self.pid);
        trace!("pid {}: syscall {:?} ({})", self.pid.0, call, call as u32);
        self.deliver_pending();
    }

    /// First crossing of a fresh process thread.
    pub(crate) fn wait_start(&self) {
        self.kernel.cpu.wait_until_current(self.pid);
        self.deliver_pending();
    }

    /// Leave the kernel for good. The unwind is caught at the thread
    /// trampoline, which runs the real teardown.
    pub(crate) fn exit(&self, status: u8) -> ! {
        panic_any(ProcessExit { status })
    }

    /// One round of a blocking retry loop: let the scheduler move, then
    /// wait to be scheduled again and take any signal that arrived.
    fn block_point(&self) {
        thread::sleep(Duration::from_micros(200));
        self.kernel.cpu.wait_until_current(self.pid);
        self.deliver_pending();
    }

    pub(crate) fn deliver_pending(&self) {
        let (signal, disposition) = {
            let mut core = self.kernel.core.lock();
            let Some(pcb) = core.table.get_mut(self.pid) else {
                return;
            };
            let Some(signal) = pcb.pending.take() else {
                return;
            };
            (signal, pcb.handlers[signal as usize])
        };
        match disposition {
            SignalDisposition::Handler(handler) => {
                debug!("pid {}: delivering {signal:?} to handler", self.pid.0);
                handler(self, signal);
            }
            SignalDisposition::Default if default_kills(signal) => {
                debug!("pid {}: {signal:?} terminates by default", self.pid.0);
                self.exit(fatal_status(signal));
            }
            SignalDisposition::Default => {}
        }
    }

    // ===== Syscall bodies =====

    fn sys_execute(&self, command: &str) -> KResult<i32> {
        let staged = {
            let mut core = self.kernel.core.lock();
            let terminal = core
                .table
                .get(self.pid)
                .ok_or(KError::InvalidArgument)?
                .terminal;
            core.stage_process(
                &self.kernel.fs,
                terminal,
                Some(self.pid),
                command,
                self.kernel.stdin_ops.clone(),
                self.kernel.stdout_ops.clone(),
            )?
        };
        self.kernel.spawn_process(staged);
        let foreground = self.kernel.terminal.foreground();
        self.kernel.core.lock().switch_to(staged.pid, foreground);
        self.kernel.cpu.set_current(Some(staged.pid));

        // The child's teardown restores our address space and hands the CPU
        // back together with the exit status.
        let status = self.kernel.cpu.wait_exit(staged.pid);
        self.deliver_pending();
        if status == EXCEPTION_STATUS {
            Ok(EXCEPTION_RETURN)
        } else {
            Ok(i32::from(status))
        }
    }

    fn try_read(&self, fd: i32, buf: &mut [u8]) -> KResult<usize> {
        let mut core = self.kernel.core.lock();
        let entry = core
            .table
            .get_mut(self.pid)
            .and_then(|pcb| pcb.fd_mut(fd))
            .ok_or(KError::BadFd)?;
        let ops = entry.ops.clone();
        ops.read(&mut entry.ctx, buf)
    }

    fn sys_write(&self, fd: i32, buf: &[u8]) -> KResult<usize> {
        let mut core = self.kernel.core.lock();
        let entry = core
            .table
            .get_mut(self.pid)
            .and_then(|pcb| pcb.fd_mut(fd))
            .ok_or(KError::BadFd)?;
        let ops = entry.ops.clone();
        ops.write(&mut entry.ctx, buf)
    }

    fn sys_open(&self, name: &str) -> KResult<i32> {
        let dentry = self.kernel.fs.read_dentry_by_name(name)?;
        let (inode, ops): (u32, Arc<dyn FileOps>) = match dentry.ftype() {
            FileType::Rtc => (
                0,
                Arc::new(RtcFile {
                    driver: self.kernel.rtc.clone(),
                }),
            ),
            FileType::Directory => (
                0,
                Arc::new(DirectoryFile {
                    fs: self.kernel.fs.clone(),
                }),
            ),
            FileType::Regular => (
                dentry.inode(),
                Arc::new(RegularFile {
                    fs: self.kernel.fs.clone(),
                }),
            ),
        };
        let mut core = self.kernel.core.lock();
        let pcb = core
            .table
            .get_mut(self.pid)
            .ok_or(KError::InvalidArgument)?;
        let fd = pcb.free_fd().ok_or(KError::OutOfFds)?;
        let mut ctx = OpenContext {
            inode,
            pos: 0,
            terminal: pcb.terminal,
        };
        // Nothing is recorded unless the device accepts the open.
        ops.open(&mut ctx)?;
        pcb.files[fd] = Some(FdEntry { ops, ctx });
        Ok(fd as i32)
    }

    fn sys_close(&self, fd: i32) -> KResult<i32> {
        // 0 and 1 stay bound to the terminal for the process's lifetime.
        if fd < MIN_FD as i32 {
            return Err(KError::BadFd);
        }
        let mut core = self.kernel.core.lock();
        let pcb = core
            .table
            .get_mut(self.pid)
            .ok_or(KError::InvalidArgument)?;
        let slot = usize::try_from(fd).map_err(|_| KError::BadFd)?;
        let mut entry = pcb
            .files
            .get_mut(slot)
            .ok_or(KError::BadFd)?
            .take()
            .ok_or(KError::BadFd)?;
        entry.ops.close(&mut entry.ctx)?;
        Ok(0)
    }

    fn sys_getargs(&self, buf: &mut [u8]) -> KResult<i32> {
        let core = self.kernel.core.lock();
        let pcb = core.table.get(self.pid).ok_or(KError::InvalidArgument)?;
        let args = pcb.args.as_bytes();
        if args.is_empty() || buf.is_empty() {
            return Err(KError::InvalidArgument);
        }
        // The text is clipped to the buffer; the terminator is written only
        // when there is room left for it.
        let n = args.len().min(buf.len());
        buf[..n].copy_from_slice(&args[..n]);
        if n < buf.len() {
            buf[n] = 0;
        }
        Ok(0)
    }

    fn sys_vidmap(&self, screen_start: usize) -> KResult<i32> {
        // The pointer the address gets written through must itself lie in
        // the caller's program window.
        if screen_start < USER_BASE || screen_start > USER_BASE + FOUR_MB - 4 {
            return Err(KError::InvalidArgument);
        }
        let foreground = self.kernel.terminal.foreground();
        let mut guard = self.kernel.core.lock();
        let core = &mut *guard;
        let pcb = core
            .table
            .get_mut(self.pid)
            .ok_or(KError::InvalidArgument)?;
        let terminal = pcb.terminal;
        pcb.vidmapped = true;
        if terminal == foreground {
            core.space.map_user_video();
        } else {
            core.space.map_terminal_video(terminal);
        }
        // The store targets the caller's own frame, not the shared program
        // slot; a timer tick may have re-pointed the slot at another pid
        // since the gate check.
        let phys = program_phys_base(self.pid.0) + (screen_start - USER_BASE);
        core.arena.write_u32(phys, USER_VIDEO as u32);
        Ok(USER_VIDEO as i32)
    }

    fn sys_set_handler(&self, signum: u32, handler: Option<SignalHandlerFn>) -> KResult<i32> {
        let signal = Signal::from_number(signum).ok_or(KError::InvalidArgument)?;
        let mut core = self.kernel.core.lock();
        let pcb = core
            .table
            .get_mut(self.pid)
            .ok_or(KError::InvalidArgument)?;
        pcb.handlers[signal as usize] = match handler {
            Some(f) => SignalDisposition::Handler(f),
            None => SignalDisposition::Default,
        };
        Ok(0)
    }

    fn sys_play(&self, name: &str) -> KResult<i32> {
        let dentry = self.kernel.fs.read_dentry_by_name(name)?;
        if dentry.ftype() != FileType::Regular {
            return Err(KError::InvalidArgument);
        }
        let data = self.kernel.fs.data(dentry.inode())?.to_vec();
        loop {
            match self.kernel.sound.play(&data) {
                Ok(()) => return Ok(0),
                Err(KError::WouldBlock) => self.block_point(),
                Err(e) => return Err(e),
            }
        }
    }
}

fn status_of(call: Syscall, pid: Pid, result: KResult<i32>) -> i32 {
    match result {
        Ok(value) => value,
        Err(e) => {
            debug!("pid {}: {call:?} failed: {e}", pid.0);
            -1
        }
    }
}

impl Syscalls for ProcHandle {
    fn halt(&self, status: u8) -> ! {
        self.enter(Syscall::Halt);
        self.exit(status)
    }

    fn execute(&self, command: &str) -> i32 {
        self.enter(Syscall::Execute);
        status_of(Syscall::Execute, self.pid, self.sys_execute(command))
    }

    fn read(&self, fd: i32, buf: &mut [u8]) -> i32 {
        self.enter(Syscall::Read);
        loop {
            match self.try_read(fd, buf) {
                Ok(n) => return n as i32,
                Err(KError::WouldBlock) => self.block_point(),
                Err(e) => {
                    debug!("pid {}: Read failed: {e}", self.pid.0);
                    return -1;
                }
            }
        }
    }

    fn write(&self, fd: i32, buf: &[u8]) -> i32 {
        self.enter(Syscall::Write);
        status_of(
            Syscall::Write,
            self.pid,
            self.sys_write(fd, buf).map(|n| n as i32),
        )
    }

    fn open(&self, name: &str) -> i32 {
        self.enter(Syscall::Open);
        status_of(Syscall::Open, self.pid, self.sys_open(name))
    }

    fn close(&self, fd: i32) -> i32 {
        self.enter(Syscall::Close);
        status_of(Syscall::Close, self.pid, self.sys_close(fd))
    }

    fn getargs(&self, buf: &mut [u8]) -> i32 {
        self.enter(Syscall::Getargs);
        status_of(Syscall::Getargs, self.pid, self.sys_getargs(buf))
    }

    fn vidmap(&self, screen_start: usize) -> i32 {
        self.enter(Syscall::Vidmap);
        status_of(Syscall::Vidmap, self.pid, self.sys_vidmap(screen_start))
    }

    fn set_handler(&self, signum: u32, handler: Option<SignalHandlerFn>) -> i32 {
        self.enter(Syscall::SetHandler);
        status_of(
            Syscall::SetHandler,
            self.pid,
            self.sys_set_handler(signum, handler),
        )
    }

    fn sigreturn(&self) -> i32 {
        self.enter(Syscall::Sigreturn);
        status_of(Syscall::Sigreturn, self.pid, Err(KError::NotSupported))
    }

    fn play(&self, name: &str) -> i32 {
        self.enter(Syscall::Play);
        status_of(Syscall::Play, self.pid, self.sys_play(name))
    }
}
