//! Kernel assembly: owns the core state, the CPU token, the devices, and
//! the program registry, and drives process lifecycles and the timer.

pub mod state;

pub use state::{Core, StagedProcess, parse_command};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use common::limits::EXCEPTION_STATUS;
use common::{FileOps, ProgramSet, Signal};
use devices::fsimg::FsImage;
use devices::rtc::RtcDriver;
use devices::sound::SoundDriver;
use devices::terminal::{KeyEvent, TermInput, TermOutput, TerminalDriver};
use log::{debug, error, info, warn};

use crate::process::Pid;
use crate::sched::Cpu;
use crate::signal::{ProcessExit, SignalDisposition, classify_fault};
use crate::syscall::ProcHandle;

/// Command launched as the root of every terminal.
const ROOT_COMMAND: &str = "shell";

pub struct Kernel {
    pub(crate) core: spin::Mutex<Core>,
    pub(crate) cpu: Cpu,
    pub(crate) fs: Arc<FsImage>,
    pub(crate) programs: ProgramSet,
    pub(crate) terminal: Arc<TerminalDriver>,
    pub(crate) rtc: Arc<RtcDriver>,
    pub(crate) sound: Arc<SoundDriver>,
    pub(crate) stdin_ops: Arc<dyn FileOps>,
    pub(crate) stdout_ops: Arc<dyn FileOps>,
    ticks: AtomicU64,
}

impl Kernel {
    pub fn new(fs: FsImage, programs: ProgramSet) -> Arc<Self> {
        install_exit_hook();
        let terminal = TerminalDriver::new();
        let stdin_ops: Arc<dyn FileOps> = Arc::new(TermInput {
            driver: terminal.clone(),
        });
        let stdout_ops: Arc<dyn FileOps> = Arc::new(TermOutput {
            driver: terminal.clone(),
        });
        Arc::new(Self {
            core: spin::Mutex::new(Core::new()),
            cpu: Cpu::new(),
            fs: Arc::new(fs),
            programs,
            terminal,
            rtc: RtcDriver::new(),
            sound: SoundDriver::new(),
            stdin_ops,
            stdout_ops,
            ticks: AtomicU64::new(0),
        })
    }

    /// Bring up terminal 0 and hand the CPU to its shell.
    pub fn boot(self: &Arc<Self>) {
        info!("boot: starting terminal 0");
        self.switch_terminal(0);
    }

    /// Make `terminal` the displayed session, launching its root shell on
    /// first visit. Display follows immediately; the new shell joins the
    /// scheduler rotation (or takes the CPU if it was idle).
    pub fn switch_terminal(self: &Arc<Self>, terminal: usize) {
        self.terminal.set_foreground(terminal);
        let staged = {
            let mut core = self.core.lock();
            if core.sched.depth(terminal) > 0 {
                None
            } else {
                match core.stage_process(
                    &self.fs,
                    terminal,
                    None,
                    ROOT_COMMAND,
                    self.stdin_ops.clone(),
                    self.stdout_ops.clone(),
                ) {
                    Ok(staged) => Some(staged),
                    Err(e) => {
                        warn!("terminal {terminal}: cannot start {ROOT_COMMAND}: {e}");
                        None
                    }
                }
            }
        };
        if let Some(staged) = staged {
            self.spawn_process(staged);
            if self.cpu.current().is_none() {
                self.core.lock().switch_to(staged.pid, terminal);
                self.cpu.set_current(Some(staged.pid));
            }
        }
    }

    /// Spawn the OS thread that carries a staged process.
    pub(crate) fn spawn_process(self: &Arc<Self>, staged: StagedProcess) {
        let kernel = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("pid-{}", staged.pid.0))
            .spawn(move || kernel.run_process(staged));
        if let Err(e) = spawned {
            error!("pid {}: thread spawn failed: {e}", staged.pid.0);
        }
    }

    /// Thread trampoline: wait to be scheduled, run the program body, and
    /// catch its unwind. A `ProcessExit` payload is a voluntary halt;
    /// anything else is a fault and goes through signal delivery.
    fn run_process(self: &Arc<Self>, staged: StagedProcess) {
        let handle = ProcHandle::new(Arc::clone(self), staged.pid);
        let body = self.programs.get(staged.entry);
        // The first crossing is inside the catch: a signal may already be
        // pending when the process is first scheduled.
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            handle.wait_start();
            match &body {
                Some(body) => body(&handle),
                None => {
                    warn!(
                        "pid {}: no program registered for entry {}",
                        staged.pid.0, staged.entry
                    );
                    -1
                }
            }
        }));
        let status = match outcome {
            Ok(code) => code as u8,
            Err(payload) => match payload.downcast_ref::<ProcessExit>() {
                Some(exit) => exit.status,
                None => self.fault(&handle, payload),
            },
        };
        self.finish_halt(staged.pid, status);
    }

    /// A panic escaped user code: classify it, run the user's handler if one
    /// is installed, and terminate with the exception status either way.
    fn fault(&self, handle: &ProcHandle, payload: Box<dyn Any + Send>) -> u8 {
        let signal = classify_fault(payload.as_ref());
        warn!("pid {}: fault, delivering {signal:?}", handle.pid().0);
        let disposition = {
            let core = self.core.lock();
            match core.table.get(handle.pid()) {
                Some(pcb) => pcb.handlers[signal as usize],
                None => SignalDisposition::Default,
            }
        };
        if let SignalDisposition::Handler(handler) = disposition {
            match catch_unwind(AssertUnwindSafe(|| handler(handle, signal))) {
                Ok(()) => {}
                Err(second) => {
                    if let Some(exit) = second.downcast_ref::<ProcessExit>() {
                        return exit.status;
                    }
                }
            }
        }
        EXCEPTION_STATUS
    }

    /// The real halt: free the PCB, close its descriptors, pop the terminal
    /// stack, and pass the CPU to the parent (with the exit status) or to a
    /// relaunched root shell.
    pub(crate) fn finish_halt(self: &Arc<Self>, pid: Pid, status: u8) {
        enum AfterHalt {
            HandOff(Pid),
            Relaunch(StagedProcess),
            Idle,
        }

        let foreground = self.terminal.foreground();
        let after = {
            let mut core = self.core.lock();
            let Some(pcb) = core.table.remove(pid) else {
                return;
            };
            for entry in pcb.files.iter().flatten() {
                let mut ctx = entry.ctx;
                let _ = entry.ops.close(&mut ctx);
            }
            let popped = core.sched.pop(pcb.terminal);
            debug_assert_eq!(popped, Some(pid));
            info!("pid {} ({}) halted with status {status}", pid.0, pcb.name);

            if pcb.parent != pid {
                core.switch_to(pcb.parent, foreground);
                AfterHalt::HandOff(pcb.parent)
            } else {
                // Root of its terminal; the session always keeps a shell.
                match core.stage_process(
                    &self.fs,
                    pcb.terminal,
                    None,
                    ROOT_COMMAND,
                    self.stdin_ops.clone(),
                    self.stdout_ops.clone(),
                ) {
                    Ok(staged) => {
                        core.switch_to(staged.pid, foreground);
                        AfterHalt::Relaunch(staged)
                    }
                    Err(e) => {
                        error!("terminal {}: cannot relaunch {ROOT_COMMAND}: {e}", pcb.terminal);
                        AfterHalt::Idle
                    }
                }
            }
        };
        match after {
            AfterHalt::HandOff(parent) => self.cpu.hand_off_exit(pid, status, Some(parent)),
            AfterHalt::Relaunch(staged) => {
                self.spawn_process(staged);
                self.cpu.set_current(Some(staged.pid));
            }
            AfterHalt::Idle => self.cpu.set_current(None),
        }
    }

    /// Timer interrupt: rotate the CPU to the next busy terminal's top
    /// process. Re-points the program window, kernel stack, and video page
    /// before the token moves.
    pub fn timer_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let foreground = self.terminal.foreground();
        let next = {
            let mut core = self.core.lock();
            let Some(next_terminal) = core.sched.next_running() else {
                return;
            };
            let Some(next_pid) = core.sched.top(next_terminal) else {
                return;
            };
            if next_terminal == core.sched.running() && self.cpu.current() == Some(next_pid) {
                return;
            }
            core.switch_to(next_pid, foreground);
            next_pid
        };
        debug!("timer: switching to pid {}", next.0);
        self.cpu.set_current(Some(next));
    }

    /// RTC interrupt: credit every terminal's virtual clock channel.
    pub fn rtc_tick(&self) {
        self.rtc.tick();
    }

    /// One byte of keyboard input for the foreground terminal.
    pub fn key_event(self: &Arc<Self>, byte: u8) {
        match self.terminal.push_byte(byte) {
            KeyEvent::None => {}
            KeyEvent::Interrupt => {
                let foreground = self.terminal.foreground();
                let mut core = self.core.lock();
                if let Some(pid) = core.sched.top(foreground) {
                    if let Some(pcb) = core.table.get_mut(pid) {
                        info!("pid {}: interrupt requested from keyboard", pid.0);
                        pcb.pending = Some(Signal::Interrupt);
                    }
                }
            }
            KeyEvent::Switch(terminal) => self.switch_terminal(terminal),
        }
    }

    /// Mark `signal` pending on a process; delivery happens at its next
    /// kernel crossing. Returns false if the pid is not live.
    pub fn send_signal(&self, pid: usize, signal: Signal) -> bool {
        let mut core = self.core.lock();
        match core.table.get_mut(Pid(pid)) {
            Some(pcb) => {
                pcb.pending = Some(signal);
                true
            }
            None => false,
        }
    }

    // ===== Introspection =====

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn current_pid(&self) -> Option<usize> {
        self.cpu.current().map(|pid| pid.0)
    }

    pub fn running_terminal(&self) -> usize {
        self.core.lock().sched.running()
    }

    pub fn foreground_terminal(&self) -> usize {
        self.terminal.foreground()
    }

    pub fn terminal_stack(&self, terminal: usize) -> Vec<usize> {
        let core = self.core.lock();
        core.sched.stack(terminal).iter().map(|pid| pid.0).collect()
    }

    pub fn process_in_use(&self, pid: usize) -> bool {
        self.core.lock().table.in_use(Pid(pid))
    }

    pub fn live_processes(&self) -> usize {
        self.core.lock().table.live_count()
    }

    pub fn tlb_generation(&self) -> u64 {
        self.core.lock().space.tlb_generation()
    }

    pub fn terminal(&self) -> &Arc<TerminalDriver> {
        &self.terminal
    }

    pub fn rtc(&self) -> &Arc<RtcDriver> {
        &self.rtc
    }

    pub fn sound(&self) -> &Arc<SoundDriver> {
        &self.sound
    }
}

/// Process threads leave via unwinding; keep the default panic printer from
/// treating a voluntary halt or a user fault as a kernel crash.
fn install_exit_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<ProcessExit>().is_some() {
                return;
            }
            let on_process_thread = thread::current()
                .name()
                .is_some_and(|name| name.starts_with("pid-"));
            if on_process_thread {
                return;
            }
            previous(info);
        }));
    });
}
