use std::sync::Arc;

/// The five recognized signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    DivZero = 0,
    Segfault = 1,
    Interrupt = 2,
    Alarm = 3,
    User1 = 4,
}

impl Signal {
    pub const COUNT: usize = 5;

    pub fn from_number(n: u32) -> Option<Signal> {
        match n {
            0 => Some(Signal::DivZero),
            1 => Some(Signal::Segfault),
            2 => Some(Signal::Interrupt),
            3 => Some(Signal::Alarm),
            4 => Some(Signal::User1),
            _ => None,
        }
    }
}

/// A user-installed signal handler. Runs on the receiving process with its
/// syscall surface available; returning normally does not resume interrupted
/// user state (there is no sigreturn), so a handler that wants the process to
/// survive must simply return and let the process's normal control flow
/// continue from its next kernel crossing.
pub type SignalHandlerFn = fn(&dyn Syscalls, Signal);

/// The kernel entry points available to user code.
///
/// Results follow the trap-gate convention: negative is failure, zero or
/// positive is success (for `read`/`write`, the byte count; zero means
/// end-of-data).
pub trait Syscalls: Send + Sync {
    /// Terminate the calling process. Never returns.
    fn halt(&self, status: u8) -> !;

    /// Launch `command` and block until it halts; returns its exit status,
    /// or 256 when it was terminated by an exception.
    fn execute(&self, command: &str) -> i32;

    fn read(&self, fd: i32, buf: &mut [u8]) -> i32;

    fn write(&self, fd: i32, buf: &[u8]) -> i32;

    fn open(&self, name: &str) -> i32;

    fn close(&self, fd: i32) -> i32;

    /// Copy the argument text of the command that launched this process.
    fn getargs(&self, buf: &mut [u8]) -> i32;

    /// Map the video window; writes its fixed virtual address (as a 4-byte
    /// value) at user address `screen_start`, which must lie inside the
    /// caller's program window. Returns that address on success.
    fn vidmap(&self, screen_start: usize) -> i32;

    /// Install (or, with `None`, reset) the handler for `signum`.
    fn set_handler(&self, signum: u32, handler: Option<SignalHandlerFn>) -> i32;

    /// Unimplemented; always fails.
    fn sigreturn(&self) -> i32;

    /// Stream a RIFF/WAVE file to the sound device.
    fn play(&self, name: &str) -> i32;
}

/// A user program body. In the hosted model the 4-byte entry-point value in
/// an executable image is an index into the registry rather than a virtual
/// address; the body runs on the process's thread with the syscall surface
/// as its only way to reach the kernel. The returned value becomes the halt
/// status.
pub type ProgramBody = Arc<dyn Fn(&dyn Syscalls) -> i32 + Send + Sync>;

/// Registry mapping entry-point values to program bodies.
#[derive(Default)]
pub struct ProgramSet {
    bodies: Vec<ProgramBody>,
}

impl ProgramSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a body; the returned id is the entry-point value to store at
    /// offset 24 of the matching executable image.
    pub fn register(&mut self, body: ProgramBody) -> u32 {
        self.bodies.push(body);
        (self.bodies.len() - 1) as u32
    }

    pub fn get(&self, entry: u32) -> Option<ProgramBody> {
        self.bodies.get(entry as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}
