//! Terminal sessions: line-buffered input, a character screen per session,
//! and the `FileOps` vectors bound to every process's fd 0 and 1.
//!
//! Keystroke-to-character decoding happens upstream; this driver receives
//! plain bytes. A few control bytes carry events back to the caller (the
//! kernel decides what to do with them).

use std::collections::VecDeque;
use std::io::Write as _;
use std::sync::Arc;

use common::limits::{LINE_MAX, MAX_TERMINAL_NUM, SCREEN_COLUMNS, SCREEN_ROWS};
use common::{FileOps, KError, KResult, OpenContext};
use log::debug;

/// Ctrl-C: request termination of the foreground program.
pub const KEY_INTERRUPT: u8 = 0x03;
/// Ctrl-L: clear the foreground screen.
pub const KEY_CLEAR: u8 = 0x0C;
/// Bytes requesting a switch to terminal 0, 1, 2.
pub const KEY_SWITCH: [u8; MAX_TERMINAL_NUM] = [0xF1, 0xF2, 0xF3];

/// What a byte of input amounted to, beyond local echo/editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    None,
    /// Ctrl-C was pressed on the foreground terminal.
    Interrupt,
    /// A terminal-switch key was pressed.
    Switch(usize),
}

struct Session {
    screen: [u8; SCREEN_COLUMNS * SCREEN_ROWS],
    cursor_x: usize,
    cursor_y: usize,
    /// Line currently being typed.
    input: Vec<u8>,
    /// Completed lines not yet consumed by a reader.
    lines: VecDeque<Vec<u8>>,
}

impl Session {
    fn new() -> Self {
        Self {
            screen: [b' '; SCREEN_COLUMNS * SCREEN_ROWS],
            cursor_x: 0,
            cursor_y: 0,
            input: Vec::new(),
            lines: VecDeque::new(),
        }
    }

    fn clear(&mut self) {
        self.screen.fill(b' ');
        self.cursor_x = 0;
        self.cursor_y = 0;
    }

    fn scroll(&mut self) {
        self.screen.copy_within(SCREEN_COLUMNS.., 0);
        let last = SCREEN_COLUMNS * (SCREEN_ROWS - 1);
        self.screen[last..].fill(b' ');
    }

    fn newline(&mut self) {
        self.cursor_x = 0;
        self.cursor_y += 1;
        if self.cursor_y == SCREEN_ROWS {
            self.scroll();
            self.cursor_y = SCREEN_ROWS - 1;
        }
    }

    fn putc(&mut self, b: u8) {
        if b == b'\n' {
            self.newline();
            return;
        }
        self.screen[self.cursor_y * SCREEN_COLUMNS + self.cursor_x] = b;
        self.cursor_x += 1;
        if self.cursor_x == SCREEN_COLUMNS {
            self.newline();
        }
    }

    fn backspace(&mut self) {
        if self.input.pop().is_none() {
            return;
        }
        if self.cursor_x > 0 {
            self.cursor_x -= 1;
        } else if self.cursor_y > 0 {
            self.cursor_y -= 1;
            self.cursor_x = SCREEN_COLUMNS - 1;
        }
        self.screen[self.cursor_y * SCREEN_COLUMNS + self.cursor_x] = b' ';
    }
}

struct Inner {
    sessions: [Session; MAX_TERMINAL_NUM],
    foreground: usize,
    /// Echo foreground output to the host's stdout (demo binary).
    mirror: bool,
}

/// The terminal device: three fixed sessions, one of which is foreground.
pub struct TerminalDriver {
    inner: spin::Mutex<Inner>,
}

impl TerminalDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: spin::Mutex::new(Inner {
                sessions: core::array::from_fn(|_| Session::new()),
                foreground: 0,
                mirror: false,
            }),
        })
    }

    pub fn foreground(&self) -> usize {
        self.inner.lock().foreground
    }

    pub fn set_foreground(&self, terminal: usize) {
        assert!(terminal < MAX_TERMINAL_NUM);
        let mut inner = self.inner.lock();
        if inner.foreground != terminal {
            debug!("terminal: foreground {} -> {}", inner.foreground, terminal);
            inner.foreground = terminal;
        }
    }

    pub fn set_mirror(&self, on: bool) {
        self.inner.lock().mirror = on;
    }

    /// Feed one byte of input to the foreground session.
    pub fn push_byte(&self, b: u8) -> KeyEvent {
        if let Some(id) = KEY_SWITCH.iter().position(|&k| k == b) {
            return KeyEvent::Switch(id);
        }
        let mut inner = self.inner.lock();
        let mirror = inner.mirror;
        let fg = inner.foreground;
        let session = &mut inner.sessions[fg];
        match b {
            KEY_INTERRUPT => return KeyEvent::Interrupt,
            KEY_CLEAR => session.clear(),
            0x08 | 0x7F => session.backspace(),
            b'\n' | b'\r' => {
                session.putc(b'\n');
                let mut line = core::mem::take(&mut session.input);
                line.push(b'\n');
                session.lines.push_back(line);
                if mirror {
                    host_echo(b"\n");
                }
            }
            0x20..=0x7E => {
                // One byte is reserved for the trailing newline.
                if session.input.len() < LINE_MAX - 1 {
                    session.input.push(b);
                    session.putc(b);
                    if mirror {
                        host_echo(&[b]);
                    }
                }
            }
            _ => {}
        }
        KeyEvent::None
    }

    /// Take a completed input line for `terminal`. Input is only served to
    /// the foreground session's reader; a background reader sees nothing
    /// until its terminal is brought forward.
    pub fn read_line(&self, terminal: usize) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock();
        if terminal != inner.foreground {
            return None;
        }
        inner.sessions[terminal].lines.pop_front()
    }

    /// Render bytes to `terminal`'s screen. Background writes land in that
    /// session's off-screen buffer; foreground writes are also mirrored to
    /// the host when enabled.
    pub fn write(&self, terminal: usize, buf: &[u8]) -> usize {
        let mut inner = self.inner.lock();
        let echo = inner.mirror && terminal == inner.foreground;
        let session = &mut inner.sessions[terminal];
        for &b in buf {
            session.putc(b);
        }
        if echo {
            host_echo(buf);
        }
        buf.len()
    }

    /// Screen contents as rows of text (tests and the demo renderer).
    pub fn screen_text(&self, terminal: usize) -> String {
        let inner = self.inner.lock();
        let session = &inner.sessions[terminal];
        let mut out = String::new();
        for row in 0..SCREEN_ROWS {
            let line = &session.screen[row * SCREEN_COLUMNS..(row + 1) * SCREEN_COLUMNS];
            out.push_str(str::from_utf8(line).unwrap_or("").trim_end());
            out.push('\n');
        }
        out
    }

    pub fn cursor(&self, terminal: usize) -> (usize, usize) {
        let inner = self.inner.lock();
        let session = &inner.sessions[terminal];
        (session.cursor_x, session.cursor_y)
    }
}

fn host_echo(bytes: &[u8]) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(bytes);
    let _ = stdout.flush();
}

/// fd 0 of every process: line-oriented input from the owning session.
pub struct TermInput {
    pub driver: Arc<TerminalDriver>,
}

impl FileOps for TermInput {
    fn read(&self, ctx: &mut OpenContext, buf: &mut [u8]) -> KResult<usize> {
        match self.driver.read_line(ctx.terminal) {
            Some(line) => {
                let n = buf.len().min(line.len());
                buf[..n].copy_from_slice(&line[..n]);
                Ok(n)
            }
            None => Err(KError::WouldBlock),
        }
    }

    fn write(&self, _ctx: &mut OpenContext, _buf: &[u8]) -> KResult<usize> {
        Err(KError::NotSupported)
    }
}

/// fd 1 of every process: output to the owning session's screen.
pub struct TermOutput {
    pub driver: Arc<TerminalDriver>,
}

impl FileOps for TermOutput {
    fn read(&self, _ctx: &mut OpenContext, _buf: &mut [u8]) -> KResult<usize> {
        Err(KError::NotSupported)
    }

    fn write(&self, ctx: &mut OpenContext, buf: &[u8]) -> KResult<usize> {
        Ok(self.driver.write(ctx.terminal, buf))
    }
}
