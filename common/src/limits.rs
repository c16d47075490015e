//! Build-time limits and the fixed memory map.

/// Maximum live processes system-wide.
pub const MAX_TASK: usize = 6;

/// File descriptors per process. 0 and 1 are terminal-bound.
pub const MAX_FD: usize = 8;

/// First file descriptor assignable by `open`.
pub const MIN_FD: usize = 2;

/// Number of virtual terminal sessions.
pub const MAX_TERMINAL_NUM: usize = 3;

/// Argument string capacity in a PCB.
pub const ARG_MAX: usize = 100;

/// Filename capacity in a directory entry.
pub const NAME_MAX: usize = 32;

/// Terminal input line capacity.
pub const LINE_MAX: usize = 128;

pub const SCREEN_COLUMNS: usize = 80;
pub const SCREEN_ROWS: usize = 25;

pub const FOUR_KB: usize = 4096;
pub const EIGHT_KB: usize = 8192;
pub const FOUR_MB: usize = 0x0040_0000;
pub const EIGHT_MB: usize = 0x0080_0000;

/// Virtual base of every process's 4MB program window (128MB).
pub const USER_BASE: usize = 0x0800_0000;

/// Fixed load address of a program image inside its window.
pub const PROGRAM_LOAD: usize = 0x0804_8000;

/// Initial user stack pointer: top of the program window, minus one word.
pub const USER_STACK_TOP: usize = USER_BASE + FOUR_MB - 4;

/// Physical address of video memory.
pub const VIDEO_MEM: usize = 0x000B_8000;

/// Fixed virtual address of the shared user video window (208MB).
pub const USER_VIDEO: usize = USER_BASE + EIGHT_MB * 10;

/// Physical base of a process's program window.
pub const fn program_phys_base(pid: usize) -> usize {
    EIGHT_MB + pid * FOUR_MB
}

/// Physical address of a terminal's off-screen frame buffer.
pub const fn terminal_buffer(terminal: usize) -> usize {
    VIDEO_MEM + FOUR_KB * (terminal + 1)
}

/// Executable header magic at file offset 0.
pub const EXEC_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// File offset of the 4-byte entry-point value.
pub const ENTRY_OFFSET: usize = 24;

/// Internal halt status used when a process is killed by an exception.
pub const EXCEPTION_STATUS: u8 = 0x0F;

/// What `execute` reports when its child died from an exception.
pub const EXCEPTION_RETURN: i32 = 256;

/// Base rate of the real-time clock, in Hz.
pub const RTC_BASE_HZ: u32 = 1024;

/// Maximum directory entries in a filesystem image.
pub const MAX_DENTRIES: usize = 63;
