//! Program bodies. Each runs on its process's thread and sees the kernel
//! only through the syscall surface it is handed.

use common::{Signal, Syscalls};
use log::debug;

/// The command interpreter at the root of every terminal.
pub fn shell(sys: &dyn Syscalls) -> i32 {
    let mut line = [0u8; 128];
    loop {
        sys.write(1, b"391OS> ");
        let n = sys.read(0, &mut line);
        if n <= 0 {
            continue;
        }
        let text = str::from_utf8(&line[..n as usize]).unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        if text == "exit" {
            sys.halt(0);
        }
        match sys.execute(text) {
            -1 => {
                sys.write(1, b"no such command\n");
            }
            256 => {
                sys.write(1, b"program terminated by exception\n");
            }
            status => debug!("shell: {text:?} exited with {status}"),
        }
    }
}

pub fn hello(sys: &dyn Syscalls) -> i32 {
    sys.write(1, b"Hello, world!\n");
    0
}

/// Print the file named in the argument string.
pub fn cat(sys: &dyn Syscalls) -> i32 {
    let mut args = [0u8; 101];
    if sys.getargs(&mut args) != 0 {
        sys.write(1, b"cat: need a file name\n");
        return 1;
    }
    let end = args.iter().position(|&b| b == 0).unwrap_or(args.len());
    let name = str::from_utf8(&args[..end]).unwrap_or("");
    let fd = sys.open(name);
    if fd < 0 {
        sys.write(1, b"cat: no such file\n");
        return 1;
    }
    let mut buf = [0u8; 1024];
    loop {
        let n = sys.read(fd, &mut buf);
        if n <= 0 {
            break;
        }
        sys.write(1, &buf[..n as usize]);
    }
    sys.close(fd);
    0
}

/// List the flat directory, one name per line.
pub fn ls(sys: &dyn Syscalls) -> i32 {
    let fd = sys.open(".");
    if fd < 0 {
        return 1;
    }
    let mut name = [0u8; 32];
    loop {
        let n = sys.read(fd, &mut name);
        if n <= 0 {
            break;
        }
        sys.write(1, &name[..n as usize]);
        sys.write(1, b"\n");
    }
    sys.close(fd);
    0
}

/// Count off eight clock ticks at 8 Hz.
pub fn counter(sys: &dyn Syscalls) -> i32 {
    let fd = sys.open("rtc");
    if fd < 0 {
        return 1;
    }
    sys.write(fd, &8u32.to_le_bytes());
    for digit in b'0'..=b'7' {
        sys.read(fd, &mut []);
        sys.write(1, &[digit]);
    }
    sys.write(1, b"\n");
    sys.close(fd);
    0
}

fn report_div_zero(sys: &dyn Syscalls, _signal: Signal) {
    sys.write(1, b"caught a divide error\n");
}

/// Install a divide-error handler, then divide by zero. The handler runs
/// and the process still terminates by exception.
pub fn sigtest(sys: &dyn Syscalls) -> i32 {
    sys.set_handler(Signal::DivZero as u32, Some(report_div_zero));
    let zero = std::hint::black_box(0i32);
    100 / zero
}

/// Stream the bundled wave file to the sound device.
pub fn beep(sys: &dyn Syscalls) -> i32 {
    if sys.play("halfnote.wav") == 0 {
        0
    } else {
        sys.write(1, b"beep: playback failed\n");
        1
    }
}
