//! Interactive demo: boots the kernel with the stock user programs, drives
//! the timer and RTC from background threads, and forwards host stdin lines
//! to the foreground terminal.
//!
//! Host-side commands (not seen by the shell):
//!   !term N   switch the display to terminal N
//!   !screen   dump the foreground terminal's screen
//!   !quit     exit

use std::io::BufRead;
use std::thread;
use std::time::Duration;

use kernel::Kernel;
use log::LevelFilter;

fn main() {
    kernel::klog::init(LevelFilter::Info);

    let (fs, programs) = user::userland();
    let kernel = Kernel::new(fs, programs);
    kernel.terminal().set_mirror(true);
    kernel.boot();

    {
        let kernel = kernel.clone();
        thread::spawn(move || {
            loop {
                thread::sleep(Duration::from_millis(20));
                kernel.timer_tick();
            }
        });
    }
    {
        let kernel = kernel.clone();
        thread::spawn(move || {
            loop {
                thread::sleep(Duration::from_micros(977));
                kernel.rtc_tick();
            }
        });
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        match line.trim() {
            "!quit" => break,
            "!screen" => {
                let fg = kernel.foreground_terminal();
                print!("{}", kernel.terminal().screen_text(fg));
            }
            cmd if cmd.starts_with("!term ") => {
                match cmd["!term ".len()..].trim().parse::<usize>() {
                    Ok(t) if t < common::limits::MAX_TERMINAL_NUM => kernel.switch_terminal(t),
                    _ => eprintln!("no such terminal"),
                }
            }
            _ => {
                for b in line.bytes() {
                    kernel.key_event(b);
                }
                kernel.key_event(b'\n');
            }
        }
    }
}
