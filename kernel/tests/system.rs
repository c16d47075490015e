//! End-to-end scenarios driving the kernel the way the demo binary does:
//! real process threads, keyboard bytes in, screen text out.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{ProgramBody, ProgramSet, Syscalls};
use devices::fsimg::FsImageBuilder;
use kernel::Kernel;

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

/// A root program that launches `child`, records the status it reports,
/// then parks forever.
fn recording_fixture(child_body: ProgramBody) -> (Arc<Kernel>, Arc<Mutex<Vec<i32>>>) {
    let results = Arc::new(Mutex::new(Vec::new()));
    let recorded = results.clone();
    let mut programs = ProgramSet::new();
    let root = programs.register(Arc::new(move |sys: &dyn Syscalls| {
        let status = sys.execute("child");
        recorded.lock().unwrap().push(status);
        loop {
            thread::park();
        }
    }));
    let child = programs.register(child_body);
    let fs = FsImageBuilder::new()
        .executable("shell", root)
        .executable("child", child)
        .build();
    (Kernel::new(fs, programs), results)
}

#[test]
fn execute_reports_the_child_exit_status() {
    let (kernel, results) = recording_fixture(Arc::new(|_: &dyn Syscalls| 42));
    kernel.boot();
    assert!(wait_for(|| results.lock().unwrap().as_slice() == [42]));
    assert_eq!(kernel.live_processes(), 1);
    assert_eq!(kernel.terminal_stack(0).len(), 1);
}

#[test]
fn exception_in_the_child_reports_256() {
    let (kernel, results) = recording_fixture(Arc::new(|_: &dyn Syscalls| {
        let zero = std::hint::black_box(0i32);
        100 / zero
    }));
    kernel.boot();
    assert!(wait_for(|| results.lock().unwrap().as_slice() == [256]));
    assert_eq!(kernel.live_processes(), 1);
}

#[test]
fn ctrl_c_terminates_a_blocked_reader() {
    let (kernel, results) = recording_fixture(Arc::new(|sys: &dyn Syscalls| {
        let mut buf = [0u8; 16];
        sys.read(0, &mut buf);
        7
    }));
    kernel.boot();
    assert!(wait_for(|| kernel.live_processes() == 2));
    kernel.key_event(devices::terminal::KEY_INTERRUPT);
    // Killed by the interrupt's default action, not a normal return.
    assert!(wait_for(|| results.lock().unwrap().as_slice() == [0]));
    assert_eq!(kernel.live_processes(), 1);
}

fn type_line(kernel: &Arc<Kernel>, text: &str) {
    for b in text.bytes() {
        kernel.key_event(b);
    }
    kernel.key_event(b'\n');
}

#[test]
fn shell_runs_a_command_end_to_end() {
    let (fs, programs) = user::userland();
    let kernel = Kernel::new(fs, programs);
    kernel.boot();
    assert!(wait_for(|| kernel.terminal().screen_text(0).contains("391OS> ")));
    type_line(&kernel, "hello");
    assert!(wait_for(|| {
        kernel.terminal().screen_text(0).contains("Hello, world!")
    }));
    // The shell survives and prompts again.
    assert!(wait_for(|| {
        kernel.terminal().screen_text(0).matches("391OS> ").count() >= 2
    }));
    assert_eq!(kernel.live_processes(), 1);
}

#[test]
fn fault_handler_runs_before_the_process_dies() {
    let (fs, programs) = user::userland();
    let kernel = Kernel::new(fs, programs);
    kernel.boot();
    assert!(wait_for(|| kernel.terminal().screen_text(0).contains("391OS> ")));
    type_line(&kernel, "sigtest");
    assert!(wait_for(|| {
        let screen = kernel.terminal().screen_text(0);
        screen.contains("caught a divide error")
            && screen.contains("program terminated by exception")
    }));
    assert_eq!(kernel.live_processes(), 1);
}

#[test]
fn terminal_switch_starts_a_second_shell() {
    let (fs, programs) = user::userland();
    let kernel = Kernel::new(fs, programs);
    kernel.boot();
    {
        // Preemption source; both shells block on input between slices.
        let kernel = kernel.clone();
        thread::spawn(move || {
            loop {
                thread::sleep(Duration::from_millis(1));
                kernel.timer_tick();
            }
        });
    }
    assert!(wait_for(|| kernel.terminal().screen_text(0).contains("391OS> ")));

    kernel.switch_terminal(1);
    assert_eq!(kernel.foreground_terminal(), 1);
    assert!(wait_for(|| kernel.live_processes() == 2));
    assert!(wait_for(|| kernel.terminal().screen_text(1).contains("391OS> ")));

    type_line(&kernel, "hello");
    assert!(wait_for(|| {
        kernel.terminal().screen_text(1).contains("Hello, world!")
    }));
    assert!(!kernel.terminal().screen_text(0).contains("Hello, world!"));

    // Both busy terminals get scheduled.
    assert!(wait_for(|| kernel.running_terminal() == 0));
    assert!(wait_for(|| kernel.running_terminal() == 1));
}
