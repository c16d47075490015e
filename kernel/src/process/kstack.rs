use common::limits::EIGHT_KB;
use common::limits::EIGHT_MB;

use super::Pid;

/// A process's 8 KB kernel stack, carved top-down from the 8 MB kernel
/// region. Only the descriptor exists in the hosted model; real stack frames
/// live on the process's OS thread.
#[derive(Debug, Clone, Copy)]
pub struct KernelStack {
    pid: Pid,
}

impl KernelStack {
    pub fn new(pid: Pid) -> Self {
        Self { pid }
    }

    /// Privilege-transition stack pointer for this process.
    pub fn esp0(&self) -> usize {
        EIGHT_MB - self.pid.0 * EIGHT_KB - 4
    }
}

/// The task-state segment, reduced to the one field context switches touch.
#[derive(Debug, Default)]
pub struct Tss {
    pub esp0: usize,
}

impl Tss {
    pub fn load(&mut self, stack: &KernelStack) {
        self.esp0 = stack.esp0();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_descend_from_the_kernel_top() {
        assert_eq!(KernelStack::new(Pid(0)).esp0(), EIGHT_MB - 4);
        assert_eq!(KernelStack::new(Pid(1)).esp0(), EIGHT_MB - EIGHT_KB - 4);
        let a = KernelStack::new(Pid(4)).esp0();
        let b = KernelStack::new(Pid(5)).esp0();
        assert_eq!(a - b, EIGHT_KB);
    }

    #[test]
    fn tss_tracks_the_switched_in_stack() {
        let mut tss = Tss::default();
        tss.load(&KernelStack::new(Pid(3)));
        assert_eq!(tss.esp0, EIGHT_MB - 3 * EIGHT_KB - 4);
    }
}
