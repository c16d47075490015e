//! Process, virtual-memory, and scheduling core of a three-terminal
//! teaching kernel, realized as a hosted library.
//!
//! Every process is an OS thread gated on a single CPU token, so exactly one
//! runs at a time and the round-robin scheduler decides which. Kernel state
//! lives behind one spinlock; user code reaches the kernel only through the
//! [`common::Syscalls`] trait.

pub mod kcore;
pub mod klog;
pub mod mm;
pub mod process;
pub mod sched;
pub mod signal;
pub mod syscall;

pub use kcore::Kernel;
