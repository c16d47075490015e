//! Process control blocks, the fixed-size process table, and per-process
//! kernel stack bookkeeping.

pub mod kstack;
pub mod pcb;
pub mod table;

pub use kstack::{KernelStack, Tss};
pub use pcb::{FdEntry, Pcb, Pid};
pub use table::ProcessTable;
