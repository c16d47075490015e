//! Shared contracts between the kernel, its device collaborators, and user
//! programs: build-time limits, the kernel error type, the four-operation
//! file vector, and the syscall surface.

pub mod error;
pub mod limits;
pub mod ops;
pub mod syscalls;

pub use error::{KError, KResult};
pub use ops::{FileOps, FileType, OpenContext};
pub use syscalls::{ProgramBody, ProgramSet, Signal, SignalHandlerFn, Syscalls};
