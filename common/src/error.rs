use core::fmt;

/// Kernel error type.
///
/// Every failure a syscall can report maps to one of these; the trap gate
/// flattens them all into the `-1` sentinel the user side sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KError {
    /// No directory entry with the requested name.
    NoSuchFile,
    /// Missing or malformed executable header.
    BadExecutable,
    /// All process slots are in use.
    OutOfTasks,
    /// All assignable file descriptors are in use.
    OutOfFds,
    /// Descriptor out of range or not open.
    BadFd,
    /// Argument rejected by validation.
    InvalidArgument,
    /// The operation vector does not support this operation.
    NotSupported,
    /// No data available yet; the caller should retry after yielding.
    /// Never escapes the dispatcher.
    WouldBlock,
}

pub type KResult<T> = Result<T, KError>;

impl fmt::Display for KError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KError::NoSuchFile => write!(f, "no such file"),
            KError::BadExecutable => write!(f, "not an executable"),
            KError::OutOfTasks => write!(f, "process table full"),
            KError::OutOfFds => write!(f, "file descriptor table full"),
            KError::BadFd => write!(f, "bad file descriptor"),
            KError::InvalidArgument => write!(f, "invalid argument"),
            KError::NotSupported => write!(f, "operation not supported"),
            KError::WouldBlock => write!(f, "would block"),
        }
    }
}
