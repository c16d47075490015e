use crate::error::{KError, KResult};

/// File kinds a directory entry can name. The tag values are part of the
/// filesystem image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Rtc = 0,
    Directory = 1,
    Regular = 2,
}

impl FileType {
    pub fn from_tag(tag: u32) -> Option<FileType> {
        match tag {
            0 => Some(FileType::Rtc),
            1 => Some(FileType::Directory),
            2 => Some(FileType::Regular),
            _ => None,
        }
    }
}

/// Per-descriptor state handed to an operation vector on every call.
///
/// `inode` is only meaningful for regular files; `pos` is the byte offset
/// cursor (directory entries count as one "byte" each for directory reads);
/// `terminal` identifies the owning process's session.
#[derive(Debug, Clone, Copy)]
pub struct OpenContext {
    pub inode: u32,
    pub pos: usize,
    pub terminal: usize,
}

/// The four-operation contract every device or file kind implements.
///
/// A file descriptor entry stores an `Arc<dyn FileOps>`; the dispatcher only
/// ever calls through it, never a device's internals.
pub trait FileOps: Send + Sync {
    fn open(&self, _ctx: &mut OpenContext) -> KResult<()> {
        Ok(())
    }

    fn read(&self, ctx: &mut OpenContext, buf: &mut [u8]) -> KResult<usize>;

    fn write(&self, ctx: &mut OpenContext, buf: &[u8]) -> KResult<usize>;

    fn close(&self, _ctx: &mut OpenContext) -> KResult<()> {
        Ok(())
    }
}

/// Operation vector whose every operation fails. Unbound descriptor slots
/// point here so a stale call can never reach a real device.
pub struct FailOps;

impl FileOps for FailOps {
    fn read(&self, _ctx: &mut OpenContext, _buf: &mut [u8]) -> KResult<usize> {
        Err(KError::NotSupported)
    }

    fn write(&self, _ctx: &mut OpenContext, _buf: &[u8]) -> KResult<usize> {
        Err(KError::NotSupported)
    }
}
