//! In-memory read-only filesystem image.
//!
//! The kernel treats this as an opaque collaborator: name- and index-based
//! directory lookup plus a byte-range read over an inode's data. Names are
//! significant to 32 bytes, matching the fixed-size directory entry record.

use std::sync::Arc;

use common::limits::{ENTRY_OFFSET, EXEC_MAGIC, MAX_DENTRIES, NAME_MAX};
use common::{FileOps, FileType, KError, KResult, OpenContext};

/// A directory entry: name, type tag, inode number.
#[derive(Debug, Clone)]
pub struct Dentry {
    name: String,
    ftype: FileType,
    inode: u32,
}

impl Dentry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ftype(&self) -> FileType {
        self.ftype
    }

    pub fn inode(&self) -> u32 {
        self.inode
    }
}

/// The assembled image: a flat directory plus one data blob per inode.
#[derive(Default)]
pub struct FsImage {
    dentries: Vec<Dentry>,
    inodes: Vec<Vec<u8>>,
}

// Names compare on their first 32 bytes, like the on-disk record would.
fn name_key(name: &str) -> &[u8] {
    let bytes = name.as_bytes();
    &bytes[..bytes.len().min(NAME_MAX)]
}

impl FsImage {
    /// Lookup names longer than the 32-byte record never resolve.
    pub fn read_dentry_by_name(&self, name: &str) -> KResult<&Dentry> {
        if name.len() > NAME_MAX {
            return Err(KError::NoSuchFile);
        }
        self.dentries
            .iter()
            .find(|d| name_key(&d.name) == name.as_bytes())
            .ok_or(KError::NoSuchFile)
    }

    pub fn read_dentry_by_index(&self, index: usize) -> KResult<&Dentry> {
        self.dentries.get(index).ok_or(KError::NoSuchFile)
    }

    pub fn dentry_count(&self) -> usize {
        self.dentries.len()
    }

    /// Copy up to `buf.len()` bytes starting at `offset` of the inode's
    /// data. Returns the number copied; 0 at or past end-of-file.
    pub fn read_data(&self, inode: u32, offset: usize, buf: &mut [u8]) -> KResult<usize> {
        let data = self.data(inode)?;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    /// The full data of an inode.
    pub fn data(&self, inode: u32) -> KResult<&[u8]> {
        self.inodes
            .get(inode as usize)
            .map(Vec::as_slice)
            .ok_or(KError::NoSuchFile)
    }

    pub fn file_len(&self, inode: u32) -> KResult<usize> {
        Ok(self.data(inode)?.len())
    }
}

/// Builder for assembling images in tests and at boot.
#[derive(Default)]
pub struct FsImageBuilder {
    image: FsImage,
}

impl FsImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, ftype: FileType, inode: u32) {
        assert!(
            self.image.dentries.len() < MAX_DENTRIES,
            "directory full ({MAX_DENTRIES} entries)"
        );
        self.image.dentries.push(Dentry {
            name: name.to_owned(),
            ftype,
            inode,
        });
    }

    fn push_inode(&mut self, data: Vec<u8>) -> u32 {
        self.image.inodes.push(data);
        (self.image.inodes.len() - 1) as u32
    }

    /// Add a directory entry (the conventional name is `.`).
    pub fn directory(mut self, name: &str) -> Self {
        self.push(name, FileType::Directory, 0);
        self
    }

    /// Add an RTC device file.
    pub fn rtc(mut self, name: &str) -> Self {
        self.push(name, FileType::Rtc, 0);
        self
    }

    /// Add a regular data file.
    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        let inode = self.push_inode(data.to_vec());
        self.push(name, FileType::Regular, inode);
        self
    }

    /// Add an executable: magic header, entry-point value at offset 24.
    pub fn executable(mut self, name: &str, entry: u32) -> Self {
        let mut data = vec![0u8; ENTRY_OFFSET + 4];
        data[..4].copy_from_slice(&EXEC_MAGIC);
        data[ENTRY_OFFSET..ENTRY_OFFSET + 4].copy_from_slice(&entry.to_le_bytes());
        let inode = self.push_inode(data);
        self.push(name, FileType::Regular, inode);
        self
    }

    pub fn build(self) -> FsImage {
        self.image
    }
}

/// Operations vector for an open regular file: sequential reads through the
/// descriptor's byte cursor. The image is read-only, so writes fail.
pub struct RegularFile {
    pub fs: Arc<FsImage>,
}

impl FileOps for RegularFile {
    fn read(&self, ctx: &mut OpenContext, buf: &mut [u8]) -> KResult<usize> {
        let n = self.fs.read_data(ctx.inode, ctx.pos, buf)?;
        ctx.pos += n;
        Ok(n)
    }

    fn write(&self, _ctx: &mut OpenContext, _buf: &[u8]) -> KResult<usize> {
        Err(KError::NotSupported)
    }
}

/// Operations vector for an open directory: each read yields one entry's
/// name (clipped to 32 bytes), walking the directory in order.
pub struct DirectoryFile {
    pub fs: Arc<FsImage>,
}

impl FileOps for DirectoryFile {
    fn read(&self, ctx: &mut OpenContext, buf: &mut [u8]) -> KResult<usize> {
        let Ok(dentry) = self.fs.read_dentry_by_index(ctx.pos) else {
            return Ok(0);
        };
        ctx.pos += 1;
        let name = name_key(dentry.name());
        let n = buf.len().min(name.len());
        buf[..n].copy_from_slice(&name[..n]);
        Ok(n)
    }

    fn write(&self, _ctx: &mut OpenContext, _buf: &[u8]) -> KResult<usize> {
        Err(KError::NotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> FsImage {
        FsImageBuilder::new()
            .directory(".")
            .rtc("rtc")
            .file("frame0.txt", b"a fish")
            .executable("shell", 3)
            .build()
    }

    #[test]
    fn lookup_by_name() {
        let img = image();
        let d = img.read_dentry_by_name("frame0.txt").unwrap();
        assert_eq!(d.ftype(), FileType::Regular);
        assert_eq!(img.data(d.inode()).unwrap(), b"a fish");
    }

    #[test]
    fn lookup_missing_name_fails() {
        assert_eq!(
            image().read_dentry_by_name("nope").unwrap_err(),
            KError::NoSuchFile
        );
    }

    #[test]
    fn names_are_significant_to_32_bytes() {
        let long = "x".repeat(40);
        let img = FsImageBuilder::new().file(&long, b"data").build();
        // The stored record keeps 32 significant bytes; a full-length key
        // reaches it, an overlong lookup name never resolves.
        assert!(img.read_dentry_by_name(&"x".repeat(32)).is_ok());
        assert_eq!(
            img.read_dentry_by_name(&"x".repeat(33)).unwrap_err(),
            KError::NoSuchFile
        );
        assert_eq!(
            img.read_dentry_by_name(&long).unwrap_err(),
            KError::NoSuchFile
        );
    }

    #[test]
    fn lookup_by_index_walks_directory_order() {
        let img = image();
        assert_eq!(img.read_dentry_by_index(0).unwrap().name(), ".");
        assert_eq!(img.read_dentry_by_index(3).unwrap().name(), "shell");
        assert!(img.read_dentry_by_index(4).is_err());
    }

    #[test]
    fn read_data_honors_offset_and_eof() {
        let img = image();
        let inode = img.read_dentry_by_name("frame0.txt").unwrap().inode();
        let mut buf = [0u8; 4];
        assert_eq!(img.read_data(inode, 2, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"fish");
        assert_eq!(img.read_data(inode, 6, &mut buf).unwrap(), 0);
        assert_eq!(img.read_data(inode, 100, &mut buf).unwrap(), 0);
    }

    #[test]
    fn regular_file_reads_advance_the_cursor() {
        let fs = Arc::new(image());
        let inode = fs.read_dentry_by_name("frame0.txt").unwrap().inode();
        let file = RegularFile { fs };
        let mut ctx = OpenContext {
            inode,
            pos: 0,
            terminal: 0,
        };
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut ctx, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"a fi");
        assert_eq!(file.read(&mut ctx, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"sh");
        assert_eq!(file.read(&mut ctx, &mut buf).unwrap(), 0);
        assert_eq!(
            file.write(&mut ctx, b"x").unwrap_err(),
            KError::NotSupported
        );
    }

    #[test]
    fn directory_reads_list_names_in_order() {
        let fs = Arc::new(image());
        let dir = DirectoryFile { fs };
        let mut ctx = OpenContext {
            inode: 0,
            pos: 0,
            terminal: 0,
        };
        let mut names = Vec::new();
        let mut buf = [0u8; NAME_MAX];
        loop {
            let n = dir.read(&mut ctx, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            names.push(String::from_utf8_lossy(&buf[..n]).into_owned());
        }
        assert_eq!(names, [".", "rtc", "frame0.txt", "shell"]);
    }

    #[test]
    fn executable_layout() {
        let img = image();
        let d = img.read_dentry_by_name("shell").unwrap();
        let data = img.data(d.inode()).unwrap();
        assert_eq!(&data[..4], &EXEC_MAGIC);
        let entry = u32::from_le_bytes(data[ENTRY_OFFSET..ENTRY_OFFSET + 4].try_into().unwrap());
        assert_eq!(entry, 3);
    }
}
