//! The stock userland: program bodies plus the filesystem image that names
//! them. An executable's 4-byte entry value is an index into the returned
//! [`ProgramSet`].

pub mod programs;

use std::sync::Arc;

use common::{ProgramSet, Syscalls};
use devices::fsimg::{FsImage, FsImageBuilder};
use devices::sound::build_wave;

const FISH: &[u8] = b"     o\n  o   .\n   .    ><>\n    ><_>      <><\n  ~~~~~~~~~~~~~~~~~\n";

/// Build the boot filesystem and its program registry.
pub fn userland() -> (FsImage, ProgramSet) {
    let mut programs = ProgramSet::new();
    let shell = programs.register(Arc::new(|sys: &dyn Syscalls| programs::shell(sys)));
    let hello = programs.register(Arc::new(|sys: &dyn Syscalls| programs::hello(sys)));
    let cat = programs.register(Arc::new(|sys: &dyn Syscalls| programs::cat(sys)));
    let ls = programs.register(Arc::new(|sys: &dyn Syscalls| programs::ls(sys)));
    let counter = programs.register(Arc::new(|sys: &dyn Syscalls| programs::counter(sys)));
    let sigtest = programs.register(Arc::new(|sys: &dyn Syscalls| programs::sigtest(sys)));
    let beep = programs.register(Arc::new(|sys: &dyn Syscalls| programs::beep(sys)));

    let fs = FsImageBuilder::new()
        .directory(".")
        .rtc("rtc")
        .executable("shell", shell)
        .executable("hello", hello)
        .executable("cat", cat)
        .executable("ls", ls)
        .executable("counter", counter)
        .executable("sigtest", sigtest)
        .executable("beep", beep)
        .file("frame0.txt", FISH)
        .file("halfnote.wav", &build_wave(11025, 1, &[0x80; 2048]))
        .build();
    (fs, programs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::FileType;

    #[test]
    fn every_executable_names_a_registered_program() {
        let (fs, programs) = userland();
        for i in 0..fs.dentry_count() {
            let dentry = fs.read_dentry_by_index(i).unwrap();
            if dentry.ftype() != FileType::Regular {
                continue;
            }
            let data = fs.data(dentry.inode()).unwrap();
            if data.len() >= 4 && data[..4] == common::limits::EXEC_MAGIC {
                let entry = u32::from_le_bytes(
                    data[common::limits::ENTRY_OFFSET..common::limits::ENTRY_OFFSET + 4]
                        .try_into()
                        .unwrap(),
                );
                assert!(programs.get(entry).is_some(), "{} unregistered", dentry.name());
            }
        }
    }

    #[test]
    fn shell_is_present() {
        let (fs, _) = userland();
        assert!(fs.read_dentry_by_name("shell").is_ok());
    }
}
