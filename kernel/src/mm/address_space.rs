//! The page directory.
//!
//! One directory serves the whole machine; a context switch re-points the
//! program slot (a single 4 MB page) at the incoming process's physical
//! region and retargets the user video page, then bumps the TLB generation
//! in place of a hardware flush.
//!
//! Layout is fixed:
//!   slot 0   4 KB table, identity map of the display and its back buffers
//!   slot 1   4 MB kernel page at 4 MB
//!   slot 32  4 MB user page, the current process's program window
//!   slot 52  4 KB table whose entry 0 is the user video page

use bitflags::bitflags;
use common::limits::{
    FOUR_KB, FOUR_MB, MAX_TASK, MAX_TERMINAL_NUM, PROGRAM_LOAD, USER_BASE, USER_VIDEO, VIDEO_MEM,
    program_phys_base, terminal_buffer,
};
use common::{KError, KResult};
use log::trace;

use super::FrameArena;

/// Directory index of the program window (`USER_BASE >> 22`).
pub const PROGRAM_SLOT: usize = USER_BASE >> 22;

const VIDEO_SLOT: usize = USER_VIDEO >> 22;
const ENTRIES: usize = 1024;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const PRESENT   = 1 << 0;
        const WRITABLE  = 1 << 1;
        const USER      = 1 << 2;
        const PAGE_SIZE = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy)]
struct TableEntry {
    flags: PageFlags,
    base: usize,
}

impl TableEntry {
    const ABSENT: TableEntry = TableEntry {
        flags: PageFlags::empty(),
        base: 0,
    };
}

#[derive(Debug, Clone, Copy)]
enum DirEntry {
    Absent,
    /// A 4 MB page.
    Large { flags: PageFlags, base: usize },
    /// A table of 4 KB pages, identified by [`AddressSpace`] field.
    LowTable { flags: PageFlags },
    VideoTable { flags: PageFlags },
}

pub struct AddressSpace {
    directory: [DirEntry; ENTRIES],
    low_table: Box<[TableEntry; ENTRIES]>,
    video_table: Box<[TableEntry; ENTRIES]>,
    tlb_generation: u64,
}

impl AddressSpace {
    pub fn new() -> Self {
        let mut low_table: Box<[TableEntry; ENTRIES]> =
            vec![TableEntry::ABSENT; ENTRIES].try_into().ok().unwrap();
        let kernel_page = PageFlags::PRESENT | PageFlags::WRITABLE;
        low_table[VIDEO_MEM / FOUR_KB] = TableEntry {
            flags: kernel_page,
            base: VIDEO_MEM,
        };
        for t in 0..MAX_TERMINAL_NUM {
            low_table[terminal_buffer(t) / FOUR_KB] = TableEntry {
                flags: kernel_page,
                base: terminal_buffer(t),
            };
        }

        let mut directory = [DirEntry::Absent; ENTRIES];
        directory[0] = DirEntry::LowTable { flags: kernel_page };
        directory[1] = DirEntry::Large {
            flags: kernel_page | PageFlags::PAGE_SIZE,
            base: FOUR_MB,
        };
        directory[VIDEO_SLOT] = DirEntry::VideoTable {
            flags: PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER,
        };

        Self {
            directory,
            low_table,
            video_table: vec![TableEntry::ABSENT; ENTRIES].try_into().ok().unwrap(),
            tlb_generation: 0,
        }
    }

    /// Point the program window at `pid`'s physical region.
    pub fn map_program(&mut self, pid: usize) {
        assert!(pid < MAX_TASK);
        self.directory[PROGRAM_SLOT] = DirEntry::Large {
            flags: PageFlags::PRESENT
                | PageFlags::WRITABLE
                | PageFlags::USER
                | PageFlags::PAGE_SIZE,
            base: program_phys_base(pid),
        };
        self.flush_tlb();
    }

    /// Make the user video page visible, targeting the live display.
    pub fn map_user_video(&mut self) {
        self.video_table[0] = TableEntry {
            flags: PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER,
            base: VIDEO_MEM,
        };
        self.flush_tlb();
    }

    /// Make the user video page visible, targeting a background terminal's
    /// off-screen buffer.
    pub fn map_terminal_video(&mut self, terminal: usize) {
        assert!(terminal < MAX_TERMINAL_NUM);
        self.video_table[0] = TableEntry {
            flags: PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER,
            base: terminal_buffer(terminal),
        };
        self.flush_tlb();
    }

    fn flush_tlb(&mut self) {
        self.tlb_generation += 1;
        trace!("mm: tlb flush (generation {})", self.tlb_generation);
    }

    pub fn tlb_generation(&self) -> u64 {
        self.tlb_generation
    }

    /// Walk the directory. `user` demands the USER bit on the final mapping.
    pub fn translate(&self, vaddr: usize, user: bool) -> KResult<usize> {
        let entry = self
            .directory
            .get(vaddr >> 22)
            .copied()
            .ok_or(KError::InvalidArgument)?;
        let (flags, base, offset) = match entry {
            DirEntry::Absent => return Err(KError::InvalidArgument),
            DirEntry::Large { flags, base } => (flags, base, vaddr & (FOUR_MB - 1)),
            DirEntry::LowTable { flags } | DirEntry::VideoTable { flags } => {
                if !flags.contains(PageFlags::PRESENT) {
                    return Err(KError::InvalidArgument);
                }
                let table = match entry {
                    DirEntry::LowTable { .. } => &self.low_table,
                    _ => &self.video_table,
                };
                let te = table[(vaddr >> 12) & (ENTRIES - 1)];
                (te.flags, te.base, vaddr & (FOUR_KB - 1))
            }
        };
        if !flags.contains(PageFlags::PRESENT) || (user && !flags.contains(PageFlags::USER)) {
            return Err(KError::InvalidArgument);
        }
        Ok(base + offset)
    }

    /// Copy a program image into `pid`'s region at the fixed load address.
    pub fn load_program(&self, arena: &mut FrameArena, pid: usize, image: &[u8]) {
        let phys = program_phys_base(pid) + (PROGRAM_LOAD - USER_BASE);
        arena.write(phys, image);
    }

}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::limits::USER_STACK_TOP;

    #[test]
    fn program_window_follows_the_mapped_pid() {
        let mut space = AddressSpace::new();
        assert!(space.translate(PROGRAM_LOAD, true).is_err());
        space.map_program(2);
        assert_eq!(
            space.translate(PROGRAM_LOAD, true).unwrap(),
            program_phys_base(2) + (PROGRAM_LOAD - USER_BASE)
        );
        space.map_program(5);
        assert_eq!(
            space.translate(USER_STACK_TOP, true).unwrap(),
            program_phys_base(5) + (USER_STACK_TOP - USER_BASE)
        );
    }

    #[test]
    fn kernel_pages_refuse_user_access() {
        let space = AddressSpace::new();
        assert_eq!(space.translate(VIDEO_MEM, false).unwrap(), VIDEO_MEM);
        assert!(space.translate(VIDEO_MEM, true).is_err());
        assert!(space.translate(FOUR_MB + 100, true).is_err());
    }

    #[test]
    fn video_page_retargets_between_display_and_buffers() {
        let mut space = AddressSpace::new();
        assert!(space.translate(USER_VIDEO, true).is_err());
        space.map_user_video();
        assert_eq!(space.translate(USER_VIDEO, true).unwrap(), VIDEO_MEM);
        space.map_terminal_video(1);
        assert_eq!(
            space.translate(USER_VIDEO, true).unwrap(),
            terminal_buffer(1)
        );
    }

    #[test]
    fn remaps_bump_the_tlb_generation() {
        let mut space = AddressSpace::new();
        let g0 = space.tlb_generation();
        space.map_program(0);
        space.map_user_video();
        assert_eq!(space.tlb_generation(), g0 + 2);
    }

    #[test]
    fn loaded_image_is_visible_through_the_window() {
        let mut space = AddressSpace::new();
        let mut arena = FrameArena::new();
        space.map_program(1);
        space.load_program(&mut arena, 1, b"\x7fELF rest of image");
        let phys = space.translate(PROGRAM_LOAD, true).unwrap();
        let mut buf = [0u8; 4];
        arena.read(phys, &mut buf);
        assert_eq!(&buf, b"\x7fEL\x46");
    }

}
