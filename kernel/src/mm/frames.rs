//! Backing storage for "physical" memory.
//!
//! The arena models the low 64 MB of the machine as sixteen 4 MB frames,
//! allocated lazily the first time an address inside them is touched. All
//! access is by physical address, after the page directory has translated.

use common::limits::FOUR_MB;

const FRAME_COUNT: usize = 16;

/// Lazily materialized 4 MB frames.
pub struct FrameArena {
    frames: Vec<Option<Box<[u8]>>>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self {
            frames: (0..FRAME_COUNT).map(|_| None).collect(),
        }
    }

    fn frame(&mut self, phys: usize) -> (&mut [u8], usize) {
        let index = phys / FOUR_MB;
        assert!(index < FRAME_COUNT, "physical address {phys:#x} out of range");
        let frame = self.frames[index].get_or_insert_with(|| vec![0u8; FOUR_MB].into_boxed_slice());
        (frame, phys % FOUR_MB)
    }

    pub fn write(&mut self, phys: usize, bytes: &[u8]) {
        let (frame, at) = self.frame(phys);
        assert!(at + bytes.len() <= FOUR_MB, "write crosses a frame boundary");
        frame[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn read(&mut self, phys: usize, buf: &mut [u8]) {
        let (frame, at) = self.frame(phys);
        assert!(at + buf.len() <= FOUR_MB, "read crosses a frame boundary");
        buf.copy_from_slice(&frame[at..at + buf.len()]);
    }

    pub fn write_u32(&mut self, phys: usize, value: u32) {
        self.write(phys, &value.to_le_bytes());
    }

    pub fn read_u32(&mut self, phys: usize) -> u32 {
        let mut bytes = [0u8; 4];
        self.read(phys, &mut bytes);
        u32::from_le_bytes(bytes)
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::limits::program_phys_base;

    #[test]
    fn frames_start_zeroed() {
        let mut arena = FrameArena::new();
        let mut buf = [0xAAu8; 8];
        arena.read(program_phys_base(3), &mut buf);
        assert_eq!(buf, [0u8; 8]);
    }

    #[test]
    fn round_trips_at_arbitrary_offsets() {
        let mut arena = FrameArena::new();
        let at = program_phys_base(0) + 0x48000;
        arena.write(at, b"payload");
        let mut buf = [0u8; 7];
        arena.read(at, &mut buf);
        assert_eq!(&buf, b"payload");
        arena.write_u32(at + 100, 0xDEAD_BEEF);
        assert_eq!(arena.read_u32(at + 100), 0xDEAD_BEEF);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn rejects_addresses_past_the_arena() {
        let mut arena = FrameArena::new();
        arena.write(FRAME_COUNT * FOUR_MB, &[0]);
    }
}
