//! Virtual-memory model: a per-boot frame arena standing in for physical
//! memory, and one page directory re-pointed at every context switch.

pub mod address_space;
pub mod frames;

pub use address_space::{AddressSpace, PROGRAM_SLOT};
pub use frames::FrameArena;
