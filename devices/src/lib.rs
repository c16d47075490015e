//! Device collaborators of the kernel core: terminal sessions, the
//! virtualized real-time clock, the sound device, and the read-only
//! filesystem image. The kernel only ever reaches these through the
//! `FileOps` vectors they expose or through their narrow driver APIs.

pub mod fsimg;
pub mod rtc;
pub mod sound;
pub mod terminal;
