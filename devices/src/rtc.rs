//! Virtualized real-time clock.
//!
//! The hardware clock ticks at a fixed 1024 Hz; each terminal owns a virtual
//! channel with its own programmed rate. A channel's reader completes once
//! enough base ticks have accumulated to cover one period at its rate, so
//! three programs on three terminals can run at independent frequencies off
//! the one tick source.

use std::sync::Arc;

use common::limits::{MAX_TERMINAL_NUM, RTC_BASE_HZ};
use common::{FileOps, KError, KResult, OpenContext};
use log::trace;

/// Rate a freshly opened channel runs at.
pub const DEFAULT_HZ: u32 = 2;

struct Channel {
    freq: u32,
    /// Base ticks accumulated since the last completed read.
    ticks: u32,
}

impl Channel {
    fn period(&self) -> u32 {
        RTC_BASE_HZ / self.freq
    }
}

pub struct RtcDriver {
    channels: spin::Mutex<[Channel; MAX_TERMINAL_NUM]>,
}

impl RtcDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: spin::Mutex::new(core::array::from_fn(|_| Channel {
                freq: DEFAULT_HZ,
                ticks: 0,
            })),
        })
    }

    /// One base-rate tick; credits every channel.
    pub fn tick(&self) {
        let mut channels = self.channels.lock();
        for ch in channels.iter_mut() {
            ch.ticks = ch.ticks.saturating_add(1);
        }
    }

    fn reset(&self, terminal: usize) {
        let mut channels = self.channels.lock();
        channels[terminal].freq = DEFAULT_HZ;
        channels[terminal].ticks = 0;
    }

    /// Try to complete one period on `terminal`'s channel.
    fn try_wait(&self, terminal: usize) -> KResult<()> {
        let mut channels = self.channels.lock();
        let ch = &mut channels[terminal];
        if ch.ticks >= ch.period() {
            ch.ticks = 0;
            Ok(())
        } else {
            Err(KError::WouldBlock)
        }
    }

    fn set_frequency(&self, terminal: usize, freq: u32) -> KResult<()> {
        if freq < 2 || freq > RTC_BASE_HZ || !freq.is_power_of_two() {
            return Err(KError::InvalidArgument);
        }
        trace!("rtc: terminal {terminal} -> {freq} Hz");
        let mut channels = self.channels.lock();
        channels[terminal].freq = freq;
        Ok(())
    }

    pub fn frequency(&self, terminal: usize) -> u32 {
        self.channels.lock()[terminal].freq
    }
}

/// The `rtc` file: open resets to the default rate, read completes after one
/// period, write takes a 4-byte little-endian rate.
pub struct RtcFile {
    pub driver: Arc<RtcDriver>,
}

impl FileOps for RtcFile {
    fn open(&self, ctx: &mut OpenContext) -> KResult<()> {
        self.driver.reset(ctx.terminal);
        Ok(())
    }

    fn read(&self, ctx: &mut OpenContext, _buf: &mut [u8]) -> KResult<usize> {
        self.driver.try_wait(ctx.terminal)?;
        Ok(0)
    }

    fn write(&self, ctx: &mut OpenContext, buf: &[u8]) -> KResult<usize> {
        let bytes: [u8; 4] = buf.try_into().map_err(|_| KError::InvalidArgument)?;
        self.driver
            .set_frequency(ctx.terminal, u32::from_le_bytes(bytes))?;
        Ok(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(terminal: usize) -> OpenContext {
        OpenContext {
            inode: 0,
            pos: 0,
            terminal,
        }
    }

    fn tick_n(driver: &RtcDriver, n: u32) {
        for _ in 0..n {
            driver.tick();
        }
    }

    #[test]
    fn default_rate_completes_after_half_a_second() {
        let driver = RtcDriver::new();
        let file = RtcFile {
            driver: driver.clone(),
        };
        let mut c = ctx(0);
        assert_eq!(file.read(&mut c, &mut []).unwrap_err(), KError::WouldBlock);
        tick_n(&driver, RTC_BASE_HZ / DEFAULT_HZ - 1);
        assert_eq!(file.read(&mut c, &mut []).unwrap_err(), KError::WouldBlock);
        driver.tick();
        assert_eq!(file.read(&mut c, &mut []).unwrap(), 0);
        // Ticks were consumed; the next period starts from zero.
        assert_eq!(file.read(&mut c, &mut []).unwrap_err(), KError::WouldBlock);
    }

    #[test]
    fn write_reprograms_the_period() {
        let driver = RtcDriver::new();
        let file = RtcFile {
            driver: driver.clone(),
        };
        let mut c = ctx(1);
        assert_eq!(file.write(&mut c, &512u32.to_le_bytes()).unwrap(), 4);
        tick_n(&driver, 2);
        assert_eq!(file.read(&mut c, &mut []).unwrap(), 0);
    }

    #[test]
    fn bad_rates_are_rejected() {
        let driver = RtcDriver::new();
        let file = RtcFile { driver };
        let mut c = ctx(0);
        for bad in [0u32, 1, 3, 100, 2048] {
            assert_eq!(
                file.write(&mut c, &bad.to_le_bytes()).unwrap_err(),
                KError::InvalidArgument
            );
        }
        assert_eq!(
            file.write(&mut c, &[2, 0]).unwrap_err(),
            KError::InvalidArgument
        );
    }

    #[test]
    fn channels_are_independent() {
        let driver = RtcDriver::new();
        let file = RtcFile {
            driver: driver.clone(),
        };
        let mut c0 = ctx(0);
        let mut c2 = ctx(2);
        assert_eq!(file.write(&mut c2, &1024u32.to_le_bytes()).unwrap(), 4);
        driver.tick();
        assert_eq!(file.read(&mut c2, &mut []).unwrap(), 0);
        assert_eq!(file.read(&mut c0, &mut []).unwrap_err(), KError::WouldBlock);
    }

    #[test]
    fn open_resets_to_default() {
        let driver = RtcDriver::new();
        let file = RtcFile {
            driver: driver.clone(),
        };
        let mut c = ctx(0);
        file.write(&mut c, &1024u32.to_le_bytes()).unwrap();
        tick_n(&driver, 10);
        file.open(&mut c).unwrap();
        assert_eq!(driver.frequency(0), DEFAULT_HZ);
        assert_eq!(file.read(&mut c, &mut []).unwrap_err(), KError::WouldBlock);
    }
}
