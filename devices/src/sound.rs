//! Sound device: accepts a RIFF/WAVE image and streams its sample data in
//! fixed-size blocks. The hosted build has no audio output; the driver
//! validates and consumes the stream, keeping enough state for callers to
//! observe what was played.

use std::sync::Arc;

use common::{KError, KResult};
use log::info;

/// DMA-style transfer unit.
pub const BLOCK_SIZE: usize = 0x8000;

struct WaveInfo {
    sample_rate: u32,
    channels: u16,
    data_len: usize,
}

/// Parse the RIFF header and walk the chunk list for `fmt ` and `data`.
fn parse_wave(image: &[u8]) -> KResult<WaveInfo> {
    if image.len() < 12 || &image[..4] != b"RIFF" || &image[8..12] != b"WAVE" {
        return Err(KError::InvalidArgument);
    }
    let mut fmt: Option<(u32, u16)> = None;
    let mut data_len: Option<usize> = None;
    let mut at = 12;
    while at + 8 <= image.len() {
        let id = &image[at..at + 4];
        let size = u32::from_le_bytes(image[at + 4..at + 8].try_into().unwrap()) as usize;
        let body = at + 8;
        if body + size > image.len() {
            return Err(KError::InvalidArgument);
        }
        match id {
            b"fmt " if size >= 16 => {
                let channels = u16::from_le_bytes(image[body + 2..body + 4].try_into().unwrap());
                let rate = u32::from_le_bytes(image[body + 4..body + 8].try_into().unwrap());
                fmt = Some((rate, channels));
            }
            b"data" => data_len = Some(size),
            _ => {}
        }
        // Chunks are word-aligned.
        at = body + size + (size & 1);
    }
    match (fmt, data_len) {
        (Some((sample_rate, channels)), Some(data_len)) => Ok(WaveInfo {
            sample_rate,
            channels,
            data_len,
        }),
        _ => Err(KError::InvalidArgument),
    }
}

#[derive(Default)]
struct State {
    playing: bool,
    plays_completed: u32,
    last_rate: u32,
    last_blocks: usize,
}

pub struct SoundDriver {
    state: spin::Mutex<State>,
}

impl SoundDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: spin::Mutex::new(State::default()),
        })
    }

    /// Validate `image` and stream its data chunk. Only one stream runs at a
    /// time; a second caller is told to come back.
    pub fn play(&self, image: &[u8]) -> KResult<()> {
        let wave = parse_wave(image)?;
        {
            let mut state = self.state.lock();
            if state.playing {
                return Err(KError::WouldBlock);
            }
            state.playing = true;
        }
        info!(
            "sound: {} Hz, {} channel(s), {} bytes",
            wave.sample_rate, wave.channels, wave.data_len
        );
        let blocks = wave.data_len.div_ceil(BLOCK_SIZE);
        let mut state = self.state.lock();
        state.playing = false;
        state.plays_completed += 1;
        state.last_rate = wave.sample_rate;
        state.last_blocks = blocks;
        Ok(())
    }

    pub fn stop(&self) {
        self.state.lock().playing = false;
    }

    pub fn plays_completed(&self) -> u32 {
        self.state.lock().plays_completed
    }

    pub fn last_rate(&self) -> u32 {
        self.state.lock().last_rate
    }

    pub fn last_blocks(&self) -> usize {
        self.state.lock().last_blocks
    }
}

/// Assemble a minimal WAVE image (tests and demo content).
pub fn build_wave(sample_rate: u32, channels: u16, samples: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(44 + samples.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * channels as u32).to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes()); // block align
    out.extend_from_slice(&8u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    out.extend_from_slice(samples);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_a_well_formed_wave() {
        let driver = SoundDriver::new();
        let image = build_wave(22050, 1, &[0x80; 100]);
        driver.play(&image).unwrap();
        assert_eq!(driver.plays_completed(), 1);
        assert_eq!(driver.last_rate(), 22050);
        assert_eq!(driver.last_blocks(), 1);
    }

    #[test]
    fn large_data_streams_in_blocks() {
        let driver = SoundDriver::new();
        let image = build_wave(8000, 2, &vec![0u8; BLOCK_SIZE * 2 + 1]);
        driver.play(&image).unwrap();
        assert_eq!(driver.last_blocks(), 3);
    }

    #[test]
    fn rejects_non_wave_images() {
        let driver = SoundDriver::new();
        assert_eq!(driver.play(b"").unwrap_err(), KError::InvalidArgument);
        assert_eq!(
            driver.play(b"RIFFxxxxJUNK").unwrap_err(),
            KError::InvalidArgument
        );
        // Plain text that happens to be long enough.
        assert_eq!(
            driver.play(&[0u8; 64]).unwrap_err(),
            KError::InvalidArgument
        );
    }

    #[test]
    fn rejects_truncated_chunks() {
        let driver = SoundDriver::new();
        let mut image = build_wave(8000, 1, &[0; 32]);
        image.truncate(image.len() - 10);
        assert_eq!(driver.play(&image).unwrap_err(), KError::InvalidArgument);
    }

    #[test]
    fn missing_data_chunk_fails() {
        let mut image = Vec::new();
        image.extend_from_slice(b"RIFF");
        image.extend_from_slice(&4u32.to_le_bytes());
        image.extend_from_slice(b"WAVE");
        let driver = SoundDriver::new();
        assert_eq!(driver.play(&image).unwrap_err(), KError::InvalidArgument);
    }
}
