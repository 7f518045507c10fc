//! End-to-end link test harness
//!
//! Pushes numbered half-image payloads through the codec, a noisy line
//! and the resynchronising decoder, then checks the link invariants:
//! - Nothing corrupted is ever emitted as validated
//! - Frames come out in the order they were sent
//! - A clean line delivers everything

use roboneo_core::HALF_IMAGE_BYTES;
use roboneo_wire::{DecoderStats, FrameDecoder, LinkCodec};

use crate::noise::{NoiseConfig, NoiseStats, NoisyLine};

// ============================================================================
// PAYLOADS
// ============================================================================

/// Numbered test payload: the first two bytes carry the index, the rest is
/// a pattern derived from it
pub fn numbered_payload(index: u16) -> Vec<u8> {
    let mut payload = vec![0u8; HALF_IMAGE_BYTES];
    payload[..2].copy_from_slice(&index.to_be_bytes());
    for (i, byte) in payload.iter_mut().enumerate().skip(2) {
        *byte = (i as u16).wrapping_mul(7).wrapping_add(index.wrapping_mul(13)) as u8;
    }
    payload
}

/// Index of a payload built by [`numbered_payload`], if it is intact
pub fn payload_index(payload: &[u8]) -> Option<u16> {
    let index = u16::from_be_bytes([*payload.first()?, *payload.get(1)?]);
    (payload == numbered_payload(index).as_slice()).then_some(index)
}

// ============================================================================
// HARNESS
// ============================================================================

/// Link test configuration
#[derive(Clone, Debug)]
pub struct LinkTestConfig {
    /// Frames to send
    pub frames: u16,
    pub noise: NoiseConfig,
    pub seed: u64,
}

impl Default for LinkTestConfig {
    fn default() -> Self {
        Self {
            frames: 200,
            noise: NoiseConfig::default(),
            seed: 42,
        }
    }
}

impl LinkTestConfig {
    pub fn minimal() -> Self {
        Self {
            frames: 10,
            noise: NoiseConfig::clean(),
            ..Default::default()
        }
    }

    pub fn standard() -> Self {
        Self::default()
    }

    pub fn stress() -> Self {
        Self {
            frames: 2000,
            noise: NoiseConfig::hostile(),
            ..Default::default()
        }
    }

    pub fn with_noise(mut self, noise: NoiseConfig) -> Self {
        self.noise = noise;
        self
    }
}

/// Link test outcome
#[derive(Clone, Debug, Default)]
pub struct LinkTestResult {
    pub frames_sent: u64,
    pub frames_recovered: u64,
    /// Validated payloads that were not an intact sent payload
    pub corrupted_emitted: u64,
    /// Validated payloads that arrived out of order or twice
    pub out_of_order: u64,
    pub decoder: DecoderStats,
    pub noise: NoiseStats,
}

impl LinkTestResult {
    /// The link never lied
    pub fn passed(&self) -> bool {
        self.corrupted_emitted == 0 && self.out_of_order == 0
    }

    pub fn recovery_rate(&self) -> f64 {
        if self.frames_sent == 0 {
            1.0
        } else {
            self.frames_recovered as f64 / self.frames_sent as f64
        }
    }
}

/// Codec plus noisy line plus decoder
pub struct LinkHarness {
    config: LinkTestConfig,
    codec: LinkCodec,
    line: NoisyLine,
    decoder: FrameDecoder,
}

impl LinkHarness {
    pub fn new(config: LinkTestConfig) -> Self {
        let codec = LinkCodec::half_image();
        Self {
            line: NoisyLine::new(config.noise.clone(), config.seed),
            decoder: FrameDecoder::new(codec.clone()),
            codec,
            config,
        }
    }

    pub fn run(&mut self) -> LinkTestResult {
        let mut result = LinkTestResult::default();
        let mut last: Option<u16> = None;

        for index in 0..self.config.frames {
            let Ok(frame) = self.codec.encode(&numbered_payload(index)) else {
                continue;
            };
            result.frames_sent += 1;

            let received = self.line.transmit(&frame);
            for chunk in self.line.chunk(&received) {
                for payload in self.decoder.push(&chunk) {
                    match payload_index(&payload) {
                        Some(i) if last.map_or(true, |l| i > l) => {
                            result.frames_recovered += 1;
                            last = Some(i);
                        }
                        Some(_) => result.out_of_order += 1,
                        None => result.corrupted_emitted += 1,
                    }
                }
            }
        }

        result.decoder = self.decoder.stats().clone();
        result.noise = self.line.stats().clone();
        result
    }
}

/// Clean line, every frame must arrive
pub fn test_clean_link() -> LinkTestResult {
    LinkHarness::new(LinkTestConfig::minimal()).run()
}

/// Default noise
pub fn test_noisy_link() -> LinkTestResult {
    LinkHarness::new(LinkTestConfig::standard().with_noise(NoiseConfig::noisy())).run()
}

/// Hostile noise over many frames
pub fn test_hostile_link() -> LinkTestResult {
    LinkHarness::new(LinkTestConfig::stress()).run()
}
