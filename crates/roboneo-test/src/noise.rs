//! Noisy serial line simulation
//!
//! Simulates a physical UART between the two boards:
//! - Dropped bytes
//! - Bit flips
//! - Injected garbage bursts
//! - Arbitrary read boundaries

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Line noise configuration
#[derive(Clone, Debug)]
pub struct NoiseConfig {
    /// Per-byte drop probability (0.0 - 1.0)
    pub drop_rate: f64,
    /// Per-byte flip probability
    pub flip_rate: f64,
    /// Per-byte probability of a garbage burst before the byte
    pub inject_rate: f64,
    /// Garbage burst length range
    pub inject_burst: (usize, usize),
    /// Largest chunk a single read returns
    pub max_chunk: usize,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            drop_rate: 0.0001,
            flip_rate: 0.0001,
            inject_rate: 0.0001,
            inject_burst: (1, 8),
            max_chunk: 256,
        }
    }
}

impl NoiseConfig {
    /// Perfect line, only read boundaries vary
    pub fn clean() -> Self {
        NoiseConfig {
            drop_rate: 0.0,
            flip_rate: 0.0,
            inject_rate: 0.0,
            inject_burst: (0, 0),
            max_chunk: 512,
        }
    }

    /// Long unshielded cable
    pub fn noisy() -> Self {
        NoiseConfig {
            drop_rate: 0.0002,
            flip_rate: 0.0002,
            inject_rate: 0.0001,
            inject_burst: (1, 16),
            max_chunk: 128,
        }
    }

    /// Loose connector next to a motor
    pub fn hostile() -> Self {
        NoiseConfig {
            drop_rate: 0.002,
            flip_rate: 0.003,
            inject_rate: 0.001,
            inject_burst: (4, 64),
            max_chunk: 64,
        }
    }
}

/// Line statistics
#[derive(Clone, Debug, Default)]
pub struct NoiseStats {
    pub bytes_sent: u64,
    pub bytes_delivered: u64,
    pub bytes_dropped: u64,
    pub bytes_flipped: u64,
    pub bytes_injected: u64,
}

impl NoiseStats {
    /// Bytes that reached the receiver unaltered, as a share of sent
    pub fn fidelity(&self) -> f64 {
        if self.bytes_sent == 0 {
            1.0
        } else {
            let damaged = self.bytes_dropped + self.bytes_flipped;
            1.0 - damaged as f64 / self.bytes_sent as f64
        }
    }
}

/// Seeded noisy line
pub struct NoisyLine {
    config: NoiseConfig,
    rng: StdRng,
    stats: NoiseStats,
}

impl NoisyLine {
    pub fn new(config: NoiseConfig, seed: u64) -> Self {
        NoisyLine {
            config,
            rng: StdRng::seed_from_u64(seed),
            stats: NoiseStats::default(),
        }
    }

    /// Pass bytes over the line
    pub fn transmit(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        for &byte in data {
            self.stats.bytes_sent += 1;

            if self.config.inject_rate > 0.0 && self.rng.gen::<f64>() < self.config.inject_rate {
                let (min, max) = self.config.inject_burst;
                let len = self.rng.gen_range(min..=max.max(min));
                for _ in 0..len {
                    out.push(self.rng.gen());
                }
                self.stats.bytes_injected += len as u64;
            }

            if self.rng.gen::<f64>() < self.config.drop_rate {
                self.stats.bytes_dropped += 1;
                continue;
            }

            if self.rng.gen::<f64>() < self.config.flip_rate {
                let mask: u8 = self.rng.gen_range(1..=255);
                out.push(byte ^ mask);
                self.stats.bytes_flipped += 1;
            } else {
                out.push(byte);
            }
        }
        self.stats.bytes_delivered += out.len() as u64;
        out
    }

    /// Split received bytes the way successive reads would return them
    pub fn chunk(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        let max = self.config.max_chunk.max(1);
        let mut chunks = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let len = self.rng.gen_range(1..=max).min(rest.len());
            let (head, tail) = rest.split_at(len);
            chunks.push(head.to_vec());
            rest = tail;
        }
        chunks
    }

    pub fn stats(&self) -> &NoiseStats {
        &self.stats
    }
}
