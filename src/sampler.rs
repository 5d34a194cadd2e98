//! Selective record admission (component C5), applied on the producer
//! thread after filters (spec §4.2, §4.3).

use ahash::AHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// A sampling strategy. `rate = 0.0` passes nothing, `rate = 1.0` passes
/// everything — both boundaries are exact, not approximate (spec §4.3).
pub enum Sampler {
    /// Always pass.
    None,
    /// Pass iff a uniform draw in `[0, 1)` is less than `rate`.
    Random { rate: f64, state: AtomicU64 },
    /// Pass the first of every `n` records observed.
    Interval { n: u64, counter: AtomicU64 },
    /// Pass iff a deterministic hash of a key mod 2^32 falls under the
    /// rate threshold — repeated identical keys are always kept or
    /// always dropped together.
    Consistent { rate: f64 },
}

impl Sampler {
    pub fn none() -> Self {
        Sampler::None
    }

    pub fn random(rate: f64) -> Self {
        Sampler::Random { rate: rate.clamp(0.0, 1.0), state: AtomicU64::new(splitmix_seed()) }
    }

    pub fn interval(n: u64) -> Self {
        Sampler::Interval { n: n.max(1), counter: AtomicU64::new(0) }
    }

    pub fn consistent(rate: f64) -> Self {
        Sampler::Consistent { rate: rate.clamp(0.0, 1.0) }
    }

    /// `key` is the value consistent sampling hashes on — the message
    /// text by default, per spec §4.3.
    pub fn should_pass(&self, key: &str) -> bool {
        match self {
            Sampler::None => true,
            Sampler::Random { rate, state } => {
                if *rate <= 0.0 {
                    return false;
                }
                if *rate >= 1.0 {
                    return true;
                }
                let draw = next_uniform(state);
                draw < *rate
            }
            Sampler::Interval { n, counter } => {
                let count = counter.fetch_add(1, Ordering::Relaxed);
                count % n == 0
            }
            Sampler::Consistent { rate } => {
                if *rate <= 0.0 {
                    return false;
                }
                if *rate >= 1.0 {
                    return true;
                }
                let mut hasher = AHasher::default();
                key.hash(&mut hasher);
                let h = hasher.finish();
                let bucket = (h % (1u64 << 32)) as f64 / (1u64 << 32) as f64;
                bucket < *rate
            }
        }
    }
}

fn splitmix_seed() -> u64 {
    // Seed from the address of a stack local — good enough for sampling
    // jitter, not a cryptographic requirement.
    let x = 0u8;
    (&x as *const u8 as u64) ^ 0x9E3779B97F4A7C15
}

/// A small, fast, non-cryptographic PRNG step (SplitMix64) used to draw
/// uniform samples without pulling in an external rand crate dependency
/// the rest of the stack has no other use for.
fn next_uniform(state: &AtomicU64) -> f64 {
    let mut z = state.fetch_add(0x9E3779B97F4A7C15, Ordering::Relaxed);
    z = z.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64
}
