//! Random payload generation.
//!
//! Every worker owns its generator. Seeds come from one wall-clock base taken
//! at process start, mixed with the worker index, so no generator state is
//! shared between concurrently running workers.

use rand::rngs::SmallRng;
use rand::seq::IndexedRandom as _;
use rand::SeedableRng as _;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of every echo packet, in bytes.
pub const PAYLOAD_SIZE: usize = 64;

/// Alphabet payload bytes are drawn from.
pub const LETTERS: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A single echo packet.
pub type Payload = [u8; PAYLOAD_SIZE];

/// Hands out independent generators, one per worker.
#[derive(Debug, Clone, Copy)]
pub struct SeedSource {
    base: u64,
}

impl SeedSource {
    /// Seed base from the current wall-clock time.
    pub fn from_time() -> Self {
        let base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self { base }
    }

    #[cfg(test)]
    pub fn with_base(base: u64) -> Self {
        Self { base }
    }

    /// Generator for worker `index`.
    pub fn worker_rng(&self, index: usize) -> SmallRng {
        SmallRng::seed_from_u64(mix(self.base ^ (index as u64).wrapping_mul(GOLDEN_GAMMA)))
    }
}

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

// splitmix64 finalizer, spreads nearby seeds apart
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Fill a fresh payload with letters drawn uniformly from [`LETTERS`].
pub fn random_payload(rng: &mut SmallRng) -> Payload {
    let mut buf = [0u8; PAYLOAD_SIZE];
    for b in buf.iter_mut() {
        // LETTERS is non-empty
        *b = *LETTERS.choose(rng).unwrap_or(&b'a');
    }
    buf
}
