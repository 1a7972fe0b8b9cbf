//! Deterministic RNG used by the stream samplers.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Seeded random source handed to [`crate::SmoothStream::sample`].
///
/// Every draw made while sampling a perturbed stream goes through one of
/// these. Independent consumers (for instance one stream arm per worker) get
/// their own handle through [`SampleRng::substream`], which hashes
/// `(master_seed, substream)` with zero-keyed SipHash-1-3 so that the split is
/// identical on every platform.
#[derive(Debug, Clone)]
pub struct SampleRng {
    seed: u64,
    rng: StdRng,
}

impl SampleRng {
    /// Creates a handle from a master seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns a fresh handle for the given substream of this handle's seed.
    pub fn substream(&self, substream: u64) -> Self {
        Self::from_seed(derive_substream_seed(self.seed, substream))
    }

    /// Master seed this handle was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RngCore for SampleRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Derives the seed of a substream from a master seed.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}
