//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ for fast, high-quality randomness.
//! Given the same seed, produces the identical flip sequence on all platforms,
//! so a recorded seed is enough to replay a whole session.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Sha256, Digest};

use super::coin::{CoinFace, CoinSource};

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use coin_flip::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create an RNG whose seed is derived from a session label.
    pub fn from_label(label: &str) -> Self {
        Self::new(derive_session_seed(label))
    }

    /// Seed from a fresh session id and the wall clock.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let label = format!("{}:{}", uuid::Uuid::new_v4(), nanos);
        Self::from_label(&label)
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

}

impl CoinSource for DeterministicRng {
    /// Top bit of the next output. Xorshift128+ low bits are weaker.
    fn flip(&mut self) -> CoinFace {
        if self.next_u64() >> 63 == 0 {
            CoinFace::Heads
        } else {
            CoinFace::Tails
        }
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a 64-bit seed from an arbitrary session label.
pub fn derive_session_seed(label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"COIN_FLIP_SEED_V1");
    hasher.update(label.as_bytes());
    let hash = hasher.finalize();

    let mut first = [0u8; 8];
    first.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(first)
}

// =============================================================================
// TESTS
// =============================================================================
