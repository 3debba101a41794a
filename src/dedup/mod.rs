//! MinHash near-duplicate detection
//!
//! Gates re-stores: a refetched page whose text is estimated ≥ 80% similar
//! to the stored copy is a cosmetic edit and must not re-trigger downstream
//! processing. Text is reduced to a lower-cased token stream, shingled into
//! 3-grams, and hashed under N independent permutations; the fraction of
//! equal signature slots estimates Jaccard similarity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Shingle width in tokens
const SHINGLE_SIZE: usize = 3;

/// Signature slots; more slots tighten the Jaccard estimate
const NUM_PERMUTATIONS: usize = 64;

/// Similarity at or above this is "the same page"
const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Outcome of comparing a refetched page against its stored copy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeDecision {
    /// True when the change is immaterial and the store keeps the old copy
    pub is_duplicate: bool,

    /// Estimated Jaccard similarity in `[0, 1]`
    pub similarity: f64,
}

/// A page's MinHash signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHashSignature {
    slots: Vec<u64>,
}

impl MinHashSignature {
    /// Fraction of equal slots: the Jaccard similarity estimator.
    ///
    /// Two empty signatures (both texts too short to shingle) count as
    /// identical.
    pub fn similarity(&self, other: &MinHashSignature) -> f64 {
        if self.slots.is_empty() && other.slots.is_empty() {
            return 1.0;
        }
        if self.slots.len() != other.slots.len() {
            return 0.0;
        }
        let equal = self
            .slots
            .iter()
            .zip(&other.slots)
            .filter(|(a, b)| a == b)
            .count();
        equal as f64 / self.slots.len() as f64
    }
}

/// Signature builder holding the permutation constants
///
/// Constructed once per run and passed by reference wherever signatures are
/// computed, so every comparison uses the same permutations. There is no
/// process-wide hasher registry.
#[derive(Debug, Clone)]
pub struct MinHasher {
    permutations: Vec<(u64, u64)>,
}

impl Default for MinHasher {
    fn default() -> Self {
        Self::new(0x5eed_cafe_f00d_d00d)
    }
}

impl MinHasher {
    /// Derives `NUM_PERMUTATIONS` affine permutation constants from a seed.
    pub fn new(seed: u64) -> Self {
        let mut state = seed;
        let permutations = (0..NUM_PERMUTATIONS)
            .map(|_| {
                // Multipliers must be odd to permute the u64 ring
                let a = splitmix64(&mut state) | 1;
                let b = splitmix64(&mut state);
                (a, b)
            })
            .collect();
        Self { permutations }
    }

    /// Computes the MinHash signature of a text.
    ///
    /// Slot `i` is the minimum of permutation `i` over all shingle hashes,
    /// which makes the signature independent of shingle order. Texts with
    /// fewer tokens than the shingle width produce an empty signature.
    pub fn signature(&self, text: &str) -> MinHashSignature {
        let tokens = tokenize(text);
        if tokens.len() < SHINGLE_SIZE {
            return MinHashSignature { slots: Vec::new() };
        }

        let shingle_hashes: Vec<u64> = tokens
            .windows(SHINGLE_SIZE)
            .map(|shingle| {
                let mut hasher = DefaultHasher::new();
                shingle.hash(&mut hasher);
                hasher.finish()
            })
            .collect();

        let slots = self
            .permutations
            .iter()
            .map(|&(a, b)| {
                shingle_hashes
                    .iter()
                    .map(|&h| h.wrapping_mul(a).wrapping_add(b))
                    .min()
                    .expect("at least one shingle")
            })
            .collect();

        MinHashSignature { slots }
    }

    /// Decides whether a refetched text materially differs from the stored
    /// one. `similarity < 0.8` means replace; everything above is a
    /// duplicate.
    pub fn compare(&self, stored_text: &str, new_text: &str) -> ChangeDecision {
        let similarity = self
            .signature(stored_text)
            .similarity(&self.signature(new_text));
        ChangeDecision {
            is_duplicate: similarity >= SIMILARITY_THRESHOLD,
            similarity,
        }
    }
}

/// Lower-cased word tokens; everything that is not alphanumeric separates.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// SplitMix64 step, the usual seed-expansion generator.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
