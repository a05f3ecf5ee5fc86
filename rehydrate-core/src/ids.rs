//! Deterministic identifier generation for unnamed UI nodes
//!
//! The producing side (e.g. a server render) and the consuming side (in-browser
//! replay) must name unnamed nodes identically. Reproducible generators run
//! SplitMix64, implemented in this module. Ephemeral generators pull their seed
//! from the operating system and refuse to start without it.
//!
//! # Example
//!
//! ```rust
//! use rehydrate_core::ids::IdGenerator;
//!
//! let mut server = IdGenerator::from_content(b"<app><button/></app>");
//! let mut client = IdGenerator::from_content(b"<app><button/></app>");
//! assert_eq!(server.next_id(), client.next_id());
//! ```

use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Characters identifiers are drawn from
pub const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Default identifier length
pub const DEFAULT_ID_LENGTH: usize = 32;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Errors raised while constructing a generator
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// The high-entropy seed source could not be read
    #[error("Entropy source failure: {0}")]
    EntropySourceFailure(String),
}

/// How a generator was seeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorMode {
    /// Seeded from OS entropy; sequences are unique per session
    Ephemeral,

    /// Seeded from a fixed or content-derived value; sequences repeat exactly
    Reproducible,
}

/// Snapshot of a generator: enough to hand the sequence to another process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorState {
    /// Seeding mode
    pub mode: GeneratorMode,

    /// Initial seed
    pub seed: u64,

    /// Number of 64-bit draws taken so far
    pub draws: u64,
}

/// SplitMix64 pseudo-random generator.
///
/// Not cryptographically secure. Its only job is a portable, repeatable stream.
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    /// Create a generator positioned at the start of `seed`'s stream
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }
}

impl RngCore for SplitMix64 {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for SplitMix64 {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }
}

/// Produces fixed-length node identifiers.
///
/// `next_id` takes `&mut self`: one generator serves one tree on one logical
/// execution sequence.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    rng: SplitMix64,
    mode: GeneratorMode,
    seed: u64,
    draws: u64,
    length: usize,
}

impl IdGenerator {
    /// Reproducible generator from a fixed seed
    pub fn reproducible(seed: u64) -> Self {
        Self::with_mode(seed, GeneratorMode::Reproducible)
    }

    /// Reproducible generator seeded from a SHA-256 digest of `content`.
    ///
    /// Typically fed the tree's content hash so both construction passes agree.
    pub fn from_content(content: impl AsRef<[u8]>) -> Self {
        Self::reproducible(seed_from_content(content.as_ref()))
    }

    /// Ephemeral generator seeded from the operating system
    pub fn ephemeral() -> std::result::Result<Self, GeneratorError> {
        Self::ephemeral_from(&mut rand::rngs::OsRng)
    }

    /// Ephemeral generator seeded from the given entropy source.
    ///
    /// A failing source is fatal; there is no fallback seed.
    pub fn ephemeral_from<R: RngCore + ?Sized>(
        entropy: &mut R,
    ) -> std::result::Result<Self, GeneratorError> {
        let mut seed = [0u8; 8];
        entropy
            .try_fill_bytes(&mut seed)
            .map_err(|e| GeneratorError::EntropySourceFailure(e.to_string()))?;
        Ok(Self::with_mode(u64::from_le_bytes(seed), GeneratorMode::Ephemeral))
    }

    /// Rebuild a generator at the exact position described by `state`
    pub fn restore(state: GeneratorState) -> Self {
        let mut generator = Self::with_mode(state.seed, state.mode);
        // SplitMix64 advances its state by a constant per draw.
        generator.rng = SplitMix64::new(
            state
                .seed
                .wrapping_add(state.draws.wrapping_mul(GOLDEN_GAMMA)),
        );
        generator.draws = state.draws;
        generator
    }

    fn with_mode(seed: u64, mode: GeneratorMode) -> Self {
        Self {
            rng: SplitMix64::new(seed),
            mode,
            seed,
            draws: 0,
            length: DEFAULT_ID_LENGTH,
        }
    }

    /// Override the identifier length
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Identifier length
    pub fn length(&self) -> usize {
        self.length
    }

    /// Seeding mode
    pub fn mode(&self) -> GeneratorMode {
        self.mode
    }

    /// Current position, suitable for [`IdGenerator::restore`]
    pub fn state(&self) -> GeneratorState {
        GeneratorState {
            mode: self.mode,
            seed: self.seed,
            draws: self.draws,
        }
    }

    /// Produce the next identifier
    pub fn next_id(&mut self) -> String {
        let mut id = String::with_capacity(self.length);
        for _ in 0..self.length {
            let draw = self.rng.next_u64();
            self.draws += 1;
            id.push(ID_ALPHABET[(draw % ID_ALPHABET.len() as u64) as usize] as char);
        }
        id
    }
}

/// Derive a reproducible seed from arbitrary content
pub fn seed_from_content(content: &[u8]) -> u64 {
    let digest = Sha256::digest(content);
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed)
}
