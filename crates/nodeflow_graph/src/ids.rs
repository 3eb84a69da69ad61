// SPDX-License-Identifier: MIT OR Apache-2.0
//! ID generation for nodes and comments.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default length of generated IDs
pub const DEFAULT_ID_LENGTH: usize = 10;

/// URL-safe alphabet used for random IDs
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_-";

/// Source of fresh IDs
pub trait IdGenerator {
    /// Produce the next ID
    fn next_id(&mut self) -> String;
}

/// Random fixed-length IDs over a 64-character alphabet
#[derive(Debug, Clone)]
pub struct RandomIds {
    rng: StdRng,
    length: usize,
}

impl RandomIds {
    /// Seed from OS entropy
    pub fn new(length: usize) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            length,
        }
    }

    /// Deterministic generator for tests and replays
    pub fn seeded(seed: u64, length: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            length,
        }
    }
}

impl Default for RandomIds {
    fn default() -> Self {
        Self::new(DEFAULT_ID_LENGTH)
    }
}

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> String {
        (0..self.length)
            .map(|_| char::from(ALPHABET[self.rng.gen_range(0..ALPHABET.len())]))
            .collect()
    }
}

/// Counting IDs with a prefix: `n1`, `n2`, ...
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    /// Start counting at 1
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}
