//! Embedding - Text to vector capability
//!
//! The store treats an [`Embedder`] as optional: without one, vector
//! indexing and semantic search are simply off.
//!
//! [`HashingEmbedder`] is a built-in, model-free embedder. It hashes
//! lowercase word tokens (FNV-1a) into a fixed number of buckets with a
//! sign bit, then L2-normalizes. Texts sharing words land close together,
//! which is enough for keyword-ish semantic lookup with no runtime.

use thiserror::Error;

/// Default dimension for the hashing embedder
pub const DEFAULT_DIMENSION: usize = 384;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding failed: nothing to embed")]
    EmptyInput,

    #[error("embedding failed: {0}")]
    Runtime(String),
}

/// Anything that turns text into a fixed-length vector
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    fn dimension(&self) -> usize;
}

/// Feature-hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0f32; self.dimension];
        let mut tokens = 0usize;

        for token in tokenize(text) {
            let h = fnv1a64(&token);
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
            tokens += 1;
        }

        if tokens == 0 {
            return Err(EmbedError::EmptyInput);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
}

fn fnv1a64(s: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for b in s.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
