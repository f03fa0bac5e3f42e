//! In-process text embeddings for the vector selection strategy.
//!
//! The embedder is created once at start-up and shared read-only by every
//! request, so implementations must be `Send + Sync` and stateless.

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;
pub const DEFAULT_EMBEDDING_MODEL: &str = "hashed-char-trigram";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;

    /// Embeds every text; the output has the same length and order as `texts`.
    fn embed_all(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Hashes the character trigrams of every lower-cased word (with `^`/`$`
/// boundary markers) into a fixed number of buckets, then L2-normalizes.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> &str {
        DEFAULT_EMBEDDING_MODEL
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let buckets = vector.len() as u64;

        for word in text.split_whitespace() {
            let padded: Vec<char> = std::iter::once('^')
                .chain(word.to_lowercase().chars())
                .chain(std::iter::once('$'))
                .collect();

            for window in padded.windows(3) {
                let bucket = (fnv1a(window) % buckets) as usize;
                vector[bucket] += 1.0;
            }
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut buffer = [0u8; 4];
    for ch in chars {
        for byte in ch.encode_utf8(&mut buffer).bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::{CharacterNgramEmbedder, Embedder};

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Grace period for premium payment");
        let second = embedder.embed("Grace period for premium payment");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder::new(32);
        assert_eq!(embedder.embed("a").len(), 32);
        assert_eq!(embedder.embed("").len(), 32);
    }

    #[test]
    fn embeddings_are_unit_length_and_case_insensitive() {
        let embedder = CharacterNgramEmbedder::default();
        let lower = embedder.embed("waiting period");
        let upper = embedder.embed("WAITING PERIOD");
        assert_eq!(lower, upper);

        let norm = lower.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn embed_all_preserves_order_and_length() {
        let embedder = CharacterNgramEmbedder::new(16);
        let batch = embedder.embed_all(&["alpha", "beta", "gamma"]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[1], embedder.embed("beta"));
    }
}
