use sha2::{Digest, Sha256};

/// Fixed embedding dimension, matching the real embedding model this system
/// targets in production.
pub const EMBEDDING_DIM: usize = 1536;

/// Turns free text into a fixed-dimension vector.
///
/// A real deployment plugs in an actual embedding model; this crate only
/// depends on the shape of the output, so the boundary is a trait.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic, offline embedder using the hashing trick: each token is
/// hashed into one of `EMBEDDING_DIM` buckets and contributes +1/-1
/// (sign taken from another bit of the same hash, to reduce collision bias)
/// before the vector is L2-normalized. No semantic understanding, but
/// shared vocabulary between two texts reliably produces a higher cosine
/// score than disjoint vocabulary, which is what the retrieval scoring
/// logic and its tests rely on.
pub struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; EMBEDDING_DIM];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % EMBEDDING_DIM;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two equal-length vectors, in `[-1.0, 1.0]`.
/// Returns `0.0` for a zero vector (e.g. an empty-text embedding) rather
/// than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Little-endian `f32` blob, the on-disk representation for both
/// `persistent_memories.embedding` and `memory_chunks.summary_embedding`.
pub fn serialize_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn deserialize_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_has_fixed_dimension() {
        let v = HashEmbedder.embed("hello world");
        assert_eq!(v.len(), EMBEDDING_DIM);
    }

    #[test]
    fn same_text_embeds_identically() {
        let e = HashEmbedder;
        assert_eq!(e.embed("same input"), e.embed("same input"));
    }

    #[test]
    fn shared_vocabulary_scores_higher_than_disjoint() {
        let e = HashEmbedder;
        let query = e.embed("typescript preference");
        let relevant = e.embed("User prefers TypeScript for new projects");
        let irrelevant = e.embed("The weather in Lisbon is mild in autumn");
        assert!(cosine_similarity(&query, &relevant) > cosine_similarity(&query, &irrelevant));
    }

    #[test]
    fn vector_roundtrips_through_blob_encoding() {
        let v = HashEmbedder.embed("roundtrip me");
        let bytes = serialize_vector(&v);
        assert_eq!(deserialize_vector(&bytes), v);
    }
}
