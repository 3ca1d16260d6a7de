//! Vector memory
//!
//! Two encoding schemes coexist: semantic embeddings of check-in
//! interactions and hand-built behavioral vectors. Each scheme gets its own
//! typed index so the two can never be mixed.

pub mod index;
pub mod semantic;

pub use index::{
    Behavioral, EncodingScheme, MemorySimilarityIndex, Semantic, SimilarityIndex, SimilarityMatch,
    StoredVector,
};
pub use semantic::{InteractionMetadata, InteractionRecord, SEMANTIC_DIMENSION};

/// Scale `vector` to unit length in place; an all-zero vector is left as is
pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for v in vector.iter_mut() {
            *v /= magnitude;
        }
    }
}

/// Cosine similarity of two equal-length vectors; zero when either is all-zero
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
