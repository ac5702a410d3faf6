//! Nearest-neighbor index for holistic image embeddings.

/// Vector index keyed by photo id. `query` returns only ids whose similarity
/// clears the index's configured threshold, so an empty result means "no
/// near-duplicate known". Backed by a remote vector database in production;
/// [`CosineIndex`] is a conforming in-process implementation.
pub trait SimilarityIndex: Send + Sync {
    fn insert(&mut self, id: i64, embedding: &[f32]);
    fn query(&self, embedding: &[f32], top_k: usize) -> Vec<i64>;
}

/// Brute-force cosine-similarity index. Linear scan per query, which is fine
/// for the corpus sizes this pipeline targets.
pub struct CosineIndex {
    threshold: f32,
    entries: Vec<(i64, Vec<f32>)>,
}

impl CosineIndex {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl SimilarityIndex for CosineIndex {
    fn insert(&mut self, id: i64, embedding: &[f32]) {
        self.entries.push((id, embedding.to_vec()));
    }

    fn query(&self, embedding: &[f32], top_k: usize) -> Vec<i64> {
        let mut scored: Vec<(i64, f32)> = self
            .entries
            .iter()
            .map(|(id, e)| (*id, cosine_similarity(embedding, e)))
            .filter(|(_, score)| *score >= self.threshold)
            .collect();
        // Best match first; id breaks score ties deterministically.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);
        scored.into_iter().map(|(id, _)| id).collect()
    }
}
