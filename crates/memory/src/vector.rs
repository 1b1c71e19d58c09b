//! Vector similarity utilities.
//!
//! Pure-Rust cosine similarity and ranking over embedded memory entries.

use docloom_core::memory::MemoryEntry;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank entries by cosine similarity to a query embedding.
///
/// Returns entries sorted by descending similarity, with `score` set to the
/// cosine similarity value. Only entries that have embeddings and meet the
/// minimum score threshold are included — there is no fixed-size fallback
/// when nothing clears the threshold.
pub fn rank_by_similarity(
    entries: &[MemoryEntry],
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<MemoryEntry> {
    let mut scored: Vec<(f32, MemoryEntry)> = entries
        .iter()
        .filter_map(|entry| {
            let emb = entry.embedding.as_ref()?;
            let sim = cosine_similarity(emb, query_embedding);
            if sim >= min_score {
                let mut e = entry.clone();
                e.score = sim;
                Some((sim, e))
            } else {
                None
            }
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored.into_iter().map(|(_, e)| e).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docloom_core::memory::MemoryScope;

    fn entry(id: &str, embedding: Option<Vec<f32>>) -> MemoryEntry {
        MemoryEntry {
            id: id.into(),
            question: format!("Question {id}"),
            answer: format!("Answer {id}"),
            scope: MemoryScope::default(),
            created_at: Utc::now(),
            score: 0.0,
            embedding,
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn cosine_empty_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,1] · [1,0] = 1, |[1,1]| = sqrt(2), |[1,0]| = 1
        // similarity = 1 / sqrt(2) ≈ 0.7071
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[test]
    fn rank_orders_by_similarity() {
        let query = vec![1.0, 0.0, 0.0];
        let entries = vec![
            entry("a", Some(vec![0.0, 1.0, 0.0])), // orthogonal = 0
            entry("b", Some(vec![1.0, 0.0, 0.0])), // identical = 1
            entry("c", Some(vec![0.5, 0.5, 0.0])), // partial = ~0.707
        ];

        let results = rank_by_similarity(&entries, &query, 10, 0.0);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "c");
        assert_eq!(results[2].id, "a");
    }

    #[test]
    fn rank_respects_min_score() {
        let query = vec![1.0, 0.0];
        let entries = vec![
            entry("a", Some(vec![1.0, 0.0])), // sim = 1.0
            entry("b", Some(vec![0.0, 1.0])), // sim = 0.0
        ];

        let results = rank_by_similarity(&entries, &query, 10, 0.5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn rank_skips_no_embedding() {
        let query = vec![1.0, 0.0];
        let entries = vec![entry("a", Some(vec![1.0, 0.0])), entry("b", None)];

        let results = rank_by_similarity(&entries, &query, 10, 0.0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn rank_respects_limit() {
        let query = vec![1.0, 0.0];
        let entries: Vec<_> = (0..10)
            .map(|i| entry(&format!("e{i}"), Some(vec![1.0, i as f32 * 0.1])))
            .collect();

        let results = rank_by_similarity(&entries, &query, 3, 0.0);
        assert_eq!(results.len(), 3);
    }
}
