//! Bag-of-words lexical index with BM25 ranking.
//!
//! Built fresh from the full chunk list of one index scope; never updated
//! incrementally. Rebuilding is O(total chunks) and happens once per
//! retriever session, not per query.

use std::collections::{HashMap, HashSet};

use crate::models::Chunk;

const K1: f32 = 1.2;
const B: f32 = 0.75;

pub struct LexicalIndex {
    chunks: Vec<Chunk>,
    doc_tokens: Vec<Vec<String>>,
    doc_freq: HashMap<String, usize>,
    avg_len: f32,
}

impl LexicalIndex {
    /// Build the index over a chunk list.
    pub fn build(chunks: &[Chunk]) -> Self {
        let doc_tokens: Vec<Vec<String>> =
            chunks.iter().map(|c| tokenize(&c.content)).collect();

        let mut doc_freq = HashMap::<String, usize>::new();
        for tokens in &doc_tokens {
            let mut seen = HashSet::new();
            for token in tokens {
                if seen.insert(token) {
                    *doc_freq.entry(token.clone()).or_insert(0) += 1;
                }
            }
        }

        let avg_len = if doc_tokens.is_empty() {
            0.0
        } else {
            doc_tokens.iter().map(|t| t.len() as f32).sum::<f32>() / doc_tokens.len() as f32
        };

        Self {
            chunks: chunks.to_vec(),
            doc_tokens,
            doc_freq,
            avg_len,
        }
    }

    /// Top-k chunks by BM25 score, descending. Chunks scoring zero are not
    /// returned. Ties keep chunk-list order.
    pub fn search(&self, query: &str, k: usize) -> Vec<Chunk> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || self.chunks.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(idx, _)| (idx, self.score(&query_tokens, idx)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(idx, _)| self.chunks[idx].clone())
            .collect()
    }

    fn score(&self, query_tokens: &[String], idx: usize) -> f32 {
        let doc_tokens = &self.doc_tokens[idx];
        if doc_tokens.is_empty() {
            return 0.0;
        }
        let doc_len = doc_tokens.len() as f32;
        let total_docs = self.chunks.len() as f32;

        let mut tf = HashMap::<&str, usize>::new();
        for token in doc_tokens {
            *tf.entry(token).or_insert(0) += 1;
        }

        let mut score = 0.0;
        for token in query_tokens {
            let Some(freq) = tf.get(token.as_str()) else {
                continue;
            };
            let df = self.doc_freq.get(token).copied().unwrap_or(1) as f32;
            let idf = ((total_docs - df + 0.5) / (df + 0.5)).ln().max(0.0);
            let numerator = (*freq as f32) * (K1 + 1.0);
            let denominator =
                (*freq as f32) + K1 * (1.0 - B + B * (doc_len / self.avg_len.max(1e-3)));
            score += idf * (numerator / denominator.max(1e-6));
        }
        score
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}
