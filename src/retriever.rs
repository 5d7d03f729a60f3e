//! Hybrid retrieval: semantic and lexical search fused by weighted
//! reciprocal rank, then reranked down to the chunks handed to the
//! generator.
//!
//! A retriever is built per conversation scope: it owns the scope's
//! embedding index and a lexical index rebuilt from the same chunk list, so
//! both sides always see an identical corpus.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::Result;
use crate::lexical::LexicalIndex;
use crate::models::Chunk;
use crate::vector_index::EmbeddingIndex;

/// Scores candidate chunks against a query and keeps the best `top_n`.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, candidates: Vec<Chunk>, top_n: usize)
        -> Result<Vec<Chunk>>;
}

/// Reranker that embeds query and candidates with a dedicated relevance
/// model and orders by cosine similarity.
pub struct EmbedReranker<E> {
    embedder: E,
}

impl<E: Embedder> EmbedReranker<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl<E: Embedder> Reranker for EmbedReranker<E> {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Chunk>,
        top_n: usize,
    ) -> Result<Vec<Chunk>> {
        if candidates.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let texts: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let mut scored: Vec<(usize, f32)> = vectors
            .iter()
            .enumerate()
            .map(|(idx, v)| (idx, cosine_similarity(&query_vector, v)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_n);

        Ok(scored
            .into_iter()
            .map(|(idx, _)| candidates[idx].clone())
            .collect())
    }
}

pub struct HybridRetriever {
    embedding_index: EmbeddingIndex,
    lexical_index: LexicalIndex,
    config: RetrievalConfig,
}

impl HybridRetriever {
    /// Build a retriever over one scope. The lexical index is rebuilt from
    /// the persisted chunk list each time a scope is opened.
    pub fn new(embedding_index: EmbeddingIndex, chunks: &[Chunk], config: RetrievalConfig) -> Self {
        Self {
            embedding_index,
            lexical_index: LexicalIndex::build(chunks),
            config,
        }
    }

    /// Run both searches, fuse, and rerank. Returns at most `top_n` chunks.
    pub async fn retrieve(
        &self,
        query: &str,
        embedder: &dyn Embedder,
        reranker: &dyn Reranker,
    ) -> Result<Vec<Chunk>> {
        let query_vector = embedder.embed(query).await?;
        let semantic = self
            .embedding_index
            .search(&query_vector, self.config.semantic_k);
        let lexical = self.lexical_index.search(query, self.config.lexical_k);
        debug!(
            semantic = semantic.len(),
            lexical = lexical.len(),
            "retrieval candidates"
        );

        let fused = fuse(
            &semantic,
            &lexical,
            self.config.semantic_weight as f32,
            self.config.lexical_weight as f32,
        );
        reranker.rerank(query, fused, self.config.top_n).await
    }
}

/// Weighted reciprocal rank fusion. Each list contributes
/// `weight / (rank + 1)` per chunk, ranks zero-based; chunks appearing in
/// both lists sum their contributions. Ties order by the semantic list
/// first, then the lexical list.
pub fn fuse(
    semantic: &[Chunk],
    lexical: &[Chunk],
    semantic_weight: f32,
    lexical_weight: f32,
) -> Vec<Chunk> {
    // Keyed by content+source so the same chunk from both lists merges.
    let mut scores: HashMap<(String, String), f32> = HashMap::new();
    let mut order: Vec<(String, String)> = Vec::new();
    let mut chunks: HashMap<(String, String), Chunk> = HashMap::new();

    let mut accumulate = |list: &[Chunk], weight: f32| {
        for (rank, chunk) in list.iter().enumerate() {
            let key = (chunk.content.clone(), chunk.source.clone());
            let contribution = weight / (rank as f32 + 1.0);
            if !scores.contains_key(&key) {
                order.push(key.clone());
                chunks.insert(key.clone(), chunk.clone());
            }
            *scores.entry(key).or_insert(0.0) += contribution;
        }
    };
    accumulate(semantic, semantic_weight);
    accumulate(lexical, lexical_weight);

    let mut ranked: Vec<(usize, (String, String))> = order.into_iter().enumerate().collect();
    ranked.sort_by(|(ai, ak), (bi, bk)| {
        scores[bk]
            .partial_cmp(&scores[ak])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(ai.cmp(bi))
    });

    ranked
        .into_iter()
        .map(|(_, key)| chunks[&key].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    fn chunk(tag: &str) -> Chunk {
        Chunk::new(tag, "test.txt")
    }

    #[test]
    fn fusion_merges_duplicates_across_lists() {
        let semantic = vec![chunk("a"), chunk("b")];
        let lexical = vec![chunk("b"), chunk("c")];
        let fused = fuse(&semantic, &lexical, 0.6, 0.4);

        // b scores 0.6/2 + 0.4/1 = 0.7, a scores 0.6, c scores 0.2.
        let contents: Vec<&str> = fused.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["b", "a", "c"]);
    }

    #[test]
    fn fusion_is_deterministic() {
        let semantic = vec![chunk("a"), chunk("b"), chunk("c")];
        let lexical = vec![chunk("d"), chunk("e")];
        let first = fuse(&semantic, &lexical, 0.6, 0.4);
        let second = fuse(&semantic, &lexical, 0.6, 0.4);
        assert_eq!(first, second);
    }

    #[test]
    fn equal_scores_order_by_semantic_list_first() {
        // Equal weights and disjoint lists: rank-0 entries tie, and the
        // semantic one must come first.
        let semantic = vec![chunk("sem")];
        let lexical = vec![chunk("lex")];
        let fused = fuse(&semantic, &lexical, 0.5, 0.5);
        assert_eq!(fused[0].content, "sem");
        assert_eq!(fused[1].content, "lex");
    }

    #[test]
    fn fusion_with_one_empty_list_keeps_the_other() {
        let semantic = vec![chunk("a"), chunk("b")];
        let fused = fuse(&semantic, &[], 0.6, 0.4);
        let contents: Vec<&str> = fused.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }

    /// Scores each candidate by the number it carries in its content.
    struct NumericReranker;

    #[async_trait]
    impl Reranker for NumericReranker {
        async fn rerank(
            &self,
            _query: &str,
            mut candidates: Vec<Chunk>,
            top_n: usize,
        ) -> Result<Vec<Chunk>> {
            candidates.sort_by(|a, b| {
                let score = |c: &Chunk| c.content.parse::<i32>().unwrap_or(0);
                score(b).cmp(&score(a))
            });
            candidates.truncate(top_n);
            Ok(candidates)
        }
    }

    #[tokio::test]
    async fn reranker_caps_at_top_n() {
        let candidates: Vec<Chunk> = (0..10).map(|i| chunk(&i.to_string())).collect();
        let kept = NumericReranker
            .rerank("q", candidates, 3)
            .await
            .unwrap();
        assert_eq!(kept.len(), 3);
        let contents: Vec<&str> = kept.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["9", "8", "7"]);
    }

    struct AxisEmbedder;

    fn axis_vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let axes = ["billing", "shipping"];
        let mut v: Vec<f32> = axes
            .iter()
            .map(|a| if lower.contains(a) { 1.0 } else { 0.0 })
            .collect();
        if v.iter().all(|&x| x == 0.0) {
            v[1] = 0.2;
        }
        v
    }

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(axis_vector(text))
        }

        fn dims(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn embed_reranker_prefers_the_relevant_candidate() {
        let reranker = EmbedReranker::new(AxisEmbedder);
        let candidates = vec![
            Chunk::new("shipping takes a week", "s.txt"),
            Chunk::new("billing runs monthly", "b.txt"),
        ];
        let kept = reranker
            .rerank("question about billing", candidates, 1)
            .await
            .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source, "b.txt");
    }

    #[tokio::test]
    async fn hybrid_retrieve_caps_at_top_n() {
        let chunks: Vec<Chunk> = vec![
            Chunk::new("billing cycle details", "b.txt"),
            Chunk::new("billing disputes process", "b.txt"),
            Chunk::new("shipping rates table", "s.txt"),
            Chunk::new("shipping delays policy", "s.txt"),
        ];
        let mut index = EmbeddingIndex::new(2);
        index.add(&chunks, &AxisEmbedder, 8).await.unwrap();

        let config = RetrievalConfig {
            top_n: 2,
            ..RetrievalConfig::default()
        };
        let retriever = HybridRetriever::new(index, &chunks, config);
        let reranker = EmbedReranker::new(AxisEmbedder);

        let results = retriever
            .retrieve("how does billing work", &AxisEmbedder, &reranker)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|c| c.source == "b.txt"));
    }
}
