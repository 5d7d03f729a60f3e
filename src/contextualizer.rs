//! Chunk contextualization.
//!
//! Before indexing, each chunk can be prefixed with a short model-written
//! situating passage so that retrieval sees the chunk in the light of its
//! whole document. Opt-in per ingestion run; errors abort the run rather
//! than indexing half-contextualized chunks.

use tracing::debug;

use crate::config::PromptsConfig;
use crate::error::Result;
use crate::llm::{strip_thinking, ChatModel};
use crate::models::{Chunk, Document, Message};

pub struct Contextualizer<'a> {
    model: &'a dyn ChatModel,
    prompt_template: &'a str,
}

impl<'a> Contextualizer<'a> {
    pub fn new(model: &'a dyn ChatModel, prompts: &'a PromptsConfig) -> Self {
        Self {
            model,
            prompt_template: &prompts.context_prompt,
        }
    }

    /// Produce a contextualized copy of one chunk. The original content is
    /// kept verbatim after the generated context and a blank line.
    pub async fn contextualize(&self, document: &Document, chunk: &Chunk) -> Result<Chunk> {
        let prompt = self
            .prompt_template
            .replace("{document}", &document.content)
            .replace("{chunk}", &chunk.content);

        let raw = self.model.invoke(&[Message::user(prompt)]).await?;
        let context = strip_thinking(&raw)?;
        debug!(source = %chunk.source, context_len = context.len(), "contextualized chunk");

        Ok(Chunk::new(
            format!("{}\n\n{}", context.trim(), chunk.content),
            chunk.source.clone(),
        ))
    }

    /// Contextualize every chunk of one document, in order.
    pub async fn contextualize_all(
        &self,
        document: &Document,
        chunks: &[Chunk],
    ) -> Result<Vec<Chunk>> {
        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            out.push(self.contextualize(document, chunk).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use futures_util::stream::BoxStream;

    struct StubModel {
        reply: String,
    }

    #[async_trait]
    impl ChatModel for StubModel {
        async fn invoke(&self, _messages: &[Message]) -> Result<String> {
            Ok(self.reply.clone())
        }

        async fn stream(
            &self,
            _messages: &[Message],
        ) -> Result<BoxStream<'static, Result<String>>> {
            unimplemented!("not used in contextualizer tests")
        }
    }

    fn prompts() -> PromptsConfig {
        PromptsConfig::default()
    }

    #[tokio::test]
    async fn prepends_context_and_keeps_original_content() {
        let model = StubModel {
            reply: "This chunk covers billing.".to_string(),
        };
        let prompts = prompts();
        let contextualizer = Contextualizer::new(&model, &prompts);
        let doc = Document::new("handbook.txt", "full handbook text");
        let chunk = Chunk::new("refunds take five days", "handbook.txt");

        let result = contextualizer.contextualize(&doc, &chunk).await.unwrap();
        assert_eq!(
            result.content,
            "This chunk covers billing.\n\nrefunds take five days"
        );
        assert_eq!(result.source, "handbook.txt");
    }

    #[tokio::test]
    async fn strips_thinking_from_generated_context() {
        let model = StubModel {
            reply: "<think>hmm</think>About refunds.".to_string(),
        };
        let prompts = prompts();
        let contextualizer = Contextualizer::new(&model, &prompts);
        let doc = Document::new("handbook.txt", "text");
        let chunk = Chunk::new("refunds take five days", "handbook.txt");

        let result = contextualizer.contextualize(&doc, &chunk).await.unwrap();
        assert!(result.content.starts_with("About refunds."));
        assert!(!result.content.contains("<think>"));
    }

    #[tokio::test]
    async fn malformed_output_fails_the_run() {
        let model = StubModel {
            reply: "<think>never closed".to_string(),
        };
        let prompts = prompts();
        let contextualizer = Contextualizer::new(&model, &prompts);
        let doc = Document::new("handbook.txt", "text");
        let chunks = vec![Chunk::new("a chunk", "handbook.txt")];

        let err = contextualizer
            .contextualize_all(&doc, &chunks)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedModelOutput));
    }

    #[tokio::test]
    async fn contextualize_all_preserves_order() {
        let model = StubModel {
            reply: "ctx".to_string(),
        };
        let prompts = prompts();
        let contextualizer = Contextualizer::new(&model, &prompts);
        let doc = Document::new("doc.txt", "text");
        let chunks = vec![
            Chunk::new("first", "doc.txt"),
            Chunk::new("second", "doc.txt"),
        ];

        let result = contextualizer
            .contextualize_all(&doc, &chunks)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[0].content.ends_with("first"));
        assert!(result[1].content.ends_with("second"));
    }
}
