//! Conversation engine.
//!
//! One question produces one event stream: `Sources` after retrieval, then
//! answer fragments in generation order, then a single `FinalAnswer`. The
//! turn is pull-driven end to end; the exchange is committed to history only
//! at the moment the consumer receives `FinalAnswer`, so an abandoned stream
//! leaves history untouched.

use futures_util::stream::{self, BoxStream, Stream};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::PromptsConfig;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::{strip_thinking, ChatModel};
use crate::models::{ChatEvent, Chunk, Message};
use crate::retriever::{HybridRetriever, Reranker};

pub struct ChatEngine {
    model: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    prompts: PromptsConfig,
    retriever: Option<HybridRetriever>,
    history: Arc<Mutex<Vec<Message>>>,
}

enum TurnState {
    Retrieve {
        question: String,
    },
    Generate {
        question: String,
        messages: Vec<Message>,
        inner: Option<BoxStream<'static, Result<String>>>,
        answer: String,
    },
    Done,
}

impl ChatEngine {
    pub fn new(
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        prompts: PromptsConfig,
    ) -> Self {
        Self {
            model,
            embedder,
            reranker,
            prompts,
            retriever: None,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Swap the active retrieval scope. `None` makes the engine answer from
    /// conversation history alone.
    pub fn set_retriever(&mut self, retriever: Option<HybridRetriever>) {
        self.retriever = retriever;
    }

    /// Snapshot of the committed conversation history.
    pub async fn history(&self) -> Vec<Message> {
        self.history.lock().await.clone()
    }

    fn render_context(&self, chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .map(|chunk| {
                self.prompts
                    .file_template
                    .replace("{name}", &chunk.source)
                    .replace("{content}", &chunk.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn build_messages(&self, question: &str, chunks: &[Chunk]) -> Vec<Message> {
        let query = self
            .prompts
            .query_template
            .replace("{context}", &self.render_context(chunks))
            .replace("{question}", question);

        let mut messages = vec![Message::system(self.prompts.system_prompt.clone())];
        messages.extend(self.history.lock().await.iter().cloned());
        messages.push(Message::user(query));
        messages
    }

    /// Run one question-answer turn. See the module docs for the event
    /// contract.
    pub fn ask<'a>(&'a self, question: &str) -> impl Stream<Item = Result<ChatEvent>> + 'a {
        let initial = TurnState::Retrieve {
            question: question.to_string(),
        };

        stream::unfold(initial, move |state| async move {
            match state {
                TurnState::Retrieve { question } => {
                    let chunks = match &self.retriever {
                        Some(retriever) => {
                            match retriever
                                .retrieve(&question, self.embedder.as_ref(), self.reranker.as_ref())
                                .await
                            {
                                Ok(chunks) => chunks,
                                Err(err) => return Some((Err(err), TurnState::Done)),
                            }
                        }
                        None => Vec::new(),
                    };
                    debug!(sources = chunks.len(), "turn retrieval complete");

                    let messages = self.build_messages(&question, &chunks).await;
                    Some((
                        Ok(ChatEvent::Sources(chunks)),
                        TurnState::Generate {
                            question,
                            messages,
                            inner: None,
                            answer: String::new(),
                        },
                    ))
                }
                TurnState::Generate {
                    question,
                    messages,
                    inner,
                    mut answer,
                } => {
                    let mut inner = match inner {
                        Some(inner) => inner,
                        None => match self.model.stream(&messages).await {
                            Ok(inner) => inner,
                            Err(err) => return Some((Err(err), TurnState::Done)),
                        },
                    };

                    loop {
                        match inner.next().await {
                            Some(Ok(fragment)) => {
                                if fragment.is_empty() {
                                    continue;
                                }
                                answer.push_str(&fragment);
                                return Some((
                                    Ok(ChatEvent::Chunk(fragment)),
                                    TurnState::Generate {
                                        question,
                                        messages,
                                        inner: Some(inner),
                                        answer,
                                    },
                                ));
                            }
                            Some(Err(err)) => return Some((Err(err), TurnState::Done)),
                            None => {
                                let final_answer = match strip_thinking(&answer) {
                                    Ok(final_answer) => final_answer,
                                    Err(err) => return Some((Err(err), TurnState::Done)),
                                };

                                let mut history = self.history.lock().await;
                                history.push(Message::user(question));
                                history.push(Message::assistant(final_answer.clone()));

                                return Some((
                                    Ok(ChatEvent::FinalAnswer(final_answer)),
                                    TurnState::Done,
                                ));
                            }
                        }
                    }
                }
                TurnState::Done => None,
            }
        })
    }
}
