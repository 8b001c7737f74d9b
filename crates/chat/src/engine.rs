//! Chat orchestration
//!
//! Decides, per request, whether to answer plainly, with caller-supplied
//! context, or through retrieval, then calls the completion engine.
//! Routing is an explicit state machine: the empty-retrieval fallback is a
//! policy transition, not an error path. No state survives across
//! requests, and upstream failures surface to the caller unretried.

use crate::prompt::PromptTemplate;
use doctalk_common::completion::CompletionEngine;
use doctalk_common::config::ChatConfig;
use doctalk_common::errors::{AppError, Result};
use doctalk_common::metrics;
use doctalk_common::models::{ChatReply, ChatTurn};
use doctalk_common::TokenStream;
use doctalk_retrieval::{rewrite_query, Retriever};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// How the caller wants this turn handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Answer from the model alone (opportunistic retrieval only when
    /// `auto_rag` is enabled)
    Plain,
    /// Retrieve first, ground the answer in the hits
    Rag,
}

/// Resolved route for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    /// Answer with context (explicit or retrieved) under the grounded
    /// token budget and temperature
    Grounded { context: String },
    /// Retrieval found nothing relevant; answer the raw message under
    /// the plain budget
    PlainFallback,
    /// Plain completion, no context involved
    Plain,
}

/// Per-request chat orchestrator.
pub struct ChatEngine {
    retriever: Retriever,
    completion: Arc<dyn CompletionEngine>,
    template: PromptTemplate,
    config: ChatConfig,
}

impl ChatEngine {
    pub fn new(
        retriever: Retriever,
        completion: Arc<dyn CompletionEngine>,
        config: ChatConfig,
    ) -> Result<Self> {
        let template = PromptTemplate::new(&config.prompt_template)?;
        Ok(Self {
            retriever,
            completion,
            template,
            config,
        })
    }

    /// Answer one turn with a blocking completion call.
    pub async fn answer(&self, turn: &ChatTurn, mode: ChatMode) -> Result<ChatReply> {
        let started = Instant::now();
        match self.route(turn, mode).await? {
            Route::Grounded { context } => {
                let prompt = self.template.render(&context, &turn.message);
                let reply = self
                    .completion
                    .complete(
                        &prompt,
                        self.config.max_tokens_grounded,
                        self.config.temperature_grounded,
                    )
                    .await?;
                metrics::record_chat_answer("grounded");
                metrics::record_completion_duration(started.elapsed().as_secs_f64());
                Ok(ChatReply {
                    reply,
                    grounded: true,
                })
            }
            route => {
                let reply = self
                    .completion
                    .complete(
                        &turn.message,
                        self.config.max_tokens_plain,
                        self.config.temperature_plain,
                    )
                    .await?;
                metrics::record_chat_answer(route_label(&route));
                metrics::record_completion_duration(started.elapsed().as_secs_f64());
                Ok(ChatReply {
                    reply,
                    grounded: false,
                })
            }
        }
    }

    /// Answer one turn as an incremental fragment stream.
    ///
    /// Routing (including retrieval) happens before the stream is
    /// returned; dropping the stream stops upstream token consumption.
    pub async fn answer_stream(&self, turn: &ChatTurn, mode: ChatMode) -> Result<TokenStream> {
        match self.route(turn, mode).await? {
            Route::Grounded { context } => {
                let prompt = self.template.render(&context, &turn.message);
                metrics::record_chat_answer("grounded");
                self.completion
                    .complete_stream(
                        &prompt,
                        self.config.max_tokens_grounded,
                        self.config.temperature_grounded,
                    )
                    .await
            }
            route => {
                metrics::record_chat_answer(route_label(&route));
                self.completion
                    .complete_stream(
                        &turn.message,
                        self.config.max_tokens_plain,
                        self.config.temperature_plain,
                    )
                    .await
            }
        }
    }

    /// Resolve the route for one turn.
    ///
    /// Explicit context short-circuits everything: retrieval is never
    /// invoked for those turns.
    async fn route(&self, turn: &ChatTurn, mode: ChatMode) -> Result<Route> {
        if turn.message.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Message must not be empty".to_string(),
            });
        }

        if turn.has_explicit_context() {
            debug!("Using caller-supplied context");
            return Ok(Route::Grounded {
                context: turn.context.clone().unwrap_or_default(),
            });
        }

        match mode {
            ChatMode::Rag => {
                let query = rewrite_query(&turn.message);
                let hits = self
                    .retriever
                    .retrieve(&query, turn.source_filter.as_deref())
                    .await?;

                if hits.is_empty() {
                    warn!(message = %turn.message, "No relevant passages found, falling back to plain chat");
                    metrics::record_chat_fallback();
                    return Ok(Route::PlainFallback);
                }

                Ok(Route::Grounded {
                    context: self.retriever.assemble_context(&hits),
                })
            }
            ChatMode::Plain => {
                if self.config.auto_rag {
                    let query = rewrite_query(&turn.message);
                    let hits = self.retriever.retrieve(&query, None).await?;
                    if !hits.is_empty() {
                        return Ok(Route::Grounded {
                            context: self.retriever.assemble_context(&hits),
                        });
                    }
                    debug!("Opportunistic retrieval found nothing, answering plainly");
                }
                Ok(Route::Plain)
            }
        }
    }
}

fn route_label(route: &Route) -> &'static str {
    match route {
        Route::Grounded { .. } => "grounded",
        Route::PlainFallback => "fallback",
        Route::Plain => "plain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use doctalk_common::completion::MockCompletion;
    use doctalk_common::config::RetrievalConfig;
    use doctalk_common::models::{Passage, SearchHit};
    use doctalk_common::VectorIndex;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Index stub returning canned hits and recording every query.
    struct StubIndex {
        hits: Vec<SearchHit>,
        queries: Mutex<Vec<(String, Option<String>)>>,
        query_count: AtomicUsize,
    }

    impl StubIndex {
        fn with_hits(hits: Vec<SearchHit>) -> Arc<Self> {
            Arc::new(Self {
                hits,
                queries: Mutex::new(Vec::new()),
                query_count: AtomicUsize::new(0),
            })
        }

        fn empty() -> Arc<Self> {
            Self::with_hits(Vec::new())
        }

        fn count(&self) -> usize {
            self.query_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VectorIndex for StubIndex {
        async fn add(&self, _passages: Vec<Passage>) -> Result<()> {
            Ok(())
        }

        async fn query(
            &self,
            text: &str,
            _top_k: usize,
            _threshold: f32,
            source_filter: Option<&str>,
        ) -> Result<Vec<SearchHit>> {
            self.query_count.fetch_add(1, Ordering::SeqCst);
            self.queries
                .lock()
                .unwrap()
                .push((text.to_string(), source_filter.map(|s| s.to_string())));
            Ok(self.hits.clone())
        }
    }

    fn hit(text: &str) -> SearchHit {
        SearchHit {
            text: text.to_string(),
            source_filename: "doc.pdf".to_string(),
            score: 0.8,
        }
    }

    fn engine(index: Arc<StubIndex>, config: ChatConfig) -> (ChatEngine, Arc<MockCompletion>) {
        let completion = Arc::new(MockCompletion::new("the answer"));
        let retriever = Retriever::new(index, RetrievalConfig::default()).unwrap();
        let engine = ChatEngine::new(
            retriever,
            Arc::clone(&completion) as Arc<dyn CompletionEngine>,
            config,
        )
        .unwrap();
        (engine, completion)
    }

    #[tokio::test]
    async fn test_explicit_context_skips_retrieval() {
        let index = StubIndex::with_hits(vec![hit("indexed passage")]);
        let (engine, completion) = engine(Arc::clone(&index), ChatConfig::default());

        let turn = ChatTurn {
            message: "What does the report say?".to_string(),
            context: Some("The report says revenue doubled.".to_string()),
            source_filter: None,
        };
        let reply = engine.answer(&turn, ChatMode::Rag).await.unwrap();

        assert!(reply.grounded);
        assert_eq!(index.count(), 0);

        let calls = completion.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("The report says revenue doubled."));
        assert!(calls[0].prompt.contains("What does the report say?"));
        assert_eq!(calls[0].max_tokens, 512);
    }

    #[tokio::test]
    async fn test_rag_grounds_answer_in_retrieved_context() {
        let index = StubIndex::with_hits(vec![hit("passage one"), hit("passage two")]);
        let (engine, completion) = engine(Arc::clone(&index), ChatConfig::default());

        let turn = ChatTurn::new("Which vendors are named?");
        let reply = engine.answer(&turn, ChatMode::Rag).await.unwrap();

        assert!(reply.grounded);
        assert_eq!(index.count(), 1);

        let calls = completion.calls();
        assert!(calls[0].prompt.contains("passage one\n---\npassage two"));
        assert_eq!(calls[0].max_tokens, 512);
        assert!((calls[0].temperature - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_retrieval_falls_back_to_plain_exactly_once() {
        let index = StubIndex::empty();
        let (engine, completion) = engine(Arc::clone(&index), ChatConfig::default());

        let turn = ChatTurn::new("Something the corpus never mentions");
        let reply = engine.answer(&turn, ChatMode::Rag).await.unwrap();

        assert!(!reply.grounded);

        // Exactly one completion call, with the raw message and the plain
        // budget; the grounded path never ran
        let calls = completion.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, "Something the corpus never mentions");
        assert_eq!(calls[0].max_tokens, 120);
        assert!((calls[0].temperature - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_rag_uses_rewritten_query_and_source_filter() {
        let index = StubIndex::with_hits(vec![hit("p")]);
        let (engine, _) = engine(Arc::clone(&index), ChatConfig::default());

        let turn = ChatTurn {
            message: "Can you summarize this document?".to_string(),
            context: None,
            source_filter: Some("report.pdf".to_string()),
        };
        engine.answer(&turn, ChatMode::Rag).await.unwrap();

        let queries = index.queries.lock().unwrap();
        assert_eq!(
            queries[0],
            (
                "main topic content objective document".to_string(),
                Some("report.pdf".to_string())
            )
        );
    }

    #[tokio::test]
    async fn test_plain_mode_does_not_retrieve_by_default() {
        let index = StubIndex::with_hits(vec![hit("p")]);
        let (engine, completion) = engine(Arc::clone(&index), ChatConfig::default());

        let turn = ChatTurn::new("hi there");
        let reply = engine.answer(&turn, ChatMode::Plain).await.unwrap();

        assert!(!reply.grounded);
        assert_eq!(index.count(), 0);
        assert_eq!(completion.calls()[0].max_tokens, 120);
    }

    #[tokio::test]
    async fn test_auto_rag_grounds_plain_turns_when_hits_exist() {
        let index = StubIndex::with_hits(vec![hit("relevant passage")]);
        let config = ChatConfig {
            auto_rag: true,
            ..ChatConfig::default()
        };
        let (engine, completion) = engine(Arc::clone(&index), config);

        let turn = ChatTurn::new("What changed in Q3?");
        let reply = engine.answer(&turn, ChatMode::Plain).await.unwrap();

        assert!(reply.grounded);
        assert_eq!(index.count(), 1);
        // Opportunistic retrieval never applies the caller's filter
        assert_eq!(index.queries.lock().unwrap()[0].1, None);
        assert_eq!(completion.calls()[0].max_tokens, 512);
    }

    #[tokio::test]
    async fn test_auto_rag_without_hits_answers_plainly() {
        let index = StubIndex::empty();
        let config = ChatConfig {
            auto_rag: true,
            ..ChatConfig::default()
        };
        let (engine, completion) = engine(Arc::clone(&index), config);

        let reply = engine
            .answer(&ChatTurn::new("just chatting"), ChatMode::Plain)
            .await
            .unwrap();

        assert!(!reply.grounded);
        assert_eq!(completion.calls()[0].max_tokens, 120);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (engine, _) = engine(StubIndex::empty(), ChatConfig::default());
        let err = engine
            .answer(&ChatTurn::new("   "), ChatMode::Plain)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "validation_error");
    }

    #[tokio::test]
    async fn test_streaming_follows_the_same_routes() {
        let index = StubIndex::empty();
        let (engine, completion) = engine(Arc::clone(&index), ChatConfig::default());

        let stream = engine
            .answer_stream(&ChatTurn::new("unknown topic"), ChatMode::Rag)
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;

        assert_eq!(fragments.concat(), "the answer");
        // Fallback: plain budget on the streaming call too
        assert_eq!(completion.calls()[0].max_tokens, 120);
    }

    #[tokio::test]
    async fn test_streaming_grounded_prompt() {
        let index = StubIndex::with_hits(vec![hit("passage one")]);
        let (engine, completion) = engine(Arc::clone(&index), ChatConfig::default());

        let stream = engine
            .answer_stream(&ChatTurn::new("What does it say?"), ChatMode::Rag)
            .await
            .unwrap();
        let _ = stream.collect::<Vec<_>>().await;

        let calls = completion.calls();
        assert!(calls[0].prompt.starts_with("CONTEXT:\npassage one"));
        assert_eq!(calls[0].max_tokens, 512);
    }
}
