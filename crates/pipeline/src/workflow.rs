//! Pipeline assembly and the public entry point.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use arcana_core::cards::{CardCatalog, DrawnCard};
use arcana_prompts::{Actor, PromptStore, StoreError};
use arcana_providers::ProviderManager;

use crate::stages::{self, StageContext};
use crate::state::{self, QuestionAnalysis, ReadingOutcome, ReadingState, StructuredReading};

/// Wall-clock limit for one full reading, provider calls included.
pub const PIPELINE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(55);

// ---------------------------------------------------------------------------
// Prompt source seam
// ---------------------------------------------------------------------------

/// Where the stages fetch their system prompts from.
///
/// Production binds this to [`PromptStore`]; pipeline tests substitute an
/// in-memory source so the graph runs without a database.
#[async_trait::async_trait]
pub trait PromptSource: Send + Sync {
    /// Plaintext of the active version of the named prompt.
    async fn active_prompt(
        &self,
        name: &str,
        user_id: Option<&str>,
    ) -> Result<String, StoreError>;
}

#[async_trait::async_trait]
impl PromptSource for PromptStore {
    async fn active_prompt(
        &self,
        name: &str,
        user_id: Option<&str>,
    ) -> Result<String, StoreError> {
        let actor = Actor {
            user_id: user_id.map(str::to_string),
            ..Actor::default()
        };
        self.get_active_prompt(name, &actor).await
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Everything a successful reading hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingOutput {
    pub cards: Vec<DrawnCard>,
    pub analysis: QuestionAnalysis,
    pub reading: StructuredReading,
}

/// Non-error terminal states: a reading, or a rejection with a reason the
/// user can act on.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReadingResponse {
    Success(ReadingOutput),
    Invalid { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The run exceeded [`PIPELINE_TIMEOUT`]. Retryable.
    #[error("The reading took too long. Please try again.")]
    Timeout,

    /// A stage failed in a way no fallback covers.
    #[error("Reading generation failed: {0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The per-request reading state machine.
///
/// Cheap to share: one instance serves all concurrent requests, each
/// [`execute`](Self::execute) call owning its own [`ReadingState`].
pub struct ReadingPipeline {
    ctx: StageContext,
}

impl ReadingPipeline {
    pub fn new(
        prompts: Arc<PromptStore>,
        providers: Arc<ProviderManager>,
        catalog: CardCatalog,
    ) -> Self {
        Self {
            ctx: StageContext {
                prompts,
                providers,
                catalog,
            },
        }
    }

    /// Wire in an alternative prompt source (tests, previews).
    pub fn with_prompt_source(
        prompts: Arc<dyn PromptSource>,
        providers: Arc<ProviderManager>,
        catalog: CardCatalog,
    ) -> Self {
        Self {
            ctx: StageContext {
                prompts,
                providers,
                catalog,
            },
        }
    }

    /// Run the full graph for one question.
    ///
    /// The whole run races [`PIPELINE_TIMEOUT`]; a run that loses the race
    /// surfaces as [`PipelineError::Timeout`] so callers can present it as
    /// retryable rather than broken.
    pub async fn execute(
        &self,
        question: &str,
        user_id: Option<String>,
    ) -> Result<ReadingResponse, PipelineError> {
        let started = Instant::now();
        let state = ReadingState::new(question, user_id);

        let result = match tokio::time::timeout(PIPELINE_TIMEOUT, self.run(state)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Reading pipeline timed out"
                );
                return Err(PipelineError::Timeout);
            }
        };

        match &result {
            Ok(ReadingResponse::Success(output)) => tracing::info!(
                cards = output.cards.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Reading completed"
            ),
            Ok(ReadingResponse::Invalid { reason }) => tracing::info!(
                reason,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Question rejected"
            ),
            Err(e) => tracing::error!(
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Reading failed"
            ),
        }
        result
    }

    async fn run(&self, mut state: ReadingState) -> Result<ReadingResponse, PipelineError> {
        stages::question_filter(&self.ctx, &mut state).await;
        stages::card_picker(&self.ctx, &mut state);
        stages::question_analyzer(&self.ctx, &mut state).await;
        stages::reading_agent(&self.ctx, &mut state).await;

        match state::classify(&state) {
            ReadingOutcome::Invalid => Ok(ReadingResponse::Invalid {
                reason: state
                    .validation_reason
                    .unwrap_or_else(|| "This question cannot be answered by a reading.".into()),
            }),
            ReadingOutcome::Error => Err(PipelineError::Failed(
                state
                    .error
                    .unwrap_or_else(|| "no reading was produced".into()),
            )),
            ReadingOutcome::Success => {
                // classify() only returns Success when a reading exists.
                let Some(reading) = state.reading else {
                    return Err(PipelineError::Failed("no reading was produced".into()));
                };
                Ok(ReadingResponse::Success(ReadingOutput {
                    cards: state.selected_cards,
                    analysis: state.analysis.unwrap_or_else(QuestionAnalysis::fallback),
                    reading,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use arcana_providers::{ChatMessage, ChatProvider, Completion, ProviderError, ProviderKind};

    use super::*;

    /// Hands out canned system prompts and records which names were asked for.
    struct StubPrompts {
        fetched: Mutex<Vec<String>>,
    }

    impl StubPrompts {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fetched: Mutex::new(Vec::new()),
            })
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl PromptSource for StubPrompts {
        async fn active_prompt(
            &self,
            name: &str,
            _user_id: Option<&str>,
        ) -> Result<String, StoreError> {
            self.fetched.lock().unwrap().push(name.to_string());
            Ok(format!("system prompt for {name}"))
        }
    }

    /// Replays a fixed script of completions, one per invocation, in order:
    /// filter, analyzer, reading agent.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
    }

    #[async_trait::async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn invoke(&self, _messages: &[ChatMessage]) -> Result<Completion, ProviderError> {
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("provider invoked more times than scripted");
            Ok(Completion {
                content,
                usage: None,
            })
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }
    }

    fn pipeline_with(
        replies: &[&str],
    ) -> (ReadingPipeline, Arc<StubPrompts>) {
        let prompts = StubPrompts::new();
        let provider: Arc<dyn ChatProvider> = Arc::new(ScriptedProvider {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
        });
        let manager = ProviderManager::with_providers(
            HashMap::from([(ProviderKind::OpenAi, provider)]),
            ProviderKind::OpenAi,
            None,
        );
        let pipeline = ReadingPipeline::with_prompt_source(
            Arc::clone(&prompts) as Arc<dyn PromptSource>,
            Arc::new(manager),
            CardCatalog::default(),
        );
        (pipeline, prompts)
    }

    const VALID: &str = r#"{"isValid": true}"#;
    const ANALYSIS: &str = r#"{"mood": "hopeful", "topic": "career", "period": "next month"}"#;
    const READING: &str = r#"{
        "header": "A turning point approaches",
        "reading": "The cards point toward change you have been preparing for.",
        "suggestions": ["Trust the groundwork you laid", "Name what you want"],
        "final": "Walk forward with intent.",
        "end": "May the cards guide you.",
        "notice": "For entertainment purposes only."
    }"#;

    #[tokio::test]
    async fn happy_path_produces_a_full_reading() {
        let (pipeline, prompts) = pipeline_with(&[VALID, ANALYSIS, READING]);

        let response = pipeline
            .execute("What does my career hold?", Some("user-1".into()))
            .await
            .unwrap();

        let ReadingResponse::Success(output) = response else {
            panic!("expected a successful reading");
        };
        assert!((3..=5).contains(&output.cards.len()));
        assert_eq!(output.analysis.mood, "hopeful");
        assert_eq!(output.reading.header, "A turning point approaches");
        assert_eq!(output.reading.suggestions.len(), 2);
        assert_eq!(
            prompts.fetched(),
            vec!["questionFilter", "questionAnalysis", "readingAgent"]
        );
    }

    #[tokio::test]
    async fn rejected_question_stops_before_cards() {
        let (pipeline, prompts) =
            pipeline_with(&[r#"{"isValid": false, "reason": "Ask about yourself, not others."}"#]);

        let response = pipeline.execute("Will my neighbor move?", None).await.unwrap();

        let ReadingResponse::Invalid { reason } = response else {
            panic!("expected a rejection");
        };
        assert_eq!(reason, "Ask about yourself, not others.");
        // Only the filter prompt was ever fetched.
        assert_eq!(prompts.fetched(), vec!["questionFilter"]);
    }

    #[tokio::test]
    async fn unparseable_filter_response_rejects_instead_of_failing() {
        let (pipeline, _) = pipeline_with(&["I am not JSON at all"]);

        let response = pipeline.execute("What about love?", None).await.unwrap();

        let ReadingResponse::Invalid { reason } = response else {
            panic!("expected a rejection");
        };
        assert!(!reason.is_empty());
    }

    #[tokio::test]
    async fn analyzer_garbage_degrades_to_fallback_triple() {
        let (pipeline, _) = pipeline_with(&[VALID, "mood: thoughtful, I suppose", READING]);

        let response = pipeline.execute("What should I focus on?", None).await.unwrap();

        let ReadingResponse::Success(output) = response else {
            panic!("expected a successful reading");
        };
        assert_eq!(output.analysis, QuestionAnalysis::fallback());
    }

    #[tokio::test]
    async fn malformed_reading_fails_the_run() {
        let (pipeline, _) =
            pipeline_with(&[VALID, ANALYSIS, r#"{"header": "only a header"}"#]);

        let err = pipeline
            .execute("What should I focus on?", None)
            .await
            .unwrap_err();

        match err {
            PipelineError::Failed(msg) => {
                assert!(msg.contains("reading agent"), "got: {msg}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_run_times_out() {
        struct HangingProvider;

        #[async_trait::async_trait]
        impl ChatProvider for HangingProvider {
            async fn invoke(
                &self,
                _messages: &[ChatMessage],
            ) -> Result<Completion, ProviderError> {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                unreachable!()
            }

            fn kind(&self) -> ProviderKind {
                ProviderKind::OpenAi
            }
        }

        let manager = ProviderManager::with_providers(
            HashMap::from([(
                ProviderKind::OpenAi,
                Arc::new(HangingProvider) as Arc<dyn ChatProvider>,
            )]),
            ProviderKind::OpenAi,
            None,
        );
        let pipeline = ReadingPipeline::with_prompt_source(
            StubPrompts::new() as Arc<dyn PromptSource>,
            Arc::new(manager),
            CardCatalog::default(),
        );

        let err = pipeline.execute("Anything?", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout));
    }
}
