//! The four pipeline stages.
//!
//! Every stage takes the shared context plus the mutable per-run state and
//! either advances it or records why it could not. Stages never panic and
//! never abort the graph; the terminal classification decides what a
//! recorded failure means.

use std::sync::Arc;

use arcana_core::cards::{draw_cards, CardCatalog, DrawnCard};
use arcana_prompts::StoreError;
use arcana_providers::{ChatMessage, ProviderError, ProviderManager};

use crate::parse::{self, ParseError};
use crate::state::{QuestionAnalysis, ReadingState, StructuredReading};
use crate::workflow::PromptSource;

/// Prompt template names the stages fetch.
pub const PROMPT_QUESTION_FILTER: &str = "questionFilter";
pub const PROMPT_QUESTION_ANALYSIS: &str = "questionAnalysis";
pub const PROMPT_READING_AGENT: &str = "readingAgent";

/// Reason shown when the filter's own response could not be understood.
const GENERIC_VALIDATION_REASON: &str =
    "We could not validate your question. Please rephrase it and try again.";

/// Reason shown when infrastructure failed before validation finished.
const GENERIC_SYSTEM_REASON: &str =
    "Something went wrong on our side. Please try again in a moment.";

/// Shared collaborators, cloned into every run.
pub(crate) struct StageContext {
    pub prompts: Arc<dyn PromptSource>,
    pub providers: Arc<ProviderManager>,
    pub catalog: CardCatalog,
}

/// Anything a provider-backed stage can trip over.
#[derive(Debug, thiserror::Error)]
enum StageError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

// ---------------------------------------------------------------------------
// Stage 1: question filter
// ---------------------------------------------------------------------------

/// Ask the model whether the question is answerable by a reading.
///
/// A response the filter itself cannot parse rejects the question with a
/// generic reason (and records the parse error); any other failure rejects
/// with a generic system reason. The pipeline never crashes here.
pub(crate) async fn question_filter(ctx: &StageContext, state: &mut ReadingState) {
    match run_filter(ctx, state).await {
        Ok((true, _)) => {
            state.is_valid = Some(true);
        }
        Ok((false, reason)) => {
            state.is_valid = Some(false);
            state.validation_reason =
                Some(reason.unwrap_or_else(|| GENERIC_VALIDATION_REASON.to_string()));
        }
        Err(StageError::Parse(e)) => {
            tracing::warn!(error = %e, "Question filter response unparseable");
            state.is_valid = Some(false);
            state.validation_reason = Some(GENERIC_VALIDATION_REASON.to_string());
            state.error = Some(format!("question filter: {e}"));
        }
        Err(e) => {
            tracing::error!(error = %e, "Question filter failed");
            state.is_valid = Some(false);
            state.validation_reason = Some(GENERIC_SYSTEM_REASON.to_string());
            state.error = Some(format!("question filter: {e}"));
        }
    }
}

async fn run_filter(
    ctx: &StageContext,
    state: &ReadingState,
) -> Result<(bool, Option<String>), StageError> {
    let prompt = ctx
        .prompts
        .active_prompt(PROMPT_QUESTION_FILTER, state.user_id.as_deref())
        .await?;
    let provider = ctx.providers.bind_with_prompt(prompt, None)?;
    let completion = provider
        .invoke(&[ChatMessage::user(state.question.clone())])
        .await?;

    let map = parse::parse_object(&completion.content)?;
    let is_valid = parse::require_bool(&map, "isValid")?;
    let reason = parse::optional_str(&map, "reason")?;
    Ok((is_valid, reason))
}

// ---------------------------------------------------------------------------
// Stage 2: card picker
// ---------------------------------------------------------------------------

/// Draw the spread. Skipped (empty selection) for rejected questions; an
/// undersized catalog is a hard failure, never a silent short draw.
pub(crate) fn card_picker(ctx: &StageContext, state: &mut ReadingState) {
    if state.is_valid != Some(true) {
        return;
    }
    match draw_cards(&ctx.catalog) {
        Ok(cards) => {
            state.card_count = Some(cards.len());
            state.selected_cards = cards;
        }
        Err(e) => {
            tracing::error!(error = %e, "Card draw failed");
            state.error = Some(format!("card picker: {e}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Stage 3: question analyzer
// ---------------------------------------------------------------------------

/// Extract the mood/topic/period triple from the question.
///
/// Skipped when the question was rejected or no cards were drawn. A
/// response that does not match the expected shape degrades to the fixed
/// fallback triple and is logged for observability only; a reading with a
/// generic analysis beats no reading. Infrastructure failures still fail
/// the run.
pub(crate) async fn question_analyzer(ctx: &StageContext, state: &mut ReadingState) {
    if state.is_valid != Some(true) || state.selected_cards.is_empty() {
        return;
    }
    match run_analyzer(ctx, state).await {
        Ok(analysis) => {
            state.analysis = Some(analysis);
        }
        Err(StageError::Parse(e)) => {
            tracing::warn!(error = %e, "Analyzer response unparseable, using fallback triple");
            state.analysis = Some(QuestionAnalysis::fallback());
        }
        Err(e) => {
            tracing::error!(error = %e, "Question analyzer failed");
            state.error = Some(format!("question analyzer: {e}"));
        }
    }
}

async fn run_analyzer(
    ctx: &StageContext,
    state: &ReadingState,
) -> Result<QuestionAnalysis, StageError> {
    let prompt = ctx
        .prompts
        .active_prompt(PROMPT_QUESTION_ANALYSIS, state.user_id.as_deref())
        .await?;
    let provider = ctx.providers.bind_with_prompt(prompt, None)?;
    let completion = provider
        .invoke(&[ChatMessage::user(state.question.clone())])
        .await?;

    let map = parse::parse_object(&completion.content)?;
    Ok(QuestionAnalysis {
        mood: parse::require_str(&map, "mood")?,
        topic: parse::require_str(&map, "topic")?,
        period: parse::require_str(&map, "period")?,
    })
}

// ---------------------------------------------------------------------------
// Stage 4: reading agent
// ---------------------------------------------------------------------------

/// Synthesize the structured reading from question, cards and analysis.
///
/// Unlike the analyzer there is no safe default for a malformed reading, so
/// a parse failure records an error and leaves the reading unset.
pub(crate) async fn reading_agent(ctx: &StageContext, state: &mut ReadingState) {
    if state.is_valid != Some(true) || state.selected_cards.is_empty() {
        return;
    }
    let Some(analysis) = state.analysis.clone() else {
        return;
    };
    match run_reading_agent(ctx, state, &analysis).await {
        Ok(reading) => {
            state.reading = Some(reading);
        }
        Err(e) => {
            tracing::error!(error = %e, "Reading agent failed");
            state.error = Some(format!("reading agent: {e}"));
        }
    }
}

async fn run_reading_agent(
    ctx: &StageContext,
    state: &ReadingState,
    analysis: &QuestionAnalysis,
) -> Result<StructuredReading, StageError> {
    let prompt = ctx
        .prompts
        .active_prompt(PROMPT_READING_AGENT, state.user_id.as_deref())
        .await?;
    let provider = ctx.providers.bind_with_prompt(prompt, None)?;

    let context = build_reading_context(&state.question, &state.selected_cards, analysis);

    let completion = provider.invoke(&[ChatMessage::user(context)]).await?;

    let map = parse::parse_object(&completion.content)?;
    Ok(StructuredReading {
        header: parse::require_str(&map, "header")?,
        reading: parse::require_str(&map, "reading")?,
        suggestions: parse::require_str_list(&map, "suggestions")?,
        final_message: parse::require_str(&map, "final")?,
        end: parse::require_str(&map, "end")?,
        notice: parse::require_str(&map, "notice")?,
    })
}

/// Context message embedding the question, the formatted card list and the
/// analysis triple.
fn build_reading_context(
    question: &str,
    cards: &[DrawnCard],
    analysis: &QuestionAnalysis,
) -> String {
    let card_lines: Vec<String> = cards
        .iter()
        .map(|d| {
            format!(
                "{}. {} ({} arcana) — {}",
                d.position, d.card.display_name, d.card.arcana, d.card.short_meaning
            )
        })
        .collect();

    format!(
        "Question: {question}\n\nCards drawn:\n{}\n\nQuestion analysis: mood={}, topic={}, period={}",
        card_lines.join("\n"),
        analysis.mood,
        analysis.topic,
        analysis.period
    )
}
