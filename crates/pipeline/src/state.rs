//! Per-invocation pipeline state and terminal classification.

use serde::Serialize;

use arcana_core::cards::DrawnCard;

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

/// The analyzer's mood/topic/period triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionAnalysis {
    pub mood: String,
    pub topic: String,
    pub period: String,
}

impl QuestionAnalysis {
    /// Fixed fallback used when the analyzer response cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            mood: "neutral".into(),
            topic: "general".into(),
            period: "present".into(),
        }
    }
}

/// The reading agent's structured output.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredReading {
    pub header: String,
    pub reading: String,
    pub suggestions: Vec<String>,
    #[serde(rename = "final")]
    pub final_message: String,
    pub end: String,
    pub notice: String,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Transient, per-invocation state threaded through the stages.
///
/// Created at pipeline start, mutated by each stage, discarded at the
/// terminal state; never persisted as its own entity.
#[derive(Debug, Default)]
pub struct ReadingState {
    pub question: String,
    pub user_id: Option<String>,
    pub is_valid: Option<bool>,
    pub validation_reason: Option<String>,
    pub selected_cards: Vec<DrawnCard>,
    pub card_count: Option<usize>,
    pub analysis: Option<QuestionAnalysis>,
    pub reading: Option<StructuredReading>,
    /// Set by a stage that failed hard; drives the `Error` classification.
    pub error: Option<String>,
}

impl ReadingState {
    pub fn new(question: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            question: question.into(),
            user_id,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Terminal verdict of a pipeline run. Computed after the graph completes;
/// not a graph node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingOutcome {
    Success,
    Invalid,
    Error,
}

/// Classify a completed run.
///
/// A rejected question is `Invalid` even when the rejection path also
/// recorded an error (a filter that cannot parse its own response still
/// rejects the question rather than failing the run). Every other recorded
/// error, a missing card selection, or a missing reading is `Error`.
pub fn classify(state: &ReadingState) -> ReadingOutcome {
    if state.is_valid == Some(false) {
        return ReadingOutcome::Invalid;
    }
    if state.error.is_some() {
        return ReadingOutcome::Error;
    }
    if state.selected_cards.is_empty() {
        return ReadingOutcome::Error;
    }
    if state.reading.is_none() {
        return ReadingOutcome::Error;
    }
    ReadingOutcome::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_question_classifies_invalid() {
        let mut state = ReadingState::new("??", None);
        state.is_valid = Some(false);
        state.validation_reason = Some("too short".into());
        assert_eq!(classify(&state), ReadingOutcome::Invalid);
    }

    #[test]
    fn rejection_with_recorded_error_is_still_invalid() {
        let mut state = ReadingState::new("??", None);
        state.is_valid = Some(false);
        state.error = Some("filter response was not JSON".into());
        assert_eq!(classify(&state), ReadingOutcome::Invalid);
    }

    #[test]
    fn valid_run_without_cards_is_an_error() {
        let mut state = ReadingState::new("What about my career?", None);
        state.is_valid = Some(true);
        assert_eq!(classify(&state), ReadingOutcome::Error);
    }

    #[test]
    fn recorded_error_beats_everything_else_when_valid() {
        let mut state = ReadingState::new("What about my career?", None);
        state.is_valid = Some(true);
        state.error = Some("reading agent returned garbage".into());
        assert_eq!(classify(&state), ReadingOutcome::Error);
    }
}
