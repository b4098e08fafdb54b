//! Quiz sequencing and weakness tracking.
//!
//! Questions live in an append-only queue with a monotonic cursor.
//! Invariant: `cursor <= questions.len()`. When the cursor reaches the
//! end the engine asks for replenishment, with a busy flag so only one
//! request is ever in flight.

use crate::models::QuizQuestion;

/// What the quiz panel should show right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    /// No session yet.
    Inactive,
    /// Current question shown, no option chosen.
    AwaitingAnswer,
    /// An option was chosen; correctness and explanation are visible.
    Answered,
    /// Queue exhausted, replenishment in flight.
    FetchingMore,
    /// Replenishment failed; the learner can retry.
    FetchFailed,
}

/// Recorded outcome for the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecord {
    pub chosen: usize,
    pub correct: bool,
}

#[derive(Debug, Default)]
pub struct QuizEngine {
    questions: Vec<QuizQuestion>,
    cursor: usize,
    answered: Option<AnswerRecord>,
    fetching: bool,
    fetch_error: Option<String>,
    active: bool,
    weaknesses: Vec<String>,
    answered_count: usize,
    correct_count: usize,
}

impl QuizEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the engine with the seed questions from a fresh architecture.
    pub fn reset(&mut self, seed: Vec<QuizQuestion>) {
        *self = Self {
            questions: seed,
            active: true,
            ..Self::default()
        };
    }

    /// Drop all quiz state (session reset before the new seed arrives).
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn phase(&self) -> QuizPhase {
        if !self.active {
            QuizPhase::Inactive
        } else if self.cursor < self.questions.len() {
            if self.answered.is_some() {
                QuizPhase::Answered
            } else {
                QuizPhase::AwaitingAnswer
            }
        } else if self.fetching {
            QuizPhase::FetchingMore
        } else if self.fetch_error.is_some() {
            QuizPhase::FetchFailed
        } else {
            // Cursor just reached the end; the caller should start a fetch.
            QuizPhase::FetchingMore
        }
    }

    pub fn current(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn answer(&self) -> Option<AnswerRecord> {
        self.answered
    }

    pub fn weaknesses(&self) -> &[String] {
        &self.weaknesses
    }

    pub fn answered_count(&self) -> usize {
        self.answered_count
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn fetch_error(&self) -> Option<&str> {
        self.fetch_error.as_deref()
    }

    /// Record a selection for the current question.
    ///
    /// Exactly one answer is accepted per question; later selections are
    /// no-ops. Returns the correctness of a newly recorded answer.
    pub fn select(&mut self, option: usize) -> Option<bool> {
        if self.answered.is_some() {
            return None;
        }
        let question = self.questions.get(self.cursor)?;
        if option >= question.options.len() {
            return None;
        }
        let correct = option == question.answer;
        self.answered = Some(AnswerRecord {
            chosen: option,
            correct,
        });
        self.answered_count += 1;
        if correct {
            self.correct_count += 1;
        } else {
            let tag = question.tag().to_string();
            if !self.weaknesses.iter().any(|w| *w == tag) {
                self.weaknesses.push(tag);
            }
        }
        Some(correct)
    }

    /// Advance past an answered question. Returns true when the caller
    /// must start a replenishment fetch.
    pub fn advance(&mut self) -> bool {
        if self.answered.is_none() {
            return false;
        }
        self.answered = None;
        self.cursor += 1;
        self.needs_fetch()
    }

    pub fn needs_fetch(&self) -> bool {
        self.active && self.cursor >= self.questions.len() && !self.fetching
    }

    /// Claim the single in-flight fetch slot. Returns false if a fetch is
    /// already running, in which case the caller must not start another.
    pub fn begin_fetch(&mut self) -> bool {
        if self.fetching {
            return false;
        }
        self.fetching = true;
        self.fetch_error = None;
        true
    }

    /// Apply the result of a replenishment fetch. New questions append to
    /// the tail, which makes the current cursor valid again.
    pub fn complete_fetch(&mut self, result: Result<Vec<QuizQuestion>, String>) {
        self.fetching = false;
        match result {
            Ok(batch) => {
                if batch.is_empty() {
                    self.fetch_error = Some("backend returned no questions".to_string());
                } else {
                    self.questions.extend(batch);
                }
            }
            Err(message) => self.fetch_error = Some(message),
        }
        debug_assert!(self.cursor <= self.questions.len());
    }
}
