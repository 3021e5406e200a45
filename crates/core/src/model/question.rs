use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── QUESTION TYPE ─────────────────────────────────────────────────────────────
//

/// Closed set of supported question kinds.
///
/// The grading dispatch matches on this enum exhaustively, so a new kind
/// cannot be added without the compiler pointing at every site that must
/// learn about it. Unknown type strings are rejected at the parse boundary
/// and never reach grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    Coding,
}

impl QuestionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::Coding => "coding",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced when an unknown question type string reaches the boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown question type: {0}")]
pub struct ParseQuestionTypeError(pub String);

impl FromStr for QuestionType {
    type Err = ParseQuestionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "coding" => Ok(QuestionType::Coding),
            other => Err(ParseQuestionTypeError(other.to_owned())),
        }
    }
}

//
// ─── TEST CASES ────────────────────────────────────────────────────────────────
//

/// A single input/expected-output pair for a coding question.
///
/// The oracle is a case-insensitive substring check of `expected_output`
/// against the submitted code, not execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

impl TestCase {
    #[must_use]
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single quiz question, immutable once the owning quiz is published.
///
/// `correct_answer` is the answer key for choice and boolean questions.
/// Coding questions carry `test_cases` instead; their `correct_answer` is
/// unused by grading. Each question weighs 1 in aggregate scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub question_type: QuestionType,
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    pub code_template: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl Question {
    /// A multiple-choice question with the given options and answer key.
    #[must_use]
    pub fn multiple_choice(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            question_type: QuestionType::MultipleChoice,
            options: Some(options),
            correct_answer: correct_answer.into(),
            code_template: None,
            test_cases: Vec::new(),
        }
    }

    /// A true/false question keyed on "true" or "false".
    #[must_use]
    pub fn true_false(id: QuestionId, text: impl Into<String>, correct_answer: bool) -> Self {
        Self {
            id,
            text: text.into(),
            question_type: QuestionType::TrueFalse,
            options: None,
            correct_answer: if correct_answer { "true" } else { "false" }.to_owned(),
            code_template: None,
            test_cases: Vec::new(),
        }
    }

    /// A coding question graded against the given test cases.
    #[must_use]
    pub fn coding(
        id: QuestionId,
        text: impl Into<String>,
        code_template: Option<String>,
        test_cases: Vec<TestCase>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            question_type: QuestionType::Coding,
            options: None,
            correct_answer: String::new(),
            code_template,
            test_cases,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
