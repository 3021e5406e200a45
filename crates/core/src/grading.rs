//! Pure grading of quiz answers against their question definitions.
//!
//! Grading never fails: missing answers downgrade to `Unanswered`, failing
//! coding cases to `Failed`. Callers always get a complete result set they
//! can score, whatever the payload looked like.

use std::collections::HashMap;

use crate::model::{
    AnswerOutcome, CodingDetail, Question, QuestionId, QuestionResult, QuestionType, TestCase,
    TestCaseResult,
};

//
// ─── SCORING ───────────────────────────────────────────────────────────────────
//

/// Rounds to two decimal places, the precision scores are recorded at.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of correct answers, rounded to two decimals; 0 for an empty set.
#[must_use]
pub fn score_percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = correct as f64 / total as f64;
    round2(ratio * 100.0)
}

//
// ─── PER-QUESTION GRADING ──────────────────────────────────────────────────────
//

/// Case-insensitive, whitespace-trimmed equality for choice and boolean
/// answers. No partial credit.
#[must_use]
pub fn grade_choice(user_answer: &str, correct_answer: &str) -> bool {
    user_answer.trim().to_lowercase() == correct_answer.trim().to_lowercase()
}

/// Grades a coding answer against its test cases.
///
/// A case passes when its expected output appears as a case-insensitive
/// substring of the submitted code; the question passes only when every case
/// does. The substring oracle is the contract: the system stores no
/// executable harness, so grading must not pretend to run anything.
#[must_use]
pub fn grade_coding(user_code: &str, test_cases: &[TestCase]) -> CodingDetail {
    let code_lower = user_code.to_lowercase();
    let mut passed_tests = 0;
    let mut cases = Vec::with_capacity(test_cases.len());

    for case in test_cases {
        let passed = code_lower.contains(&case.expected_output.to_lowercase());
        if passed {
            passed_tests += 1;
        }
        cases.push(TestCaseResult {
            input: case.input.clone(),
            expected: case.expected_output.clone(),
            passed,
        });
    }

    CodingDetail {
        score: score_percent(passed_tests, test_cases.len()),
        passed_tests,
        total_tests: test_cases.len(),
        cases,
    }
}

/// Grades one question against an optional submitted answer.
///
/// `None` records the question as unanswered, which counts as incorrect in
/// aggregate scoring. The dispatch is exhaustive over [`QuestionType`].
#[must_use]
pub fn grade_question(question: &Question, user_answer: Option<&str>) -> QuestionResult {
    let Some(answer) = user_answer else {
        return QuestionResult {
            question_id: question.id,
            question_type: question.question_type,
            outcome: AnswerOutcome::Unanswered,
            details: None,
        };
    };

    match question.question_type {
        QuestionType::MultipleChoice | QuestionType::TrueFalse => {
            let outcome = if grade_choice(answer, &question.correct_answer) {
                AnswerOutcome::Correct
            } else {
                AnswerOutcome::Incorrect
            };
            QuestionResult {
                question_id: question.id,
                question_type: question.question_type,
                outcome,
                details: None,
            }
        }
        QuestionType::Coding => {
            let detail = grade_coding(answer, &question.test_cases);
            // vacuously passed with an empty case list, score fallback stays 0
            let outcome = if detail.passed_tests == detail.total_tests {
                AnswerOutcome::Passed
            } else {
                AnswerOutcome::Failed
            };
            QuestionResult {
                question_id: question.id,
                question_type: question.question_type,
                outcome,
                details: Some(detail),
            }
        }
    }
}

//
// ─── WHOLE-SUBMISSION GRADING ──────────────────────────────────────────────────
//

/// Graded view of a full answer payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedSet {
    pub results: Vec<QuestionResult>,
    pub correct_count: usize,
    pub total_questions: usize,
}

impl GradedSet {
    /// Aggregate score over the question set, two-decimal rounded.
    #[must_use]
    pub fn score(&self) -> f64 {
        score_percent(self.correct_count, self.total_questions)
    }
}

/// Grades every question of a quiz against the submitted answer map.
///
/// Questions keep their quiz order in the result list. Answers keyed by ids
/// the quiz does not contain are ignored.
#[must_use]
pub fn grade_submission(
    questions: &[Question],
    answers: &HashMap<QuestionId, String>,
) -> GradedSet {
    let mut results = Vec::with_capacity(questions.len());
    let mut correct_count = 0;

    for question in questions {
        let result = grade_question(question, answers.get(&question.id).map(String::as_str));
        if result.outcome.is_correct() {
            correct_count += 1;
        }
        results.push(result);
    }

    GradedSet {
        results,
        correct_count,
        total_questions: questions.len(),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
