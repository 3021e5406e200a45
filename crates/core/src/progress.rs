//! Pure math for blending lesson and quiz completion into course progress.

use crate::grading::round2;

/// Quiz-completion percentage for a course, clamped to 100.
///
/// "Completed" means at least one recorded attempt, pass or fail. Zero when
/// the course has no quizzes.
#[must_use]
pub fn quiz_progress(completed_quizzes: usize, total_quizzes: usize) -> f64 {
    if total_quizzes == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let pct = (completed_quizzes as f64 / total_quizzes as f64) * 100.0;
    round2(pct.min(100.0))
}

/// Blends lesson and quiz progress into the overall course figure.
///
/// With quizzes present the two halves average; without quizzes the lesson
/// percentage stands alone. The clamp to 100 is mandatory even though the
/// inputs are individually bounded.
#[must_use]
pub fn overall_progress(lesson_progress: f64, quiz_progress: f64, total_quizzes: usize) -> f64 {
    let blended = if total_quizzes > 0 {
        (lesson_progress + quiz_progress) / 2.0
    } else {
        lesson_progress
    };
    round2(blended.min(100.0))
}
