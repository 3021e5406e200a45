use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LessonId};

/// The slice of a course the progress computations need: its identity and
/// ordered lesson list. Authoring, content, and scheduling live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub lessons: Vec<LessonId>,
    pub created_at: DateTime<Utc>,
}

impl Course {
    #[must_use]
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        lessons: Vec<LessonId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            lessons,
            created_at: now,
        }
    }

    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }

    #[must_use]
    pub fn has_lesson(&self, lesson: LessonId) -> bool {
        self.lessons.contains(&lesson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn lesson_membership() {
        let course = Course::new(
            CourseId::new(1),
            "Rust Basics",
            vec![LessonId::new(1), LessonId::new(2)],
            fixed_now(),
        );
        assert_eq!(course.lesson_count(), 2);
        assert!(course.has_lesson(LessonId::new(2)));
        assert!(!course.has_lesson(LessonId::new(3)));
    }
}
