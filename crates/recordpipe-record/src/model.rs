use serde::Serialize;

use crate::error::{RecordError, Result};

/// Highest mark a course can carry.
pub const MAX_MARK: u8 = 100;

/// Averages at or above this value pass.
pub const PASS_MARK: f64 = 50.0;

/// One course and the mark obtained in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseMark {
    course: String,
    mark: u8,
}

impl CourseMark {
    /// Create a course mark, rejecting marks above [`MAX_MARK`].
    pub fn new(course: impl Into<String>, mark: u8) -> Result<Self> {
        let course = course.into();
        if mark > MAX_MARK {
            return Err(RecordError::MarkOutOfRange {
                course,
                mark: i64::from(mark),
                max: MAX_MARK,
            });
        }
        Ok(Self { course, mark })
    }

    /// Create a course mark, clamping marks above [`MAX_MARK`].
    pub fn saturating(course: impl Into<String>, mark: u8) -> Self {
        Self {
            course: course.into(),
            mark: mark.min(MAX_MARK),
        }
    }

    /// Create a course mark from a wider integer, as parsed from text.
    pub fn from_i64(course: impl Into<String>, mark: i64) -> Result<Self> {
        let course = course.into();
        match u8::try_from(mark) {
            Ok(mark) => Self::new(course, mark),
            Err(_) => Err(RecordError::MarkOutOfRange {
                course,
                mark,
                max: MAX_MARK,
            }),
        }
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn mark(&self) -> u8 {
        self.mark
    }
}

/// A student's identity, programme and course marks.
///
/// Marks keep the order they were supplied in. Duplicate course names are
/// kept as separate entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    name: String,
    student_id: String,
    programme: String,
    marks: Vec<CourseMark>,
}

impl Record {
    /// Create a record from its parts.
    pub fn new(
        name: impl Into<String>,
        student_id: impl Into<String>,
        programme: impl Into<String>,
        marks: Vec<CourseMark>,
    ) -> Self {
        Self {
            name: name.into(),
            student_id: student_id.into(),
            programme: programme.into(),
            marks,
        }
    }

    /// Start building a record field by field.
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn programme(&self) -> &str {
        &self.programme
    }

    pub fn marks(&self) -> &[CourseMark] {
        &self.marks
    }

    /// Mean of all marks, or `0.0` when there are none.
    pub fn average(&self) -> f64 {
        if self.marks.is_empty() {
            return 0.0;
        }
        let total: u64 = self.marks.iter().map(|m| u64::from(m.mark)).sum();
        total as f64 / self.marks.len() as f64
    }

    /// True when [`average`](Self::average) is at least [`PASS_MARK`].
    pub fn passed(&self) -> bool {
        self.average() >= PASS_MARK
    }
}

/// Incremental [`Record`] construction.
#[derive(Debug, Default, Clone)]
pub struct RecordBuilder {
    name: String,
    student_id: String,
    programme: String,
    marks: Vec<CourseMark>,
}

impl RecordBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn student_id(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = student_id.into();
        self
    }

    pub fn programme(mut self, programme: impl Into<String>) -> Self {
        self.programme = programme.into();
        self
    }

    /// Append a course mark. Fails if the mark is above [`MAX_MARK`].
    pub fn mark(mut self, course: impl Into<String>, mark: u8) -> Result<Self> {
        self.marks.push(CourseMark::new(course, mark)?);
        Ok(self)
    }

    pub fn build(self) -> Record {
        Record::new(self.name, self.student_id, self.programme, self.marks)
    }
}
