/// Errors raised while building or decoding a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// A course mark outside `0..=100`.
    #[error("mark {mark} for course {course:?} is out of range (max {max})")]
    MarkOutOfRange { course: String, mark: i64, max: u8 },

    /// The markup body is missing a field, has a bad value, or is not
    /// well-formed.
    #[error("invalid record body: {0}")]
    Malformed(String),
}

impl RecordError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;
