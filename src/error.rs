use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    /// `max_value <= 0`. Aggregation excludes the record instead of failing.
    #[error("grade {grade_id} has an invalid scale (max value {max_value})")]
    InvalidScale { grade_id: Uuid, max_value: f64 },

    #[error("grade {grade_id} has a non-numeric {field}")]
    MalformedGrade { grade_id: Uuid, field: &'static str },

    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
