use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

pub const SCALE: f64 = 20.0;

/// Rescales `value` out of `max_value` onto the 0-20 basis.
///
/// Values above `max_value` are passed through, so the result may exceed 20.
pub fn normalize(grade_id: Uuid, value: f64, max_value: f64) -> EngineResult<f64> {
    if !value.is_finite() {
        return Err(EngineError::MalformedGrade {
            grade_id,
            field: "value",
        });
    }
    if !max_value.is_finite() {
        return Err(EngineError::MalformedGrade {
            grade_id,
            field: "max value",
        });
    }
    if max_value <= 0.0 {
        return Err(EngineError::InvalidScale {
            grade_id,
            max_value,
        });
    }

    let normalized = value / max_value * SCALE;
    if !normalized.is_finite() {
        return Err(EngineError::MalformedGrade {
            grade_id,
            field: "normalized value",
        });
    }

    Ok(normalized)
}

/// Output rounding, applied once at the reporting boundary.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
