use crate::models::{Progression, StudentPerformance, Trend};
use crate::normalize::round2;

/// Compares two periods of the same student. Both general averages are
/// already rounded, so exact equality is a reliable `Stable`.
pub fn track_progression(
    previous: &StudentPerformance,
    current: &StudentPerformance,
) -> Progression {
    let difference = current.general_average - previous.general_average;
    let trend = if difference > 0.0 {
        Trend::Up
    } else if difference < 0.0 {
        Trend::Down
    } else {
        Trend::Stable
    };

    Progression {
        student_id: current.student_id,
        previous_average: previous.general_average,
        current_average: current.general_average,
        progression: round2(difference),
        trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExclusionSummary, Trimester};
    use uuid::Uuid;

    fn performance(
        student_id: Uuid,
        trimester: Trimester,
        general_average: f64,
    ) -> StudentPerformance {
        StudentPerformance {
            student_id,
            trimester: Some(trimester),
            academic_year: Some("2024-2025".to_string()),
            general_average,
            subjects: Vec::new(),
            exclusions: ExclusionSummary::default(),
        }
    }

    #[test]
    fn equal_averages_are_stable() {
        let id = Uuid::new_v4();
        let result = track_progression(
            &performance(id, Trimester::First, 12.0),
            &performance(id, Trimester::Second, 12.0),
        );
        assert_eq!(result.trend, Trend::Stable);
        assert_eq!(result.progression, 0.0);
    }

    #[test]
    fn detects_direction() {
        let id = Uuid::new_v4();
        let up = track_progression(
            &performance(id, Trimester::First, 10.4),
            &performance(id, Trimester::Second, 12.1),
        );
        assert_eq!(up.trend, Trend::Up);
        assert_eq!(up.progression, 1.7);

        let down = track_progression(
            &performance(id, Trimester::Second, 12.1),
            &performance(id, Trimester::Third, 11.95),
        );
        assert_eq!(down.trend, Trend::Down);
        assert_eq!(down.progression, -0.15);
        assert_eq!(down.previous_average, 12.1);
        assert_eq!(down.current_average, 11.95);
    }

    #[test]
    fn trend_follows_the_unrounded_difference() {
        let id = Uuid::new_v4();
        let slight = track_progression(
            &performance(id, Trimester::First, 12.0),
            &performance(id, Trimester::Second, 12.004),
        );
        assert_eq!(slight.trend, Trend::Up);
        assert_eq!(slight.progression, 0.0);
    }
}
