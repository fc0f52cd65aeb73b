use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::models::{EvaluationType, GradeRecord};
use crate::normalize::{normalize, round2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeBand {
    Excellent,
    VeryGood,
    Good,
    Fair,
    Insufficient,
}

impl GradeBand {
    pub const ALL: [GradeBand; 5] = [
        GradeBand::Excellent,
        GradeBand::VeryGood,
        GradeBand::Good,
        GradeBand::Fair,
        GradeBand::Insufficient,
    ];

    pub fn for_score(normalized: f64) -> Self {
        if normalized >= 16.0 {
            GradeBand::Excellent
        } else if normalized >= 14.0 {
            GradeBand::VeryGood
        } else if normalized >= 12.0 {
            GradeBand::Good
        } else if normalized >= 10.0 {
            GradeBand::Fair
        } else {
            GradeBand::Insufficient
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GradeBand::Excellent => "Excellent (16-20)",
            GradeBand::VeryGood => "Very good (14-16)",
            GradeBand::Good => "Good (12-14)",
            GradeBand::Fair => "Fair (10-12)",
            GradeBand::Insufficient => "Insufficient (<10)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandCount {
    pub band: GradeBand,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationTypeSummary {
    pub evaluation_type: EvaluationType,
    pub count: usize,
    pub average: f64,
}

/// Normalized scores of the grades that would take part in an average;
/// unresolved subjects and invalid scales are skipped the same way.
fn usable_scores(grades: &[GradeRecord]) -> EngineResult<Vec<(EvaluationType, f64)>> {
    let mut scores = Vec::with_capacity(grades.len());
    for grade in grades {
        if grade.subject.is_none() {
            continue;
        }
        match normalize(grade.id, grade.value, grade.max_value) {
            Ok(score) => scores.push((grade.evaluation_type, score)),
            Err(EngineError::InvalidScale { .. }) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(scores)
}

pub fn grade_distribution(grades: &[GradeRecord]) -> EngineResult<Vec<BandCount>> {
    let scores = usable_scores(grades)?;
    let mut counts = [0usize; 5];
    for (_, score) in scores {
        let band = GradeBand::for_score(score);
        if let Some(slot) = GradeBand::ALL.iter().position(|b| *b == band) {
            counts[slot] += 1;
        }
    }

    Ok(GradeBand::ALL
        .into_iter()
        .zip(counts)
        .map(|(band, count)| BandCount {
            band,
            label: band.label(),
            count,
        })
        .collect())
}

pub fn evaluation_type_breakdown(
    grades: &[GradeRecord],
) -> EngineResult<Vec<EvaluationTypeSummary>> {
    let scores = usable_scores(grades)?;

    Ok(EvaluationType::ALL
        .into_iter()
        .filter_map(|kind| {
            let (count, total) = scores
                .iter()
                .filter(|(k, _)| *k == kind)
                .fold((0usize, 0.0), |(c, t), (_, score)| (c + 1, t + score));
            (count > 0).then(|| EvaluationTypeSummary {
                evaluation_type: kind,
                count,
                average: round2(total / count as f64),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::average::fixtures::{grade, subject};
    use uuid::Uuid;

    #[test]
    fn bands_are_inclusive_on_lower_bound() {
        assert_eq!(GradeBand::for_score(16.0), GradeBand::Excellent);
        assert_eq!(GradeBand::for_score(15.99), GradeBand::VeryGood);
        assert_eq!(GradeBand::for_score(12.0), GradeBand::Good);
        assert_eq!(GradeBand::for_score(10.0), GradeBand::Fair);
        assert_eq!(GradeBand::for_score(9.99), GradeBand::Insufficient);
    }

    #[test]
    fn distribution_reports_every_band() {
        let student = Uuid::new_v4();
        let math = subject("MATH", None);
        let grades = vec![
            grade(student, &math, 18.0, 20.0, None),
            grade(student, &math, 85.0, 100.0, None),
            grade(student, &math, 4.0, 10.0, None),
            grade(student, &math, 5.0, 0.0, None),
        ];

        let distribution = grade_distribution(&grades).unwrap();
        assert_eq!(distribution.len(), 5);
        assert_eq!(distribution[0].count, 2);
        assert_eq!(distribution[1].count, 0);
        assert_eq!(distribution[4].count, 1);
        assert_eq!(distribution.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn breakdown_averages_per_type() {
        let student = Uuid::new_v4();
        let math = subject("MATH", None);
        let mut quiz = grade(student, &math, 6.0, 10.0, Some(4.0));
        quiz.evaluation_type = EvaluationType::Quiz;
        let grades = vec![
            grade(student, &math, 14.0, 20.0, None),
            grade(student, &math, 11.0, 20.0, Some(3.0)),
            quiz,
        ];

        let breakdown = evaluation_type_breakdown(&grades).unwrap();
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].evaluation_type, EvaluationType::Quiz);
        assert_eq!(breakdown[0].average, 12.0);
        assert_eq!(breakdown[1].evaluation_type, EvaluationType::Exam);
        assert_eq!(breakdown[1].count, 2);
        assert_eq!(breakdown[1].average, 12.5);
    }
}
