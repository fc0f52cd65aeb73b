use std::collections::BTreeMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    ExclusionSummary, GradeEntry, GradeRecord, StudentPerformance, SubjectPerformance, SubjectRef,
    Trimester,
};
use crate::normalize::{normalize, round2};

#[derive(Debug)]
struct SubjectAccumulator {
    subject: SubjectRef,
    total_weighted_score: f64,
    total_coefficients: f64,
    grades: Vec<GradeEntry>,
}

impl SubjectAccumulator {
    fn new(subject: SubjectRef) -> Self {
        Self {
            subject,
            total_weighted_score: 0.0,
            total_coefficients: 0.0,
            grades: Vec::new(),
        }
    }

    fn finish(mut self) -> SubjectPerformance {
        let raw_average = if self.total_coefficients > 0.0 {
            self.total_weighted_score / self.total_coefficients
        } else {
            0.0
        };
        self.grades.sort_by_key(|g| (g.date, g.grade_id));

        SubjectPerformance {
            subject_id: self.subject.id,
            coefficient: self.subject.weight(),
            name: self.subject.name,
            code: self.subject.code,
            average: round2(raw_average),
            raw_average,
            grades: self.grades,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectAggregation {
    pub subjects: Vec<SubjectPerformance>,
    pub exclusions: ExclusionSummary,
}

/// Groups one student's grades by subject and computes each subject's
/// coefficient-weighted average of normalized scores.
///
/// Grades without a resolved subject or with a non-positive scale are left
/// out and counted in `exclusions`. Subjects come back ordered by code.
pub fn aggregate_subjects(grades: &[GradeRecord]) -> EngineResult<SubjectAggregation> {
    // Sorting first makes the floating-point sums independent of input order.
    let mut ordered: Vec<&GradeRecord> = grades.iter().collect();
    ordered.sort_by_key(|g| (g.evaluation_date, g.id));

    let mut index: BTreeMap<Uuid, usize> = BTreeMap::new();
    let mut accumulators: Vec<SubjectAccumulator> = Vec::new();
    let mut exclusions = ExclusionSummary::default();

    for grade in ordered {
        let Some(subject) = grade.subject.as_ref() else {
            warn!(
                grade_id = %grade.id,
                subject_id = %grade.subject_id,
                "grade references an unknown subject, excluded from averages"
            );
            exclusions.missing_subject += 1;
            continue;
        };

        let normalized = match normalize(grade.id, grade.value, grade.max_value) {
            Ok(value) => value,
            Err(EngineError::InvalidScale { max_value, .. }) => {
                warn!(
                    grade_id = %grade.id,
                    max_value,
                    "grade has a non-positive max value, excluded from averages"
                );
                exclusions.invalid_scale += 1;
                continue;
            }
            Err(err) => return Err(err),
        };

        let coefficient = grade.weight();
        if !coefficient.is_finite() {
            return Err(EngineError::MalformedGrade {
                grade_id: grade.id,
                field: "coefficient",
            });
        }
        if !subject.weight().is_finite() {
            return Err(EngineError::MalformedGrade {
                grade_id: grade.id,
                field: "subject coefficient",
            });
        }

        let slot = *index.entry(subject.id).or_insert_with(|| {
            accumulators.push(SubjectAccumulator::new(subject.clone()));
            accumulators.len() - 1
        });
        let acc = &mut accumulators[slot];
        acc.total_weighted_score += normalized * coefficient;
        acc.total_coefficients += coefficient;
        acc.grades.push(GradeEntry {
            grade_id: grade.id,
            value: grade.value,
            max_value: grade.max_value,
            normalized_value: round2(normalized),
            coefficient,
            evaluation_type: grade.evaluation_type,
            date: grade.evaluation_date,
            title: grade.title.clone(),
        });
    }

    let mut subjects: Vec<SubjectPerformance> = accumulators
        .into_iter()
        .map(SubjectAccumulator::finish)
        .collect();
    subjects.sort_by(|a, b| (&a.code, a.subject_id).cmp(&(&b.code, b.subject_id)));

    Ok(SubjectAggregation {
        subjects,
        exclusions,
    })
}

/// Combines subject averages, weighted by subject coefficient, into the
/// general average. Works on unrounded subject averages.
pub fn general_average(subjects: &[SubjectPerformance]) -> f64 {
    let mut weighted = 0.0;
    let mut coefficients = 0.0;
    for subject in subjects {
        weighted += subject.raw_average * subject.coefficient;
        coefficients += subject.coefficient;
    }

    if coefficients > 0.0 {
        weighted / coefficients
    } else {
        0.0
    }
}

pub fn student_average(
    student_id: Uuid,
    trimester: Option<Trimester>,
    academic_year: Option<&str>,
    grades: &[GradeRecord],
) -> EngineResult<StudentPerformance> {
    let aggregation = aggregate_subjects(grades)?;
    let general = general_average(&aggregation.subjects);

    debug!(
        student_id = %student_id,
        grades = grades.len(),
        subjects = aggregation.subjects.len(),
        excluded = aggregation.exclusions.total(),
        general_average = general,
        "computed student average"
    );

    Ok(StudentPerformance {
        student_id,
        trimester,
        academic_year: academic_year.map(str::to_string),
        general_average: round2(general),
        subjects: aggregation.subjects,
        exclusions: aggregation.exclusions,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::{grade, subject};
    use super::*;
    use chrono::NaiveDate;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn weights_grades_within_subject() {
        let student = Uuid::new_v4();
        let math = subject("MATH", Some(3.0));
        let grades = vec![
            grade(student, &math, 16.0, 20.0, Some(1.0)),
            grade(student, &math, 12.0, 20.0, Some(2.0)),
        ];

        let aggregation = aggregate_subjects(&grades).unwrap();
        assert_eq!(aggregation.subjects.len(), 1);
        let math_perf = &aggregation.subjects[0];
        assert_eq!(math_perf.average, 13.33);
        assert!(approx(math_perf.raw_average, 40.0 / 3.0));
        assert_eq!(math_perf.grades.len(), 2);
    }

    #[test]
    fn two_subject_scenario_gives_twelve() {
        let student = Uuid::new_v4();
        let math = subject("MATH", Some(3.0));
        let french = subject("FREN", Some(2.0));
        let grades = vec![
            grade(student, &math, 16.0, 20.0, Some(1.0)),
            grade(student, &math, 12.0, 20.0, Some(2.0)),
            grade(student, &french, 10.0, 20.0, Some(1.0)),
        ];

        let performance = student_average(student, None, None, &grades).unwrap();
        assert_eq!(performance.general_average, 12.0);
        assert_eq!(performance.subjects.len(), 2);
        assert_eq!(performance.subjects[0].code, "FREN");
        assert_eq!(performance.subjects[0].average, 10.0);
        assert_eq!(performance.subjects[1].average, 13.33);
    }

    #[test]
    fn normalizes_other_scales() {
        let student = Uuid::new_v4();
        let physics = subject("PHYS", None);
        let seven_of_ten = grade(student, &physics, 7.0, 10.0, None);
        let seven_id = seven_of_ten.id;
        let grades = vec![seven_of_ten, grade(student, &physics, 60.0, 100.0, None)];

        let performance = student_average(student, None, None, &grades).unwrap();
        assert_eq!(performance.general_average, 13.0);
        let entry = performance.subjects[0]
            .grades
            .iter()
            .find(|g| g.grade_id == seven_id)
            .unwrap();
        assert_eq!(entry.normalized_value, 14.0);
    }

    #[test]
    fn grade_breakdown_follows_evaluation_date() {
        let student = Uuid::new_v4();
        let physics = subject("PHYS", None);
        let mut late = grade(student, &physics, 60.0, 100.0, None);
        late.evaluation_date = NaiveDate::from_ymd_opt(2024, 12, 2).unwrap();
        let mut early = grade(student, &physics, 7.0, 10.0, None);
        early.evaluation_date = NaiveDate::from_ymd_opt(2024, 9, 23).unwrap();

        let performance = student_average(student, None, None, &[late, early]).unwrap();
        let normalized: Vec<f64> = performance.subjects[0]
            .grades
            .iter()
            .map(|g| g.normalized_value)
            .collect();
        assert_eq!(normalized, vec![14.0, 12.0]);
    }

    #[test]
    fn order_of_records_does_not_matter() {
        let student = Uuid::new_v4();
        let math = subject("MATH", Some(3.0));
        let history = subject("HIST", Some(1.5));
        let mut grades = vec![
            grade(student, &math, 13.5, 20.0, Some(0.5)),
            grade(student, &history, 7.0, 10.0, Some(2.0)),
            grade(student, &math, 17.25, 20.0, Some(1.0)),
            grade(student, &history, 33.0, 40.0, Some(5.0)),
            grade(student, &math, 9.0, 20.0, Some(2.0)),
        ];

        let forward = student_average(student, None, None, &grades).unwrap();
        grades.reverse();
        let backward = student_average(student, None, None, &grades).unwrap();
        grades.swap(0, 3);
        let shuffled = student_average(student, None, None, &grades).unwrap();

        assert_eq!(forward.general_average, backward.general_average);
        assert_eq!(forward.general_average, shuffled.general_average);
        assert_eq!(forward.subjects, shuffled.subjects);
    }

    #[test]
    fn excludes_unresolved_subjects_and_bad_scales() {
        let student = Uuid::new_v4();
        let math = subject("MATH", None);
        let mut orphan = grade(student, &math, 2.0, 20.0, None);
        orphan.subject = None;
        let zero_scale = grade(student, &math, 5.0, 0.0, None);
        let grades = vec![grade(student, &math, 14.0, 20.0, None), orphan, zero_scale];

        let performance = student_average(student, None, None, &grades).unwrap();
        assert_eq!(performance.general_average, 14.0);
        assert_eq!(performance.exclusions.missing_subject, 1);
        assert_eq!(performance.exclusions.invalid_scale, 1);
        assert_eq!(performance.subjects[0].grades.len(), 1);
    }

    #[test]
    fn empty_input_yields_zero() {
        let performance = student_average(Uuid::new_v4(), None, None, &[]).unwrap();
        assert_eq!(performance.general_average, 0.0);
        assert!(performance.subjects.is_empty());
        assert_eq!(performance.exclusions.total(), 0);
    }

    #[test]
    fn zero_grade_coefficients_give_zero_subject_average() {
        let student = Uuid::new_v4();
        let art = subject("ART", Some(1.0));
        let math = subject("MATH", Some(1.0));
        let grades = vec![
            grade(student, &art, 18.0, 20.0, Some(0.0)),
            grade(student, &math, 16.0, 20.0, Some(1.0)),
        ];

        let performance = student_average(student, None, None, &grades).unwrap();
        assert_eq!(performance.subjects[0].average, 0.0);
        assert_eq!(performance.general_average, 8.0);
    }

    #[test]
    fn values_above_scale_pass_through() {
        let student = Uuid::new_v4();
        let math = subject("MATH", None);
        let grades = vec![grade(student, &math, 24.0, 20.0, None)];

        let performance = student_average(student, None, None, &grades).unwrap();
        assert_eq!(performance.general_average, 24.0);
    }

    #[test]
    fn non_numeric_value_fails_loudly() {
        let student = Uuid::new_v4();
        let math = subject("MATH", None);
        let grades = vec![grade(student, &math, f64::NAN, 20.0, None)];

        assert!(matches!(
            student_average(student, None, None, &grades),
            Err(EngineError::MalformedGrade { .. })
        ));
    }

    #[test]
    fn overflowing_grade_fails_instead_of_poisoning_average() {
        let student = Uuid::new_v4();
        let math = subject("MATH", None);
        let grades = vec![
            grade(student, &math, 1e308, 1e-10, Some(0.0)),
            grade(student, &math, 14.0, 20.0, Some(1.0)),
        ];

        assert!(matches!(
            student_average(student, None, None, &grades),
            Err(EngineError::MalformedGrade {
                field: "normalized value",
                ..
            })
        ));
    }
}
