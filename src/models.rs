use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Trimester {
    #[serde(rename = "T1")]
    First,
    #[serde(rename = "T2")]
    Second,
    #[serde(rename = "T3")]
    Third,
}

impl Trimester {
    pub fn code(self) -> &'static str {
        match self {
            Trimester::First => "T1",
            Trimester::Second => "T2",
            Trimester::Third => "T3",
        }
    }
}

impl fmt::Display for Trimester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Trimester {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "t1" | "first" => Ok(Trimester::First),
            "2" | "t2" | "second" => Ok(Trimester::Second),
            "3" | "t3" | "third" => Ok(Trimester::Third),
            other => Err(format!("unknown trimester '{other}' (expected 1, 2 or 3)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    Homework,
    Quiz,
    Exam,
    ContinuousAssessment,
    Project,
    Oral,
}

impl EvaluationType {
    pub const ALL: [EvaluationType; 6] = [
        EvaluationType::Homework,
        EvaluationType::Quiz,
        EvaluationType::Exam,
        EvaluationType::ContinuousAssessment,
        EvaluationType::Project,
        EvaluationType::Oral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationType::Homework => "homework",
            EvaluationType::Quiz => "quiz",
            EvaluationType::Exam => "exam",
            EvaluationType::ContinuousAssessment => "continuous_assessment",
            EvaluationType::Project => "project",
            EvaluationType::Oral => "oral",
        }
    }
}

impl fmt::Display for EvaluationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvaluationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        EvaluationType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown evaluation type '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectRef {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    /// Weight of the subject in the general average; `None` means 1.
    pub coefficient: Option<f64>,
}

impl SubjectRef {
    pub fn weight(&self) -> f64 {
        self.coefficient.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRef {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl StudentRef {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One evaluation row as returned by the repository, already joined with its
/// subject. `subject` is `None` when the join did not resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub teacher_id: Option<Uuid>,
    pub subject: Option<SubjectRef>,
    pub value: f64,
    pub max_value: f64,
    /// Weight of this evaluation within its subject; `None` means 1.
    pub coefficient: Option<f64>,
    pub evaluation_type: EvaluationType,
    pub trimester: Trimester,
    pub academic_year: String,
    pub evaluation_date: NaiveDate,
    pub title: Option<String>,
}

impl GradeRecord {
    pub fn weight(&self) -> f64 {
        self.coefficient.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeEntry {
    pub grade_id: Uuid,
    pub value: f64,
    pub max_value: f64,
    pub normalized_value: f64,
    pub coefficient: f64,
    pub evaluation_type: EvaluationType,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectPerformance {
    pub subject_id: Uuid,
    pub name: String,
    pub code: String,
    pub coefficient: f64,
    /// Rounded to 2 decimals for display.
    pub average: f64,
    /// Unrounded value that feeds the general average.
    #[serde(skip)]
    pub raw_average: f64,
    pub grades: Vec<GradeEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionSummary {
    pub missing_subject: usize,
    pub invalid_scale: usize,
}

impl ExclusionSummary {
    pub fn total(&self) -> usize {
        self.missing_subject + self.invalid_scale
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentPerformance {
    pub student_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trimester: Option<Trimester>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,
    pub general_average: f64,
    pub subjects: Vec<SubjectPerformance>,
    pub exclusions: ExclusionSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassRankingEntry {
    pub rank: usize,
    pub student_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub general_average: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassStatistics {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub standard_deviation: f64,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassComparison {
    pub class_id: Uuid,
    pub stats: ClassStatistics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Danger,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertPriority {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub student_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub priority: AlertPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progression {
    pub student_id: Uuid,
    pub previous_average: f64,
    pub current_average: f64,
    pub progression: f64,
    pub trend: Trend,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trimester_accepts_common_spellings() {
        assert_eq!("2".parse::<Trimester>(), Ok(Trimester::Second));
        assert_eq!("T3".parse::<Trimester>(), Ok(Trimester::Third));
        assert_eq!("First".parse::<Trimester>(), Ok(Trimester::First));
        assert!("4".parse::<Trimester>().is_err());
    }

    #[test]
    fn evaluation_type_parses_separators() {
        assert_eq!(
            "Continuous-Assessment".parse::<EvaluationType>(),
            Ok(EvaluationType::ContinuousAssessment)
        );
        assert_eq!("oral".parse::<EvaluationType>(), Ok(EvaluationType::Oral));
        assert!("essay".parse::<EvaluationType>().is_err());
    }

    #[test]
    fn missing_coefficients_weigh_one() {
        let subject = SubjectRef {
            id: Uuid::new_v4(),
            name: "Math".to_string(),
            code: "MATH".to_string(),
            coefficient: None,
        };
        assert_eq!(subject.weight(), 1.0);

        let zero = SubjectRef {
            coefficient: Some(0.0),
            ..subject
        };
        assert_eq!(zero.weight(), 0.0);
    }
}
