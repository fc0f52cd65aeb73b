use std::fmt::Write;

use serde::Serialize;

use crate::models::{StudentPerformance, StudentRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Appreciation {
    Excellent,
    VeryGood,
    Good,
    Acceptable,
    Insufficient,
    AtRiskOfRepeating,
}

impl Appreciation {
    /// Lower bounds are inclusive; the first matching band wins.
    pub fn for_average(general_average: f64) -> Self {
        if general_average >= 16.0 {
            Appreciation::Excellent
        } else if general_average >= 14.0 {
            Appreciation::VeryGood
        } else if general_average >= 12.0 {
            Appreciation::Good
        } else if general_average >= 10.0 {
            Appreciation::Acceptable
        } else if general_average >= 8.0 {
            Appreciation::Insufficient
        } else {
            Appreciation::AtRiskOfRepeating
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Appreciation::Excellent => "Excellent work. Congratulations!",
            Appreciation::VeryGood => "Very good work. Keep it up.",
            Appreciation::Good => "Good work. Keep up the effort.",
            Appreciation::Acceptable => "Acceptable work, but could do better.",
            Appreciation::Insufficient => "Insufficient results. A recovery is needed.",
            Appreciation::AtRiskOfRepeating => {
                "Very insufficient results. Risk of repeating the year."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCard {
    #[serde(flatten)]
    pub performance: StudentPerformance,
    pub appreciation: Appreciation,
    pub appreciation_text: &'static str,
}

pub fn build_report_card(performance: StudentPerformance) -> ReportCard {
    let appreciation = Appreciation::for_average(performance.general_average);
    ReportCard {
        performance,
        appreciation,
        appreciation_text: appreciation.message(),
    }
}

pub fn render_markdown(card: &ReportCard, student: &StudentRef) -> String {
    let performance = &card.performance;
    let mut output = String::new();

    let period = match (performance.trimester, performance.academic_year.as_deref()) {
        (Some(trimester), Some(year)) => format!("{trimester} {year}"),
        (Some(trimester), None) => trimester.to_string(),
        (None, Some(year)) => year.to_string(),
        (None, None) => "all periods".to_string(),
    };

    let _ = writeln!(output, "# Report Card: {}", student.full_name());
    let _ = writeln!(output, "Period: {period}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects");

    if performance.subjects.is_empty() {
        let _ = writeln!(output, "No grades recorded for this period.");
    } else {
        for subject in &performance.subjects {
            let _ = writeln!(
                output,
                "- {} ({}, coefficient {}): {:.2}/20 over {} evaluations",
                subject.name,
                subject.code,
                subject.coefficient,
                subject.average,
                subject.grades.len()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## General Average");
    let _ = writeln!(output, "{:.2}/20", performance.general_average);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Appreciation");
    let _ = writeln!(output, "{}", card.appreciation_text);

    if performance.exclusions.total() > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "_{} grades were left out ({} with an unknown subject, {} with an invalid scale)._",
            performance.exclusions.total(),
            performance.exclusions.missing_subject,
            performance.exclusions.invalid_scale
        );
    }

    output
}
