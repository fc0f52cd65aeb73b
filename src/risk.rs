use std::collections::HashSet;

use uuid::Uuid;

use crate::config::AlertThresholds;
use crate::models::{Alert, AlertPriority, AlertSeverity, ClassRankingEntry};

pub fn classify(
    general_average: f64,
    thresholds: &AlertThresholds,
) -> Option<(AlertSeverity, AlertPriority)> {
    if general_average < thresholds.danger_below {
        Some((AlertSeverity::Danger, AlertPriority::High))
    } else if general_average < thresholds.warning_below {
        Some((AlertSeverity::Warning, AlertPriority::Medium))
    } else {
        None
    }
}

/// Flags students whose general average falls under the risk thresholds.
/// Each student appears at most once, in input order.
pub fn detect_alerts(ranking: &[ClassRankingEntry], thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut alerts = Vec::new();

    for entry in ranking {
        if !seen.insert(entry.student_id) {
            continue;
        }
        let Some((severity, priority)) = classify(entry.general_average, thresholds) else {
            continue;
        };

        let average = entry.general_average;
        let message = match severity {
            AlertSeverity::Danger => format!("General average below passing ({average:.2}/20)"),
            AlertSeverity::Warning => format!("Fragile general average ({average:.2}/20)"),
        };

        alerts.push(Alert {
            student_id: entry.student_id,
            first_name: entry.first_name.clone(),
            last_name: entry.last_name.clone(),
            severity,
            message,
            priority,
        });
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(general_average: f64) -> ClassRankingEntry {
        ClassRankingEntry {
            rank: 1,
            student_id: Uuid::new_v4(),
            first_name: "Avery".to_string(),
            last_name: "Lee".to_string(),
            general_average,
        }
    }

    #[test]
    fn below_ten_is_danger() {
        let alerts = detect_alerts(&[entry(9.5)], &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Danger);
        assert_eq!(alerts[0].priority, AlertPriority::High);
        assert!(alerts[0].message.contains("9.50"));
    }

    #[test]
    fn between_ten_and_twelve_is_warning() {
        let alerts = detect_alerts(&[entry(11.0)], &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
        assert_eq!(alerts[0].priority, AlertPriority::Medium);
    }

    #[test]
    fn boundaries_are_strict() {
        let thresholds = AlertThresholds::default();
        assert_eq!(
            classify(10.0, &thresholds),
            Some((AlertSeverity::Warning, AlertPriority::Medium))
        );
        assert_eq!(classify(12.0, &thresholds), None);
        assert_eq!(classify(15.0, &thresholds), None);
    }

    #[test]
    fn passing_students_raise_nothing() {
        let thresholds = AlertThresholds::default();
        assert!(detect_alerts(&[entry(15.0)], &thresholds).is_empty());
        assert!(detect_alerts(&[], &thresholds).is_empty());
    }

    #[test]
    fn duplicate_students_alert_once() {
        let first = entry(8.0);
        let again = ClassRankingEntry {
            general_average: 11.0,
            ..first.clone()
        };

        let alerts = detect_alerts(&[first, again], &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Danger);
    }

    #[test]
    fn custom_thresholds_shift_bands() {
        let thresholds = AlertThresholds::new(8.0, 9.0).unwrap();
        let alerts = detect_alerts(&[entry(8.5), entry(9.5)], &thresholds);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    }
}
