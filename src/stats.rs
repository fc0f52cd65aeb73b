use std::cmp::Ordering;

use crate::models::ClassStatistics;
use crate::normalize::round2;

pub const PASS_MARK: f64 = 10.0;

/// Descriptive statistics over a class's general averages. The standard
/// deviation is the population one. An empty class yields all zeros.
pub fn class_statistics(averages: &[f64]) -> ClassStatistics {
    if averages.is_empty() {
        return ClassStatistics::default();
    }

    let n = averages.len() as f64;
    let average = averages.iter().sum::<f64>() / n;
    let min = averages.iter().copied().fold(f64::INFINITY, f64::min);
    let max = averages.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let variance = averages
        .iter()
        .map(|value| {
            let diff = value - average;
            diff * diff
        })
        .sum::<f64>()
        / n;

    let passing = averages.iter().filter(|a| **a >= PASS_MARK).count();

    ClassStatistics {
        average: round2(average),
        median: round2(median(averages)),
        min: round2(min),
        max: round2(max),
        standard_deviation: round2(variance.sqrt()),
        pass_rate: round2(passing as f64 / n * 100.0),
    }
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
