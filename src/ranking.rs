use std::cmp::Ordering;

use crate::models::{ClassRankingEntry, StudentRef};

/// Orders students by descending general average and numbers them from 1.
///
/// The sort is stable: students with equal averages keep their roster order
/// and still receive distinct ranks.
pub fn rank_students(averages: Vec<(StudentRef, f64)>) -> Vec<ClassRankingEntry> {
    let mut averages = averages;
    averages.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    averages
        .into_iter()
        .enumerate()
        .map(|(index, (student, general_average))| ClassRankingEntry {
            rank: index + 1,
            student_id: student.id,
            first_name: student.first_name,
            last_name: student.last_name,
            general_average,
        })
        .collect()
}

pub fn general_averages(ranking: &[ClassRankingEntry]) -> Vec<f64> {
    ranking.iter().map(|entry| entry.general_average).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn student(first_name: &str) -> StudentRef {
        StudentRef {
            id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: "Diallo".to_string(),
        }
    }

    #[test]
    fn ranks_by_descending_average() {
        let roster = vec![student("Awa"), student("Bakary"), student("Chloe")];
        let ids: Vec<Uuid> = roster.iter().map(|s| s.id).collect();
        let input = roster.into_iter().zip([15.0, 9.0, 12.0]).collect();

        let ranking = rank_students(input);
        assert_eq!(general_averages(&ranking), vec![15.0, 12.0, 9.0]);

        let rank_of = |id: Uuid| ranking.iter().find(|e| e.student_id == id).unwrap().rank;
        assert_eq!(
            ids.iter().map(|id| rank_of(*id)).collect::<Vec<_>>(),
            vec![1, 3, 2]
        );
    }

    #[test]
    fn ties_keep_roster_order_with_distinct_ranks() {
        let roster = vec![student("Awa"), student("Bakary"), student("Chloe")];
        let input = roster.into_iter().zip([11.5, 14.0, 11.5]).collect();

        let ranking = rank_students(input);
        let names: Vec<&str> = ranking.iter().map(|e| e.first_name.as_str()).collect();
        assert_eq!(names, vec!["Bakary", "Awa", "Chloe"]);
        assert_eq!(
            ranking.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn empty_roster_gives_empty_ranking() {
        assert!(rank_students(Vec::new()).is_empty());
    }
}
