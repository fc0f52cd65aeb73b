use std::collections::HashMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::average::student_average;
use crate::breakdown::{
    evaluation_type_breakdown, grade_distribution, BandCount, EvaluationTypeSummary,
};
use crate::config::AlertThresholds;
use crate::error::EngineResult;
use crate::models::{
    Alert, ClassComparison, ClassRankingEntry, ClassStatistics, GradeRecord, Progression,
    StudentPerformance, StudentRef, Trimester,
};
use crate::progression::track_progression;
use crate::ranking::{general_averages, rank_students};
use crate::report::{build_report_card, ReportCard};
use crate::risk;
use crate::stats::class_statistics;

#[derive(Debug, Clone, PartialEq)]
pub struct GradeQuery {
    pub student_id: Uuid,
    pub trimester: Option<Trimester>,
    pub academic_year: Option<String>,
    pub subject_id: Option<Uuid>,
}

impl GradeQuery {
    pub fn period(student_id: Uuid, trimester: Trimester, academic_year: &str) -> Self {
        Self {
            student_id,
            trimester: Some(trimester),
            academic_year: Some(academic_year.to_string()),
            subject_id: None,
        }
    }

    fn matches(&self, grade: &GradeRecord) -> bool {
        grade.student_id == self.student_id
            && self.trimester.map_or(true, |t| grade.trimester == t)
            && self
                .academic_year
                .as_deref()
                .map_or(true, |y| grade.academic_year == y)
            && self.subject_id.map_or(true, |s| grade.subject_id == s)
    }
}

/// Where grades and rosters come from. Every record must already carry its
/// joined subject, or `None` when the subject could not be resolved.
#[allow(async_fn_in_trait)]
pub trait GradeSource {
    async fn fetch_student_grades(&self, query: &GradeQuery) -> anyhow::Result<Vec<GradeRecord>>;

    async fn fetch_class_grades(
        &self,
        class_id: Uuid,
        trimester: Trimester,
        academic_year: &str,
    ) -> anyhow::Result<Vec<GradeRecord>>;

    /// Students of a class in repository order; ranking ties follow it.
    async fn fetch_roster(&self, class_id: Uuid) -> anyhow::Result<Vec<StudentRef>>;

    async fn fetch_student(&self, student_id: Uuid) -> anyhow::Result<Option<StudentRef>>;
}

pub struct PerformanceEngine<S> {
    source: S,
    thresholds: AlertThresholds,
}

impl<S: GradeSource> PerformanceEngine<S> {
    pub fn new(source: S, thresholds: AlertThresholds) -> Self {
        Self { source, thresholds }
    }

    pub async fn compute_student_average(
        &self,
        query: &GradeQuery,
    ) -> EngineResult<StudentPerformance> {
        let grades = self.student_grades(query).await?;
        student_average(
            query.student_id,
            query.trimester,
            query.academic_year.as_deref(),
            &grades,
        )
    }

    pub async fn compute_class_ranking(
        &self,
        class_id: Uuid,
        trimester: Trimester,
        academic_year: &str,
    ) -> EngineResult<Vec<ClassRankingEntry>> {
        let roster = self.source.fetch_roster(class_id).await?;
        let grades = self
            .source
            .fetch_class_grades(class_id, trimester, academic_year)
            .await?;

        let mut by_student: HashMap<Uuid, Vec<GradeRecord>> = HashMap::new();
        for grade in grades {
            if grade.trimester != trimester || grade.academic_year != academic_year {
                continue;
            }
            by_student.entry(grade.student_id).or_default().push(grade);
        }

        let year = Some(academic_year);
        let mut averages = Vec::with_capacity(roster.len());
        for student in roster {
            let grades = by_student.remove(&student.id).unwrap_or_default();
            let performance = student_average(student.id, Some(trimester), year, &grades)?;
            averages.push((student, performance.general_average));
        }

        if !by_student.is_empty() {
            debug!(
                class_id = %class_id,
                students = by_student.len(),
                "ignoring grades of students outside the roster"
            );
        }

        let ranking = rank_students(averages);
        info!(
            class_id = %class_id,
            trimester = %trimester,
            academic_year,
            students = ranking.len(),
            "computed class ranking"
        );
        Ok(ranking)
    }

    pub async fn top_students(
        &self,
        class_id: Uuid,
        trimester: Trimester,
        academic_year: &str,
        limit: usize,
    ) -> EngineResult<Vec<ClassRankingEntry>> {
        let mut ranking = self
            .compute_class_ranking(class_id, trimester, academic_year)
            .await?;
        ranking.truncate(limit);
        Ok(ranking)
    }

    pub async fn compute_class_statistics(
        &self,
        class_id: Uuid,
        trimester: Trimester,
        academic_year: &str,
    ) -> EngineResult<ClassStatistics> {
        let ranking = self
            .compute_class_ranking(class_id, trimester, academic_year)
            .await?;
        Ok(class_statistics(&general_averages(&ranking)))
    }

    pub async fn detect_alerts(
        &self,
        class_id: Uuid,
        trimester: Trimester,
        academic_year: &str,
    ) -> EngineResult<Vec<Alert>> {
        let ranking = self
            .compute_class_ranking(class_id, trimester, academic_year)
            .await?;
        let alerts = risk::detect_alerts(&ranking, &self.thresholds);
        info!(class_id = %class_id, alerts = alerts.len(), "detected student alerts");
        Ok(alerts)
    }

    pub async fn compute_progression(
        &self,
        student_id: Uuid,
        from: Trimester,
        to: Trimester,
        academic_year: &str,
    ) -> EngineResult<Progression> {
        if from == to {
            warn!(
                student_id = %student_id,
                trimester = %from,
                "progression compares a trimester with itself"
            );
        }
        let previous = GradeQuery::period(student_id, from, academic_year);
        let previous = self.compute_student_average(&previous).await?;
        let current = GradeQuery::period(student_id, to, academic_year);
        let current = self.compute_student_average(&current).await?;
        Ok(track_progression(&previous, &current))
    }

    pub async fn generate_report_card(
        &self,
        student_id: Uuid,
        trimester: Trimester,
        academic_year: &str,
    ) -> EngineResult<ReportCard> {
        let query = GradeQuery::period(student_id, trimester, academic_year);
        let performance = self.compute_student_average(&query).await?;
        Ok(build_report_card(performance))
    }

    pub async fn compare_classes(
        &self,
        class_ids: &[Uuid],
        trimester: Trimester,
        academic_year: &str,
    ) -> EngineResult<Vec<ClassComparison>> {
        let mut results = Vec::with_capacity(class_ids.len());
        for class_id in class_ids {
            let stats = self
                .compute_class_statistics(*class_id, trimester, academic_year)
                .await?;
            results.push(ClassComparison {
                class_id: *class_id,
                stats,
            });
        }
        Ok(results)
    }

    pub async fn grade_breakdown(
        &self,
        query: &GradeQuery,
    ) -> EngineResult<(Vec<BandCount>, Vec<EvaluationTypeSummary>)> {
        let grades = self.student_grades(query).await?;
        let distribution = grade_distribution(&grades)?;
        let by_type = evaluation_type_breakdown(&grades)?;
        Ok((distribution, by_type))
    }

    pub async fn student(&self, student_id: Uuid) -> EngineResult<Option<StudentRef>> {
        Ok(self.source.fetch_student(student_id).await?)
    }

    async fn student_grades(&self, query: &GradeQuery) -> EngineResult<Vec<GradeRecord>> {
        let mut grades = self.source.fetch_student_grades(query).await?;
        grades.retain(|grade| query.matches(grade));
        Ok(grades)
    }
}
