//! Report generators: per-teacher report, principal dashboard and the
//! monthly defaulter export.

use crate::calendar::DateRange;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::metrics::{self, MetricsReport, Performance, PerformanceCategory, SessionView, Standing};
use crate::snapshot::{self, TeacherSnapshot};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use db::models::attendance_record::{self, AttendanceStatus};
use db::models::class_session::SessionStatus;
use db::models::{principal, teacher::{self, Department}};
use sea_orm::{DatabaseTransaction, EntityTrait, TransactionTrait};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

/// Header of the defaulter export, in column order.
pub const CSV_HEADER: [&str; 9] = [
    "Teacher Name",
    "Department",
    "Attendance Consistency (%)",
    "Completion Rate (%)",
    "Late Entries",
    "Early Exits",
    "Interruptions",
    "Risk Score",
    "Status",
];

/// One row of the defaulter export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaulterRow {
    pub teacher_name: String,
    pub department: String,
    pub consistency: String,
    pub completion_rate: String,
    pub late_entries: u32,
    pub early_exits: u32,
    pub interruptions: u32,
    pub risk_score: u8,
    pub status: Standing,
}

impl DefaulterRow {
    fn new(teacher: &teacher::Model, report: &MetricsReport) -> Self {
        Self {
            teacher_name: teacher.name.clone(),
            department: teacher.department.display_name().to_owned(),
            consistency: format!("{:.1}%", report.consistency),
            completion_rate: format!("{:.1}%", report.completion_rate),
            late_entries: report.late_entries,
            early_exits: report.early_exits,
            interruptions: report.interruptions,
            risk_score: report.risk_score,
            status: report.standing(),
        }
    }
}

/// A session as listed on the per-teacher report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: i64,
    pub date: NaiveDate,
    /// `None` for an extra class.
    pub subject: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub active_minutes: f64,
    pub status: SessionStatus,
    pub late_entry: bool,
    pub early_exit: bool,
    pub interruptions: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherReport {
    pub teacher: teacher::Model,
    pub department: &'static str,
    pub metrics: MetricsReport,
    pub standing: Standing,
    pub performance: Performance,
    pub sessions: Vec<SessionSummary>,
    pub attendance: Vec<attendance_record::Model>,
}

/// Parallel per-teacher arrays, one entry per teacher in name order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeacherSeries {
    pub names: Vec<String>,
    pub consistency: Vec<f64>,
    pub teaching_minutes: Vec<f64>,
    pub expected_minutes: Vec<f64>,
    pub completion_rate: Vec<f64>,
    pub late_entries: Vec<u32>,
    pub early_exits: Vec<u32>,
    pub interruptions: Vec<u32>,
    pub performance_scores: Vec<f64>,
    pub categories: Vec<PerformanceCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCheckIns {
    pub date: NaiveDate,
    pub present: u32,
    pub late: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentPresence {
    pub department: Department,
    pub name: &'static str,
    pub teachers: u32,
    pub check_ins: u32,
    /// Check-ins as a share of teacher school days in the window.
    pub presence_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub range: DateRange,
    /// Trailing window ending at `range.end` used by the check-in charts.
    pub window: DateRange,
    pub teachers: TeacherSeries,
    pub defaulters: u32,
    pub daily_check_ins: Vec<DailyCheckIns>,
    pub department_presence: Vec<DepartmentPresence>,
}

impl Engine {
    /// Metrics of one teacher over `range`, read from a single snapshot.
    pub async fn compute_metrics(&self, teacher_id: i64, range: DateRange) -> EngineResult<MetricsReport> {
        let snapshot = self.teacher_snapshot(teacher_id, range).await?;
        Ok(snapshot.metrics(self.settings()))
    }

    pub async fn teacher_report(&self, teacher_id: i64, range: DateRange) -> EngineResult<TeacherReport> {
        let snapshot = self.teacher_snapshot(teacher_id, range).await?;
        let metrics = snapshot.metrics(self.settings());

        let sessions = snapshot
            .sessions
            .iter()
            .rev()
            .map(|view| self.summarise(view))
            .collect();

        Ok(TeacherReport {
            department: snapshot.teacher.department.display_name(),
            standing: metrics.standing(),
            performance: metrics.performance(),
            metrics,
            sessions,
            attendance: snapshot.attendance,
            teacher: snapshot.teacher,
        })
    }

    /// Dashboard series for every teacher of a principal.
    pub async fn dashboard(&self, principal_id: i64, range: DateRange) -> EngineResult<Dashboard> {
        let window = DateRange::trailing(range.end, self.settings().dashboard_window_days);

        let txn = self.db().begin().await?;
        let snapshots = load_principal(&txn, principal_id, None, range).await?;
        let teacher_ids: Vec<i64> = snapshots.iter().map(|s| s.teacher.id).collect();
        let window_attendance =
            attendance_record::Model::for_teachers_between(&txn, &teacher_ids, window.start, window.end)
                .await?;
        txn.commit().await?;

        let mut series = TeacherSeries::default();
        let mut defaulters = 0;
        for snapshot in &snapshots {
            let report = snapshot.metrics(self.settings());
            let performance = report.performance();
            if report.standing() == Standing::Defaulter {
                defaulters += 1;
            }

            series.names.push(snapshot.teacher.name.clone());
            series.consistency.push(report.consistency);
            series.teaching_minutes.push(report.active_minutes);
            series.expected_minutes.push(report.expected_minutes);
            series.completion_rate.push(report.completion_rate);
            series.late_entries.push(report.late_entries);
            series.early_exits.push(report.early_exits);
            series.interruptions.push(report.interruptions);
            series.performance_scores.push(performance.score);
            series.categories.push(performance.category);
        }

        let teachers: Vec<&teacher::Model> = snapshots.iter().map(|s| &s.teacher).collect();
        Ok(Dashboard {
            range,
            window,
            teachers: series,
            defaulters,
            daily_check_ins: daily_check_ins(window, &window_attendance),
            department_presence: department_presence(window, &teachers, &window_attendance),
        })
    }

    /// Defaulter CSV for one calendar month. The current month ends after today.
    pub async fn export_csv(
        &self,
        principal_id: i64,
        month: u32,
        year: i32,
        department: Option<Department>,
    ) -> EngineResult<Vec<u8>> {
        let rows = self.defaulter_rows(principal_id, month, year, department).await?;
        render_csv(&rows)
    }

    /// Writes the defaulter CSV to `path`. Returns the number of teacher rows.
    pub async fn write_defaulter_report(
        &self,
        path: &Path,
        principal_id: i64,
        month: u32,
        year: i32,
        department: Option<Department>,
    ) -> EngineResult<usize> {
        let rows = self.defaulter_rows(principal_id, month, year, department).await?;
        let bytes = render_csv(&rows)?;

        util::paths::ensure_parent_dir(path)?;
        tokio::fs::write(path, bytes).await?;

        let defaulters = rows.iter().filter(|r| r.status == Standing::Defaulter).count();
        info!(
            "Defaulter report for {}-{:02} written to {} ({} teachers, {} defaulters)",
            year,
            month,
            path.display(),
            rows.len(),
            defaulters
        );
        Ok(rows.len())
    }

    pub async fn defaulter_rows(
        &self,
        principal_id: i64,
        month: u32,
        year: i32,
        department: Option<Department>,
    ) -> EngineResult<Vec<DefaulterRow>> {
        let range = self.month_so_far(year, month)?;

        let txn = self.db().begin().await?;
        let snapshots = load_principal(&txn, principal_id, department, range).await?;
        txn.commit().await?;

        Ok(snapshots
            .iter()
            .map(|s| DefaulterRow::new(&s.teacher, &s.metrics(self.settings())))
            .collect())
    }

    /// The calendar month, clipped so it never extends past today.
    fn month_so_far(&self, year: i32, month: u32) -> EngineResult<DateRange> {
        let range = DateRange::month(year, month)
            .ok_or_else(|| EngineError::Validation(format!("Invalid month {}-{}", year, month)))?;
        let today = self.settings().local_date(self.now());
        Ok(range.clipped_to(today + Duration::days(1)))
    }

    async fn teacher_snapshot(&self, teacher_id: i64, range: DateRange) -> EngineResult<TeacherSnapshot> {
        let txn = self.db().begin().await?;
        let teacher = teacher::Entity::find_by_id(teacher_id)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Teacher {}", teacher_id)))?;
        let snapshot = snapshot::load(&txn, teacher, range).await?;
        txn.commit().await?;
        Ok(snapshot)
    }

    fn summarise(&self, view: &SessionView) -> SessionSummary {
        let settings = self.settings();
        SessionSummary {
            session_id: view.session.id,
            date: view.session.session_date,
            subject: view.slot.as_ref().map(|s| s.subject.clone()),
            started_at: view.session.started_at,
            ended_at: view.session.ended_at,
            active_minutes: view.session.active_minutes(),
            status: view.session.status,
            late_entry: view.is_late_entry(settings),
            early_exit: view.is_early_exit(settings),
            interruptions: view.session.interruptions(),
        }
    }
}

async fn load_principal(
    txn: &DatabaseTransaction,
    principal_id: i64,
    department: Option<Department>,
    range: DateRange,
) -> EngineResult<Vec<TeacherSnapshot>> {
    principal::Entity::find_by_id(principal_id)
        .one(txn)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("Principal {}", principal_id)))?;

    let teachers = teacher::Model::find_for_principal(txn, principal_id, department).await?;
    let mut snapshots = Vec::with_capacity(teachers.len());
    for teacher in teachers {
        snapshots.push(snapshot::load(txn, teacher, range).await?);
    }
    Ok(snapshots)
}

/// Renders rows under [`CSV_HEADER`]. The header is written even without rows.
pub fn render_csv(rows: &[DefaulterRow]) -> EngineResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EngineError::Io(e.into_error()))
}

fn daily_check_ins(window: DateRange, records: &[attendance_record::Model]) -> Vec<DailyCheckIns> {
    let mut days: BTreeMap<NaiveDate, DailyCheckIns> = window
        .days()
        .map(|date| {
            (
                date,
                DailyCheckIns {
                    date,
                    present: 0,
                    late: 0,
                },
            )
        })
        .collect();

    for record in records {
        if let Some(day) = days.get_mut(&record.date) {
            match record.status {
                AttendanceStatus::Present => day.present += 1,
                AttendanceStatus::Late => day.late += 1,
            }
        }
    }
    days.into_values().collect()
}

fn department_presence(
    window: DateRange,
    teachers: &[&teacher::Model],
    records: &[attendance_record::Model],
) -> Vec<DepartmentPresence> {
    let school_days = window.days().filter(|d| d.weekday() != Weekday::Sun).count() as f64;
    let department_of: HashMap<i64, Department> =
        teachers.iter().map(|t| (t.id, t.department)).collect();

    let mut by_department: BTreeMap<Department, (u32, u32)> = BTreeMap::new();
    for teacher in teachers {
        by_department.entry(teacher.department).or_default().0 += 1;
    }
    for record in records.iter().filter(|r| window.contains(r.date)) {
        if let Some(dept) = department_of.get(&record.teacher_id) {
            by_department.entry(*dept).or_default().1 += 1;
        }
    }

    by_department
        .into_iter()
        .map(|(department, (teachers, check_ins))| DepartmentPresence {
            department,
            name: department.display_name(),
            teachers,
            check_ins,
            presence_rate: metrics::percentage(check_ins as f64, teachers as f64 * school_days),
        })
        .collect()
}
