use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::db::repository;
use crate::db::tables::{CourseTable, LessonTable};
use crate::error::AppError;
use crate::lms::endpoints::{self, EndpointTemplate};
use crate::lms::LmsClient;
use crate::models::{Course, Role};
use crate::sync::normalize::{
    self, NormalizedCourse, NormalizedEnrollment, NormalizedStudent,
};
use crate::sync::paginate;
use crate::sync::probe::{self, ProbeError};
use crate::sync::reconcile::{reconcile, ReconcileOutcome};
use crate::sync::roles;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Whether enrollments absent from a later roster fetch are deactivated.
    /// Off by default: enrollments are treated as sticky history.
    pub enrollment_soft_delete: bool,
}

impl SyncOptions {
    pub fn new_from_env() -> Self {
        let enrollment_soft_delete = std::env::var("ENROLLMENT_SOFT_DELETE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            enrollment_soft_delete,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct EntityCounts {
    pub created: usize,
    pub updated: usize,
    pub errors: usize,
}

/// Run summary returned to the admin UI/CLI. This shape is the contract with
/// the trigger surface and stays stable.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub courses: EntityCounts,
    pub lessons: EntityCounts,
    pub students: EntityCounts,
    pub enrollments: EntityCounts,
    pub errors: Vec<String>,
}

impl SyncReport {
    fn new() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }
}

pub struct SyncService {
    db: SqlitePool,
    lms: Arc<dyn LmsClient>,
    options: SyncOptions,
    run_lock: Mutex<()>,
}

impl SyncService {
    pub fn new(db: SqlitePool, lms: Arc<dyn LmsClient>, options: SyncOptions) -> Self {
        Self {
            db,
            lms,
            options,
            run_lock: Mutex::new(()),
        }
    }

    pub async fn sync_all(&self) -> Result<SyncReport, AppError> {
        let _guard = self.try_acquire()?;
        let mut report = SyncReport::new();
        self.run_courses(&mut report).await?;
        self.run_users(&mut report).await?;
        Ok(report)
    }

    pub async fn sync_courses(&self) -> Result<SyncReport, AppError> {
        let _guard = self.try_acquire()?;
        let mut report = SyncReport::new();
        self.run_courses(&mut report).await?;
        Ok(report)
    }

    pub async fn sync_users(&self) -> Result<SyncReport, AppError> {
        let _guard = self.try_acquire()?;
        let mut report = SyncReport::new();
        self.run_users(&mut report).await?;
        Ok(report)
    }

    /// Re-run the role heuristics for one user and persist the result.
    /// Invoked by the account verification flow.
    pub async fn verify_role(
        &self,
        external_id: Option<&str>,
        email: &str,
    ) -> Result<Role, AppError> {
        let role = roles::determine_role(self.lms.as_ref(), external_id, email).await;
        let now = Utc::now().to_rfc3339();
        repository::record_verified_role(&self.db, external_id, email, role, &now).await?;
        Ok(role)
    }

    /// Runs are serialized; two concurrent syncs racing the same rows would
    /// corrupt each other's soft-delete snapshot.
    fn try_acquire(&self) -> Result<tokio::sync::MutexGuard<'_, ()>, AppError> {
        self.run_lock
            .try_lock()
            .map_err(|_| AppError::Conflict("a sync run is already in progress".to_string()))
    }

    /// Probe for a listing; an empty page from a pageable endpoint usually
    /// means the listing wants explicit offset/limit parameters.
    async fn fetch_listing(
        &self,
        templates: &[EndpointTemplate],
        scope: Option<&str>,
        domain_keys: &[&str],
    ) -> Result<(Vec<Value>, String), ProbeError> {
        let hit = probe::probe(self.lms.as_ref(), templates, scope, domain_keys).await?;
        if hit.records.is_empty() && hit.pageable {
            let records = paginate::fetch_paged(self.lms.as_ref(), &hit.endpoint, domain_keys).await;
            return Ok((records, hit.endpoint));
        }
        Ok((hit.records, hit.endpoint))
    }

    async fn run_courses(&self, report: &mut SyncReport) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        info!("starting course sync");

        // Run-level failure: without a course listing there is nothing to
        // reconcile against, and reconciling an empty set would deactivate
        // every course.
        let (records, endpoint) = match self
            .fetch_listing(endpoints::COURSES, None, endpoints::COURSE_ENVELOPE)
            .await
        {
            Ok(listing) => listing,
            Err(err) => {
                let message = format!("course listing fetch failed: {err}");
                repository::append_sync_log(
                    &self.db, "course", "*", "fetch", "error", Some(&message), &now,
                )
                .await?;
                report.success = false;
                report.errors.push(message);
                return Ok(());
            }
        };

        let courses: Vec<NormalizedCourse> = records
            .iter()
            .filter_map(normalize::normalize_course)
            .collect();

        let table = CourseTable { db: &self.db };
        let outcome = reconcile(&table, &courses, &now).await?;
        self.log_outcome("course", &endpoint, &outcome, &now).await?;
        merge_counts(&mut report.courses, &mut report.errors, &outcome);

        // Cascade into lessons for every course still present upstream. One
        // course failing does not stop the others.
        for course in &courses {
            if let Err(err) = self.run_lessons_for_course(course, report).await {
                let message = format!(
                    "lesson sync failed for course {}: {}",
                    course.external_id, err
                );
                warn!("{message}");
                repository::append_sync_log(
                    &self.db,
                    "lesson",
                    &course.external_id,
                    "fetch",
                    "error",
                    Some(&message),
                    &now,
                )
                .await?;
                report.lessons.errors += 1;
                report.errors.push(message);
            }
        }

        Ok(())
    }

    async fn run_lessons_for_course(
        &self,
        course: &NormalizedCourse,
        report: &mut SyncReport,
    ) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let Some(course_local_id) =
            repository::find_course_id_by_external_id(&self.db, &course.external_id).await?
        else {
            // The course itself failed to reconcile; nothing to scope to.
            return Ok(());
        };

        let (records, endpoint) = self
            .fetch_listing(
                endpoints::LESSONS,
                Some(&course.external_id),
                endpoints::LESSON_ENVELOPE,
            )
            .await?;

        let lessons: Vec<_> = records
            .iter()
            .filter_map(normalize::normalize_lesson)
            .collect();

        let table = LessonTable {
            db: &self.db,
            course_id: &course_local_id,
        };
        let outcome = reconcile(&table, &lessons, &now).await?;
        self.log_outcome("lesson", &endpoint, &outcome, &now).await?;
        merge_counts(&mut report.lessons, &mut report.errors, &outcome);
        Ok(())
    }

    async fn run_users(&self, report: &mut SyncReport) -> Result<(), AppError> {
        info!("starting user sync");
        let courses = repository::fetch_active_courses(&self.db).await?;

        for course in &courses {
            if let Err(err) = self.run_roster_for_course(course, report).await {
                let message = format!(
                    "roster sync failed for course {}: {}",
                    course.external_id, err
                );
                warn!("{message}");
                let now = Utc::now().to_rfc3339();
                repository::append_sync_log(
                    &self.db,
                    "student",
                    &course.external_id,
                    "fetch",
                    "error",
                    Some(&message),
                    &now,
                )
                .await?;
                report.students.errors += 1;
                report.errors.push(message);
            }
        }
        Ok(())
    }

    async fn run_roster_for_course(
        &self,
        course: &Course,
        report: &mut SyncReport,
    ) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let (records, endpoint) = self
            .fetch_listing(
                endpoints::ROSTER,
                Some(&course.external_id),
                endpoints::ROSTER_ENVELOPE,
            )
            .await?;

        // Dedup by student external id; rosters occasionally repeat a row
        // per section.
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for record in &records {
            if let Some((student, enrollment)) = normalize::normalize_roster_entry(record) {
                if seen.insert(student.external_id.clone()) {
                    entries.push((student, enrollment));
                }
            }
        }

        let mut roster_student_ids = Vec::new();
        for (student, enrollment) in &entries {
            let (student_local_id, created) = match self.upsert_student(student, &now).await {
                Ok(result) => result,
                Err(err) => {
                    report.students.errors += 1;
                    report
                        .errors
                        .push(format!("student {}: {}", student.external_id, err));
                    continue;
                }
            };

            if created {
                report.students.created += 1;
            } else {
                report.students.updated += 1;
            }
            repository::append_sync_log(
                &self.db,
                "student",
                &student.external_id,
                if created { "created" } else { "updated" },
                "ok",
                Some(&endpoint),
                &now,
            )
            .await?;
            roster_student_ids.push(student_local_id.clone());

            match self
                .upsert_enrollment(&course.id, &student_local_id, enrollment, &now)
                .await
            {
                Ok(true) => report.enrollments.created += 1,
                Ok(false) => report.enrollments.updated += 1,
                Err(err) => {
                    report.enrollments.errors += 1;
                    report.errors.push(format!(
                        "enrollment {}/{}: {}",
                        course.external_id, student.external_id, err
                    ));
                }
            }
        }

        // Separate, toggleable policy: rosters shrink when students drop,
        // but by default the enrollment rows stay as history.
        if self.options.enrollment_soft_delete {
            let stale = repository::deactivate_enrollments_absent(
                &self.db,
                &course.id,
                &roster_student_ids,
                &now,
            )
            .await?;
            for enrollment_id in stale {
                repository::append_sync_log(
                    &self.db,
                    "enrollment",
                    &enrollment_id,
                    "deactivated",
                    "ok",
                    None,
                    &now,
                )
                .await?;
            }
        }

        Ok(())
    }

    /// Upsert a student by external id, falling back to the email natural
    /// key for users first seen through role verification. Returns the local
    /// id and whether a row was created.
    async fn upsert_student(
        &self,
        student: &NormalizedStudent,
        now: &str,
    ) -> Result<(String, bool), AppError> {
        if let Some(user) =
            repository::find_user_by_external_id(&self.db, &student.external_id).await?
        {
            repository::update_user_from_remote(&self.db, &user.id, student, now).await?;
            return Ok((user.id, false));
        }

        if let Some(email) = &student.email {
            if let Some(user) = repository::find_active_user_by_email(&self.db, email).await? {
                repository::attach_external_id(&self.db, &user.id, &student.external_id, now)
                    .await?;
                repository::update_user_from_remote(&self.db, &user.id, student, now).await?;
                return Ok((user.id, false));
            }
        }

        // New users get their role probed once, on first sighting.
        let email = student.email.clone().unwrap_or_default();
        let role = roles::determine_role(self.lms.as_ref(), Some(&student.external_id), &email).await;
        let id = repository::insert_user(&self.db, student, role, now).await?;
        Ok((id, true))
    }

    async fn upsert_enrollment(
        &self,
        course_id: &str,
        student_id: &str,
        enrollment: &NormalizedEnrollment,
        now: &str,
    ) -> Result<bool, AppError> {
        match repository::find_enrollment(&self.db, course_id, student_id).await? {
            Some(existing) => {
                repository::update_enrollment(&self.db, &existing.id, enrollment, now).await?;
                Ok(false)
            }
            None => {
                repository::insert_enrollment(&self.db, course_id, student_id, enrollment, now)
                    .await?;
                Ok(true)
            }
        }
    }

    async fn log_outcome(
        &self,
        entity: &str,
        endpoint: &str,
        outcome: &ReconcileOutcome,
        now: &str,
    ) -> Result<(), AppError> {
        for external_id in &outcome.created {
            repository::append_sync_log(
                &self.db, entity, external_id, "created", "ok", Some(endpoint), now,
            )
            .await?;
        }
        for external_id in &outcome.updated {
            repository::append_sync_log(
                &self.db, entity, external_id, "updated", "ok", Some(endpoint), now,
            )
            .await?;
        }
        for external_id in &outcome.deactivated {
            repository::append_sync_log(
                &self.db, entity, external_id, "deactivated", "ok", None, now,
            )
            .await?;
        }
        for message in &outcome.errors {
            repository::append_sync_log(
                &self.db, entity, "*", "upsert", "error", Some(message), now,
            )
            .await?;
        }
        Ok(())
    }
}

fn merge_counts(counts: &mut EntityCounts, errors: &mut Vec<String>, outcome: &ReconcileOutcome) {
    counts.created += outcome.created.len();
    counts.updated += outcome.updated.len();
    counts.errors += outcome.errors.len();
    errors.extend(outcome.errors.iter().cloned());
}
