//! Canonicalization of raw LMS payloads.
//!
//! The LMS is not consistent about field names across endpoint generations;
//! the same lesson may carry its id as `id`, `lesson_id` or `lessonId`
//! depending on which endpoint answered. Each canonical field resolves
//! through an explicit ordered alias list, first non-null wins. A record
//! missing a required field is dropped with a log line, never a crash.

use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCourse {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLesson {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub order_number: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedStudent {
    pub external_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEnrollment {
    pub status: String,
    pub progress_percentage: f64,
    pub last_activity: Option<String>,
}

const COURSE_ID: &[&str] = &["id", "course_id", "courseId"];
const COURSE_TITLE: &[&str] = &["title", "name", "course_name"];
const COURSE_DESCRIPTION: &[&str] = &["description", "summary", "about"];

const LESSON_ID: &[&str] = &["id", "lesson_id", "lessonId"];
const LESSON_TITLE: &[&str] = &["title", "name", "lesson_name"];
const LESSON_DESCRIPTION: &[&str] = &["description", "summary"];
const LESSON_CONTENT: &[&str] = &["content", "body", "html"];
// Explicit order field first, then generic position, then sequence.
const LESSON_ORDER: &[&str] = &["order_number", "order", "position", "sequence"];

const STUDENT_ID: &[&str] = &["id", "user_id", "userId", "student_id", "studentId"];
const STUDENT_EMAIL: &[&str] = &["email", "user_email", "mail"];
const STUDENT_USERNAME: &[&str] = &["username", "login", "user_name", "name"];

const ENROLLMENT_STATUS: &[&str] = &["status", "state"];
const ENROLLMENT_PROGRESS: &[&str] = &[
    "progress_percentage",
    "progress",
    "completion",
    "completion_percentage",
];
const ENROLLMENT_ACTIVITY: &[&str] = &["last_activity", "last_activity_at", "last_seen"];

/// First alias resolving to a non-empty string. Numbers are stringified so a
/// numeric id still satisfies a string field.
fn string_field(record: &Value, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| match record.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn int_field(record: &Value, aliases: &[&str]) -> Option<i64> {
    aliases.iter().find_map(|key| match record.get(*key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

fn float_field(record: &Value, aliases: &[&str]) -> Option<f64> {
    aliases.iter().find_map(|key| match record.get(*key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

fn drop_record(entity: &str, reason: &str, record: &Value) {
    let raw = record.to_string();
    let preview: String = raw.chars().take(160).collect();
    warn!(entity, reason, record = %preview, "dropping record");
}

pub fn normalize_course(record: &Value) -> Option<NormalizedCourse> {
    let Some(external_id) = string_field(record, COURSE_ID) else {
        drop_record("course", "no resolvable id", record);
        return None;
    };
    let Some(title) = string_field(record, COURSE_TITLE) else {
        drop_record("course", "no resolvable title", record);
        return None;
    };
    Some(NormalizedCourse {
        external_id,
        title,
        description: string_field(record, COURSE_DESCRIPTION),
    })
}

pub fn normalize_lesson(record: &Value) -> Option<NormalizedLesson> {
    let Some(external_id) = string_field(record, LESSON_ID) else {
        drop_record("lesson", "no resolvable id", record);
        return None;
    };
    let Some(title) = string_field(record, LESSON_TITLE) else {
        drop_record("lesson", "no resolvable title", record);
        return None;
    };
    Some(NormalizedLesson {
        external_id,
        title,
        description: string_field(record, LESSON_DESCRIPTION),
        content: string_field(record, LESSON_CONTENT),
        order_number: int_field(record, LESSON_ORDER).unwrap_or(0),
    })
}

/// Roster endpoints flatten the student into the enrollment row; some nest
/// it under `user` or `student` instead.
pub fn normalize_roster_entry(record: &Value) -> Option<(NormalizedStudent, NormalizedEnrollment)> {
    let student_obj = record
        .get("user")
        .or_else(|| record.get("student"))
        .unwrap_or(record);

    let Some(external_id) = string_field(student_obj, STUDENT_ID) else {
        drop_record("student", "no resolvable id", record);
        return None;
    };
    let email = string_field(student_obj, STUDENT_EMAIL);
    let username = string_field(student_obj, STUDENT_USERNAME);
    if email.is_none() && username.is_none() {
        drop_record("student", "neither email nor username", record);
        return None;
    }

    let enrollment = NormalizedEnrollment {
        status: string_field(record, ENROLLMENT_STATUS).unwrap_or_else(|| "active".to_string()),
        progress_percentage: float_field(record, ENROLLMENT_PROGRESS).unwrap_or(0.0),
        last_activity: string_field(record, ENROLLMENT_ACTIVITY),
    };

    Some((
        NormalizedStudent {
            external_id,
            email,
            username,
        },
        enrollment,
    ))
}
