use serde_json::Value;
use tracing::debug;

use crate::lms::endpoints;
use crate::lms::LmsClient;
use crate::models::Role;
use crate::sync::probe::unwrap_envelope;

const ROLE_FIELDS: &[&str] = &["role", "user_role", "type"];
const TEACHER_VALUES: &[&str] = &["teacher", "instructor"];

/// Classify a user as teacher or student by probing the LMS.
///
/// Heuristics are tried in order: dedicated role/profile endpoints, then a
/// query for courses the user teaches. Any endpoint error is a negative
/// signal, never fatal. Superadmin is assigned by application administrators
/// out of band and is never inferred here.
pub async fn determine_role(
    client: &dyn LmsClient,
    external_id: Option<&str>,
    email: &str,
) -> Role {
    if let Some(user_id) = external_id {
        for template in endpoints::USER_ROLE {
            let path = template.render(Some(user_id));
            match client.get(&path).await {
                Ok(body) if indicates_teacher(&body) => return Role::Teacher,
                Ok(_) => {}
                Err(err) => debug!(endpoint = %path, error = %err, "role probe failed"),
            }
        }

        let path = endpoints::INSTRUCTOR_COURSES.render(Some(user_id));
        match client.get(&path).await {
            Ok(body) => {
                if let Some(courses) = unwrap_envelope(body, endpoints::COURSE_ENVELOPE) {
                    if !courses.is_empty() {
                        return Role::Teacher;
                    }
                }
            }
            Err(err) => debug!(endpoint = %path, error = %err, "instructor course probe failed"),
        }
    }

    if !email.is_empty() {
        for template in endpoints::USER_ROLE_BY_EMAIL {
            let path = template.render(Some(email));
            match client.get(&path).await {
                Ok(body) if indicates_teacher(&body) => return Role::Teacher,
                Ok(_) => {}
                Err(err) => debug!(endpoint = %path, error = %err, "role probe failed"),
            }
        }
    }

    Role::Student
}

fn indicates_teacher(body: &Value) -> bool {
    let record = body.get("data").unwrap_or(body);
    ROLE_FIELDS.iter().any(|field| {
        record
            .get(*field)
            .and_then(Value::as_str)
            .is_some_and(|value| {
                TEACHER_VALUES
                    .iter()
                    .any(|teacher| value.eq_ignore_ascii_case(teacher))
            })
    })
}
