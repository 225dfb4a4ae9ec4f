//! Catalog of known LMS endpoint shapes.
//!
//! The LMS has shifted its URL layout between API generations, so each entity
//! keeps an ordered candidate list, most likely shape first. The prober walks
//! the list until one answers with array-shaped data.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy)]
pub struct EndpointTemplate {
    pub path: &'static str,
    pub method: Method,
    /// Whether the endpoint honors `limit`/`offset` query parameters.
    pub pageable: bool,
}

impl EndpointTemplate {
    pub const fn get(path: &'static str) -> Self {
        Self {
            path,
            method: Method::Get,
            pageable: false,
        }
    }

    pub const fn paged(path: &'static str) -> Self {
        Self {
            path,
            method: Method::Get,
            pageable: true,
        }
    }

    pub const fn post(path: &'static str) -> Self {
        Self {
            path,
            method: Method::Post,
            pageable: false,
        }
    }

    /// Substitute the scope value into any placeholder the template carries.
    pub fn render(&self, scope: Option<&str>) -> String {
        match scope {
            Some(value) => self
                .path
                .replace("{course_id}", value)
                .replace("{user_id}", value)
                .replace("{email}", value),
            None => self.path.to_string(),
        }
    }
}

pub const COURSES: &[EndpointTemplate] = &[
    EndpointTemplate::paged("/api/v1/courses"),
    EndpointTemplate::get("/api/courses"),
    EndpointTemplate::get("/api/v1/courses/list"),
];

pub const LESSONS: &[EndpointTemplate] = &[
    EndpointTemplate::paged("/api/v1/courses/{course_id}/lessons"),
    EndpointTemplate::get("/api/v1/lessons?course_id={course_id}"),
    EndpointTemplate::get("/api/courses/{course_id}/lessons"),
];

pub const ROSTER: &[EndpointTemplate] = &[
    EndpointTemplate::paged("/api/v1/courses/{course_id}/students"),
    EndpointTemplate::get("/api/v1/courses/{course_id}/enrollments"),
    EndpointTemplate::post("/api/v1/courses/{course_id}/students/search"),
];

pub const USER_ROLE: &[EndpointTemplate] = &[
    EndpointTemplate::get("/api/v1/users/{user_id}/role"),
    EndpointTemplate::get("/api/v1/users/{user_id}/profile"),
];

pub const USER_ROLE_BY_EMAIL: &[EndpointTemplate] =
    &[EndpointTemplate::get("/api/v1/users/role?email={email}")];

pub const INSTRUCTOR_COURSES: EndpointTemplate =
    EndpointTemplate::get("/api/v1/courses?instructor_id={user_id}");

/// Domain-specific envelope keys per entity, tried after `data` and before
/// `items`.
pub const COURSE_ENVELOPE: &[&str] = &["courses"];
pub const LESSON_ENVELOPE: &[&str] = &["lessons"];
pub const ROSTER_ENVELOPE: &[&str] = &["students", "users", "enrollments"];
