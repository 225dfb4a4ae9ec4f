use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

use edusync::lms::{LmsClient, LmsError};

/// Canned LMS answering from a fixed path → payload table. Unknown paths get
/// a 404. Every request is recorded for call-count assertions.
#[derive(Default)]
pub struct MockLms {
    responses: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<String>>,
}

impl MockLms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), body);
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| called.as_str() == path)
            .count()
    }

    fn answer(&self, path: &str) -> Result<Value, LmsError> {
        self.calls.lock().unwrap().push(path.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or(LmsError::Status {
                status: 404,
                body: "not found".to_string(),
            })
    }
}

#[async_trait]
impl LmsClient for MockLms {
    async fn get(&self, path_and_query: &str) -> Result<Value, LmsError> {
        self.answer(path_and_query)
    }

    async fn post(&self, path_and_query: &str, _body: &Value) -> Result<Value, LmsError> {
        self.answer(path_and_query)
    }
}

pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}
