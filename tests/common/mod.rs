#![allow(dead_code)]

use std::{
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use classroom::{
    config::Config,
    models::question::{Difficulty, GenerateQuestionsRequest},
    routes,
    services::{
        media_events::spawn_media_worker,
        question_generator::{GeneratedQuestion, GeneratorError, QuestionGenerator},
    },
    state::AppState,
    utils::jwt::{ROLE_STUDENT, ROLE_TUTOR, sign_jwt},
};
use serde_json::{Value, json};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// Generator double: answers with fixed questions, is always down, or refuses the request.
pub enum StubGenerator {
    Returns(Vec<GeneratedQuestion>),
    Down,
    Rejects,
}

#[async_trait]
impl QuestionGenerator for StubGenerator {
    async fn generate(
        &self,
        _params: &GenerateQuestionsRequest,
    ) -> Result<Vec<GeneratedQuestion>, GeneratorError> {
        match self {
            StubGenerator::Returns(questions) => Ok(questions.clone()),
            StubGenerator::Down => Err(GeneratorError::Transient("generator down".to_string())),
            StubGenerator::Rejects => Err(GeneratorError::Permanent("bad prompt".to_string())),
        }
    }
}

pub fn generated(text: &str, options: &[&str], answer: &str) -> GeneratedQuestion {
    GeneratedQuestion {
        text: text.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: answer.to_string(),
        difficulty: Difficulty::Easy,
        points: Some(2),
    }
}


pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_generator(StubGenerator::Down).await
}

/// Spawns the app on a random port over a private in-memory database.
pub async fn spawn_app_with_generator(generator: StubGenerator) -> TestApp {
    // One connection that never expires keeps the in-memory database alive.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    serve(pool, generator).await
}

static DB_FILES: AtomicUsize = AtomicUsize::new(0);

/// Spawns the app over a WAL database file with several pooled connections,
/// so concurrent requests really run side by side.
pub async fn spawn_app_with_file_db() -> TestApp {
    let path = std::env::temp_dir().join(format!(
        "classroom-test-{}-{}.db",
        std::process::id(),
        DB_FILES.fetch_add(1, Ordering::SeqCst)
    ));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
        .expect("Invalid SQLite path")
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .expect("Failed to open SQLite file");

    serve(pool, StubGenerator::Down).await
}

async fn serve(pool: SqlitePool, generator: StubGenerator) -> TestApp {
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        ai_api_url: "http://127.0.0.1:9/unused".to_string(),
        ai_api_key: None,
        ai_max_attempts: 3,
        ai_base_delay_ms: 1,
    };

    let (media_events, _worker) = spawn_media_worker(pool.clone());

    let state = AppState {
        pool: pool.clone(),
        config,
        generator: Arc::new(generator),
        media_events,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
    }
}

pub fn tutor_token(id: i64) -> String {
    sign_jwt(id, ROLE_TUTOR, JWT_SECRET, 600).unwrap()
}

pub fn student_token(id: i64) -> String {
    sign_jwt(id, ROLE_STUDENT, JWT_SECRET, 600).unwrap()
}


impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    /// Sends a request and returns (status, parsed envelope).
    pub async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (u16, Value) {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.expect("Failed to execute request");
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        self.send(reqwest::Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        self.send(reqwest::Method::PATCH, path, Some(token), Some(body)).await
    }

    pub async fn get(&self, path: &str, token: &str) -> (u16, Value) {
        self.send(reqwest::Method::GET, path, Some(token), None).await
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Authors a one-module course whose lessons are quiz lessons; returns lesson ids.
    pub async fn quiz_lessons(&self, tutor: &str, how_many: usize) -> Vec<i64> {
        let lessons: Vec<Value> = (0..how_many)
            .map(|i| json!({ "title": format!("Quiz {}", i + 1), "type": "quiz", "duration": 60 }))
            .collect();
        let (status, body) = self
            .post(
                "/courses",
                tutor,
                json!({
                    "title": "Algebra",
                    "description": "Intro course",
                    "category": "math",
                    "difficulty": "beginner",
                    "price": { "USD": 10.0 },
                    "modules": [{ "title": "Basics", "lessons": lessons }]
                }),
            )
            .await;
        assert_eq!(status, 201, "course creation failed: {}", body);
        body["data"]["modules"][0]["lessons"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["id"].as_i64().unwrap())
            .collect()
    }

    /// Creates a draft assessment with every question in the easy tier.
    pub async fn easy_assessment(&self, tutor: &str, lesson_id: i64, total: i64) -> i64 {
        let (status, body) = self
            .post(
                "/assessments",
                tutor,
                json!({
                    "lessonId": lesson_id,
                    "title": "Checkpoint",
                    "totalQuestions": total,
                    "distribution": { "easy": total, "medium": 0, "hard": 0 },
                    "durationMinutes": 20
                }),
            )
            .await;
        assert_eq!(status, 201, "assessment creation failed: {}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn add_question(
        &self,
        tutor: &str,
        assessment_id: i64,
        text: &str,
        answer: &str,
        points: i64,
    ) -> i64 {
        let (status, body) = self
            .post(
                &format!("/assessments/{}/questions", assessment_id),
                tutor,
                json!({
                    "text": text,
                    "options": ["A", "B", "C", "X"],
                    "correctAnswer": answer,
                    "difficulty": "easy",
                    "points": points
                }),
            )
            .await;
        assert_eq!(status, 201, "question creation failed: {}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn publish(&self, tutor: &str, assessment_id: i64) {
        let (status, body) = self
            .patch(
                &format!("/assessments/{}/publish", assessment_id),
                tutor,
                json!({ "publish": true }),
            )
            .await;
        assert_eq!(status, 200, "publish failed: {}", body);
    }
}
