// src/services/question_generator.rs

// Client side of the external question generation service. It receives
// `{ prompt, count, difficulty, questionType }` and answers with
// `{ questions: [{ text, options, correctAnswer, difficulty, points }] }`.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::AppError,
    models::question::{Difficulty, GenerateQuestionsRequest, QuestionInput},
    utils::retry::retry_with_backoff,
};

/// A question as returned by the generator, before it passes our validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub difficulty: Difficulty,
    pub points: Option<i64>,
}

impl From<GeneratedQuestion> for QuestionInput {
    fn from(q: GeneratedQuestion) -> Self {
        QuestionInput {
            text: q.text,
            options: q.options,
            correct_answer: q.correct_answer,
            difficulty: q.difficulty,
            points: q.points.unwrap_or(1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    questions: Vec<GeneratedQuestion>,
}

/// Why a generator call failed. Only transient failures are worth retrying.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorError {
    /// Unreachable, timed out, throttled or a 5xx reply.
    Transient(String),
    /// The generator rejected the request or answered with something unusable.
    Permanent(String),
}

impl GeneratorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GeneratorError::Transient(_))
    }

    fn from_status(status: reqwest::StatusCode) -> Self {
        let msg = format!("Question generator responded with {}", status);
        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
        {
            GeneratorError::Transient(msg)
        } else {
            GeneratorError::Permanent(msg)
        }
    }
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::Transient(msg) => write!(f, "{}", msg),
            GeneratorError::Permanent(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<GeneratorError> for AppError {
    fn from(err: GeneratorError) -> Self {
        AppError::ServiceUnavailable(err.to_string())
    }
}

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(
        &self,
        params: &GenerateQuestionsRequest,
    ) -> Result<Vec<GeneratedQuestion>, GeneratorError>;
}

/// HTTP implementation talking JSON to the configured endpoint.
pub struct HttpQuestionGenerator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpQuestionGenerator {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Ok(Self {
            client,
            url: config.ai_api_url.clone(),
            api_key: config.ai_api_key.clone(),
        })
    }
}

#[async_trait]
impl QuestionGenerator for HttpQuestionGenerator {
    async fn generate(
        &self,
        params: &GenerateQuestionsRequest,
    ) -> Result<Vec<GeneratedQuestion>, GeneratorError> {
        let mut request = self.client.post(&self.url).json(params);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            GeneratorError::Transient(format!("Question generator unreachable: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(GeneratorError::from_status(response.status()));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            GeneratorError::Permanent(format!("Malformed generator response: {}", e))
        })?;

        Ok(body.questions)
    }
}

/// Calls the generator with exponential backoff as configured.
/// Permanent failures are returned after the first call.
pub async fn generate_with_retry(
    generator: &dyn QuestionGenerator,
    params: &GenerateQuestionsRequest,
    config: &Config,
) -> Result<Vec<GeneratedQuestion>, AppError> {
    let questions = retry_with_backoff(
        config.ai_max_attempts,
        Duration::from_millis(config.ai_base_delay_ms),
        GeneratorError::is_transient,
        || generator.generate(params),
    )
    .await?;

    Ok(questions)
}
