// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, patch, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{assessment, attempt, course, health, media, question},
    state::AppState,
    utils::jwt::{auth_middleware, student_middleware, tutor_middleware},
};

/// Assembles the main application router.
///
/// * Tutor routes: assessment authoring, question bank, course authoring, media events.
/// * Student routes: attempt start/submit/result.
/// * Shared authenticated routes: assessment by lesson, course content.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let tutor_routes = Router::new()
        .route("/assessments", post(assessment::create_assessment))
        .route("/assessments/{id}", patch(assessment::update_assessment))
        .route("/assessments/{id}/publish", patch(assessment::set_publish_state))
        .route(
            "/assessments/{id}/questions",
            post(question::create_question).get(question::list_questions),
        )
        .route(
            "/assessments/{id}/questions/generate",
            post(question::generate_questions),
        )
        .route("/questions", axum::routing::delete(question::delete_questions))
        .route("/questions/{id}", put(question::update_question))
        .route("/courses", post(course::create_course))
        .route("/lessons/{id}/media-events", post(media::report_media_event))
        // Auth first, then role check
        .layer(middleware::from_fn(tutor_middleware));

    let student_routes = Router::new()
        .route("/assessments/{id}/attempts/start", post(attempt::start_attempt))
        .route("/assessments/{id}/attempts/submit", post(attempt::submit_attempt))
        .route("/attempts/{id}/result", get(attempt::get_result))
        .layer(middleware::from_fn(student_middleware));

    let shared_routes = Router::new()
        .route(
            "/assessments/lessons/{lesson_id}",
            get(assessment::get_assessment_by_lesson),
        )
        .route("/courses/{id}", get(course::get_course));

    let protected = Router::new()
        .merge(tutor_routes)
        .merge(student_routes)
        .merge(shared_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .route("/health", get(health::health))
        .merge(protected);

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
