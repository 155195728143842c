// tests/attempt_tests.rs

mod common;

use std::collections::{HashMap, HashSet};

use common::{TestApp, spawn_app, spawn_app_with_file_db, student_token, tutor_token};
use serde_json::{Value, json};

/// Published assessment with three easy questions worth 1, 2 and 3 points whose
/// correct answers are A, B and C. Returns (assessment id, question ids).
async fn weighted_quiz(app: &TestApp, tutor: &str) -> (i64, Vec<i64>) {
    let lesson = app.quiz_lessons(tutor, 1).await[0];
    let assessment = app.easy_assessment(tutor, lesson, 3).await;
    let q1 = app.add_question(tutor, assessment, "Q1", "A", 1).await;
    let q2 = app.add_question(tutor, assessment, "Q2", "B", 2).await;
    let q3 = app.add_question(tutor, assessment, "Q3", "C", 3).await;
    app.publish(tutor, assessment).await;
    (assessment, vec![q1, q2, q3])
}

fn answers(pairs: &[(i64, &str)]) -> Value {
    let list: Vec<Value> = pairs
        .iter()
        .map(|(id, a)| json!({ "questionId": id, "answer": a }))
        .collect();
    json!({ "answers": list })
}

#[tokio::test]
async fn start_hides_correct_answers_and_is_idempotent() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);
    let student = student_token(100);
    let (assessment, _) = weighted_quiz(&app, &tutor).await;

    let path = format!("/assessments/{}/attempts/start", assessment);
    let (status, first) = app.post(&path, &student, json!({})).await;
    assert_eq!(status, 201, "{}", first);

    let questions = first["data"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    for q in questions {
        assert!(q.get("correctAnswer").is_none());
        assert!(q.get("points").is_none());
        assert_eq!(q["options"].as_array().unwrap().len(), 4);
    }

    let (status, second) = app.post(&path, &student, json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(first["data"]["attemptId"], second["data"]["attemptId"]);
    assert_eq!(first["data"]["questions"], second["data"]["questions"]);
    assert_eq!(app.count("attempts").await, 1);
}

#[tokio::test]
async fn submit_scores_weighted_points() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);
    let student = student_token(100);
    let (assessment, ids) = weighted_quiz(&app, &tutor).await;

    app.post(&format!("/assessments/{}/attempts/start", assessment), &student, json!({}))
        .await;

    let (status, body) = app
        .post(
            &format!("/assessments/{}/attempts/submit", assessment),
            &student,
            answers(&[(ids[0], "A"), (ids[1], "X"), (ids[2], "C")]),
        )
        .await;

    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["score"], 4);
    assert_eq!(body["data"]["maxScore"], 6);
    assert_eq!(body["data"]["percentage"], 67);
    assert_eq!(body["statusCode"], 200);
    assert!(body["error"].is_null());
}

#[tokio::test]
async fn grading_uses_snapshot_not_live_questions() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);
    let student = student_token(100);
    let (assessment, ids) = weighted_quiz(&app, &tutor).await;

    app.post(&format!("/assessments/{}/attempts/start", assessment), &student, json!({}))
        .await;

    // The tutor rewrites Q1's answer and deletes Q3 mid-attempt.
    let (status, _) = app
        .send(
            reqwest::Method::PUT,
            &format!("/questions/{}", ids[0]),
            Some(&tutor),
            Some(json!({
                "text": "Q1 (revised)",
                "options": ["A", "B", "C", "X"],
                "correctAnswer": "B",
                "difficulty": "easy",
                "points": 10
            })),
        )
        .await;
    assert_eq!(status, 200);
    let (status, _) = app
        .send(
            reqwest::Method::DELETE,
            "/questions",
            Some(&tutor),
            Some(json!({ "ids": [ids[2]] })),
        )
        .await;
    assert_eq!(status, 200);

    let (status, submitted) = app
        .post(
            &format!("/assessments/{}/attempts/submit", assessment),
            &student,
            answers(&[(ids[0], "A"), (ids[1], "B"), (ids[2], "C")]),
        )
        .await;
    assert_eq!(status, 200, "{}", submitted);
    assert_eq!(submitted["data"]["score"], 6);
    assert_eq!(submitted["data"]["maxScore"], 6);

    let attempt_id = submitted["data"]["attemptId"].as_i64().unwrap();
    let (status, result) = app
        .get(&format!("/attempts/{}/result", attempt_id), &student)
        .await;
    assert_eq!(status, 200);
    assert_eq!(result["data"]["score"], 6);
    assert_eq!(result["data"]["percentage"], 100);
}

#[tokio::test]
async fn double_submit_finds_no_active_attempt() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);
    let student = student_token(100);
    let (assessment, ids) = weighted_quiz(&app, &tutor).await;

    app.post(&format!("/assessments/{}/attempts/start", assessment), &student, json!({}))
        .await;

    let submit = format!("/assessments/{}/attempts/submit", assessment);
    let (status, first) = app.post(&submit, &student, answers(&[(ids[0], "A")])).await;
    assert_eq!(status, 200);
    assert_eq!(first["data"]["score"], 1);

    let (status, second) = app
        .post(&submit, &student, answers(&[(ids[0], "A"), (ids[1], "B"), (ids[2], "C")]))
        .await;
    assert_eq!(status, 404);
    assert_eq!(second["error"], "Active attempt not found");

    // The stored grade is untouched.
    let score: i64 = sqlx::query_scalar("SELECT score FROM attempts")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(score, 1);
}

#[tokio::test]
async fn submit_without_start_is_not_found() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);
    let (assessment, _) = weighted_quiz(&app, &tutor).await;

    let (status, body) = app
        .post(
            &format!("/assessments/{}/attempts/submit", assessment),
            &student_token(100),
            answers(&[]),
        )
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Active attempt not found");
}

#[tokio::test]
async fn result_is_private_and_only_after_submit() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);
    let student = student_token(100);
    let (assessment, _) = weighted_quiz(&app, &tutor).await;

    let (_, started) = app
        .post(&format!("/assessments/{}/attempts/start", assessment), &student, json!({}))
        .await;
    let attempt_id = started["data"]["attemptId"].as_i64().unwrap();
    let result_path = format!("/attempts/{}/result", attempt_id);

    let (status, _) = app.get(&result_path, &student).await;
    assert_eq!(status, 404);

    app.post(
        &format!("/assessments/{}/attempts/submit", assessment),
        &student,
        answers(&[]),
    )
    .await;

    let (status, _) = app.get(&result_path, &student_token(101)).await;
    assert_eq!(status, 404);

    let (status, body) = app.get(&result_path, &student).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["score"], 0);
    assert_eq!(body["data"]["percentage"], 0);
    assert!(body["data"]["submittedAt"].is_string());
}

#[tokio::test]
async fn new_attempt_allowed_after_submission() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);
    let student = student_token(100);
    let (assessment, _) = weighted_quiz(&app, &tutor).await;
    let start = format!("/assessments/{}/attempts/start", assessment);

    let (_, first) = app.post(&start, &student, json!({})).await;
    app.post(
        &format!("/assessments/{}/attempts/submit", assessment),
        &student,
        answers(&[]),
    )
    .await;
    let (status, second) = app.post(&start, &student, json!({})).await;

    assert_eq!(status, 201);
    assert_ne!(first["data"]["attemptId"], second["data"]["attemptId"]);
    assert_eq!(app.count("attempts").await, 2);
}

#[tokio::test]
async fn start_rejects_missing_or_unpublished_assessment() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);
    let student = student_token(100);

    let (status, _) = app.post("/assessments/999/attempts/start", &student, json!({})).await;
    assert_eq!(status, 404);

    let lesson = app.quiz_lessons(&tutor, 1).await[0];
    let assessment = app.easy_assessment(&tutor, lesson, 1).await;
    app.add_question(&tutor, assessment, "Q1", "A", 1).await;

    let (status, body) = app
        .post(&format!("/assessments/{}/attempts/start", assessment), &student, json!({}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Assessment is not published");
    assert_eq!(app.count("attempts").await, 0);
}

#[tokio::test]
async fn sampling_is_bounded_by_pool_and_skips_deleted() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);
    let student = student_token(100);

    let lesson = app.quiz_lessons(&tutor, 1).await[0];
    let assessment = app.easy_assessment(&tutor, lesson, 5).await;
    let kept_a = app.add_question(&tutor, assessment, "Kept A", "A", 1).await;
    let kept_b = app.add_question(&tutor, assessment, "Kept B", "B", 2).await;
    let removed = app.add_question(&tutor, assessment, "Removed", "C", 3).await;
    app.send(
        reqwest::Method::DELETE,
        "/questions",
        Some(&tutor),
        Some(json!({ "ids": [removed] })),
    )
    .await;
    app.publish(&tutor, assessment).await;

    let (status, body) = app
        .post(&format!("/assessments/{}/attempts/start", assessment), &student, json!({}))
        .await;
    assert_eq!(status, 201);

    let mut served: Vec<i64> = body["data"]["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["questionId"].as_i64().unwrap())
        .collect();
    served.sort();
    assert_eq!(served, vec![kept_a, kept_b]);

    let max_score: i64 = sqlx::query_scalar("SELECT max_score FROM attempts")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(max_score, 3);
}

#[tokio::test]
async fn sampling_never_serves_more_than_requested() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);

    let lesson = app.quiz_lessons(&tutor, 1).await[0];
    let assessment = app.easy_assessment(&tutor, lesson, 2).await;
    for i in 0..6 {
        app.add_question(&tutor, assessment, &format!("Q{}", i), "A", 1).await;
    }
    app.publish(&tutor, assessment).await;

    let mut seen: HashMap<i64, usize> = HashMap::new();
    for student_id in 100..110 {
        let (status, body) = app
            .post(
                &format!("/assessments/{}/attempts/start", assessment),
                &student_token(student_id),
                json!({}),
            )
            .await;
        assert_eq!(status, 201);
        let questions = body["data"]["questions"].as_array().unwrap();
        assert_eq!(questions.len(), 2);
        assert_ne!(questions[0]["questionId"], questions[1]["questionId"]);
        for q in questions {
            *seen.entry(q["questionId"].as_i64().unwrap()).or_default() += 1;
        }
    }
    // Ten independent draws of 2 out of 6 do not keep hitting the same pair.
    assert!(seen.len() > 2);
}

#[tokio::test]
async fn empty_pool_is_rejected_before_any_write() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);

    let lesson = app.quiz_lessons(&tutor, 1).await[0];
    let assessment = app.easy_assessment(&tutor, lesson, 3).await;
    app.publish(&tutor, assessment).await;

    let (status, _) = app
        .post(
            &format!("/assessments/{}/attempts/start", assessment),
            &student_token(100),
            json!({}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(app.count("attempts").await, 0);
}

#[tokio::test]
async fn attempts_require_student_role() {
    let app = spawn_app().await;
    let tutor = tutor_token(1);
    let (assessment, _) = weighted_quiz(&app, &tutor).await;
    let path = format!("/assessments/{}/attempts/start", assessment);

    let (status, _) = app.post(&path, &tutor, json!({})).await;
    assert_eq!(status, 403);

    let (status, body) = app
        .send(reqwest::Method::POST, &path, None, Some(json!({})))
        .await;
    assert_eq!(status, 401);
    assert_eq!(body["statusCode"], 401);
    assert!(body["data"].is_null());
}

/// Fires the same request `n` times at once; returns each (status, body).
async fn concurrently(app: &TestApp, path: &str, token: &str, body: Value, n: usize) -> Vec<(u16, Value)> {
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let request = app
                .client
                .post(app.url(path))
                .bearer_auth(token)
                .json(&body);
            tokio::spawn(async move {
                let response = request.send().await.expect("Failed to execute request");
                let status = response.status().as_u16();
                (status, response.json::<Value>().await.unwrap_or(Value::Null))
            })
        })
        .collect();

    let mut results = Vec::with_capacity(n);
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test]
async fn concurrent_starts_and_submits_settle_on_one_attempt() {
    let app = spawn_app_with_file_db().await;
    let tutor = tutor_token(1);
    let student = student_token(100);
    let (assessment, ids) = weighted_quiz(&app, &tutor).await;

    let start = format!("/assessments/{}/attempts/start", assessment);
    let starts = concurrently(&app, &start, &student, json!({}), 16).await;

    let created = starts.iter().filter(|(s, _)| *s == 201).count();
    let resumed = starts.iter().filter(|(s, _)| *s == 200).count();
    assert_eq!(created, 1, "{:?}", starts);
    assert_eq!(resumed, 15, "{:?}", starts);

    let attempt_ids: HashSet<i64> = starts
        .iter()
        .map(|(_, b)| b["data"]["attemptId"].as_i64().unwrap())
        .collect();
    assert_eq!(attempt_ids.len(), 1);
    assert_eq!(app.count("attempts").await, 1);

    let submit = format!("/assessments/{}/attempts/submit", assessment);
    let body = answers(&[(ids[0], "A"), (ids[1], "B"), (ids[2], "C")]);
    let submits = concurrently(&app, &submit, &student, body, 16).await;

    let accepted = submits.iter().filter(|(s, _)| *s == 200).count();
    let rejected = submits.iter().filter(|(s, _)| *s == 404).count();
    assert_eq!(accepted, 1, "{:?}", submits);
    assert_eq!(rejected, 15, "{:?}", submits);

    let submitted: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE submitted_at IS NOT NULL")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(submitted, 1);
}
