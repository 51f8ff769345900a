use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::{
        request::{SubmitQuestionRequest, VisitQuestionRequest},
        response::{Ack, StartAttemptResponse, SubmitTestResponse},
    },
};

/// Routes below are registered under `/api/test-attempts` behind the auth
/// middleware; paths here are relative to that scope.

#[post("/{series_id}/{test_id}/start")]
async fn start_attempt(
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let (series_id, test_id) = path.into_inner();
    let (attempt, resumed) = state
        .attempt_service
        .start_attempt(&auth.0, &series_id, &test_id)
        .await?;

    let response = StartAttemptResponse::from_attempt(&attempt, resumed);
    if resumed {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::Created().json(response))
    }
}

#[post("/{series_id}/{test_id}/submit-question")]
async fn submit_question(
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
    request: web::Json<SubmitQuestionRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let (series_id, test_id) = path.into_inner();
    state
        .attempt_service
        .submit_question(&auth.0, &series_id, &test_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(Ack::ok()))
}

#[post("/{series_id}/{test_id}/visit-question")]
async fn visit_question(
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
    request: web::Json<VisitQuestionRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let (series_id, test_id) = path.into_inner();
    state
        .attempt_service
        .visit_question(&auth.0, &series_id, &test_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(Ack::ok()))
}

#[post("/{series_id}/{test_id}/submit")]
async fn submit_test(
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let (series_id, test_id) = path.into_inner();
    let attempt = state
        .attempt_service
        .submit_test(&auth.0, &series_id, &test_id)
        .await?;
    Ok(HttpResponse::Ok().json(SubmitTestResponse::from_attempt(&attempt)))
}

#[get("/my-attempts")]
async fn my_attempts(
    state: web::Data<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let attempts = state.attempt_service.my_attempts(&auth.0).await?;
    Ok(HttpResponse::Ok().json(attempts))
}

#[get("/{attempt_id}/questions")]
async fn live_questions(
    state: web::Data<Arc<AppState>>,
    attempt_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let response = state
        .attempt_service
        .live_questions(&auth.0, &attempt_id)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/{attempt_id}/result")]
async fn result_analysis(
    state: web::Data<Arc<AppState>>,
    attempt_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let response = state
        .attempt_service
        .result_analysis(&auth.0, &attempt_id)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/{series_id}/{test_id}/leaderboard")]
async fn leaderboard(
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
    _auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let (series_id, test_id) = path.into_inner();
    let response = state
        .attempt_service
        .leaderboard(&series_id, &test_id)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/health")]
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[get("/health/ready")]
async fn health_check_ready(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let db_health = state.db.health_check().await;

    let status = if db_health.is_ok() {
        "ready"
    } else {
        "not_ready"
    };

    let response = serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "dependencies": {
            "mongodb": if db_health.is_ok() { "ok" } else { "error" }
        }
    });

    if db_health.is_ok() {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
