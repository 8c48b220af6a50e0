use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_hint).post(register))
        .route("/auth/register", get(register_hint).post(register))
        .route("/login", get(login_hint).post(login))
        .route("/auth/login", get(login_hint).post(login))
}

async fn register_hint() -> Json<Value> {
    Json(json!({
        "message": "use POST /register with JSON: { username, email, password, retype_password }"
    }))
}

async fn login_hint() -> Json<Value> {
    Json(json!({ "message": "use POST /login with JSON: { login, password }" }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let Json(payload) = payload?;
    let user = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload?;
    let res = services::login(&state, payload).await?;
    Ok(Json(res))
}
