use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{
        ArticleCreated, ArticleList, DashboardResponse, HistoryResponse, InsertArticleRequest,
        Pagination, PredictResponse,
    },
    services,
};
use crate::{
    auth::extractors::DashboardUser, classifier::ImageUpload, error::AppError, state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024; // 20MB

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/:username/dashboard", get(dashboard))
        .route("/:username/dashboard/insert_article", post(insert_article))
        .route("/:username/dashboard/view_articles", get(view_articles))
        .route("/:username/dashboard/history", get(history))
        .route(
            "/:username/dashboard/predict",
            post(predict).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    DashboardUser(user): DashboardUser,
) -> Result<Json<DashboardResponse>, AppError> {
    Ok(Json(services::get_dashboard(&state, &user).await?))
}

#[instrument(skip_all)]
pub async fn insert_article(
    State(state): State<AppState>,
    DashboardUser(user): DashboardUser,
    body: Result<Json<InsertArticleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ArticleCreated>), AppError> {
    let Json(body) = body?;
    let created = services::insert_article(&state, &user, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip_all)]
pub async fn view_articles(
    State(state): State<AppState>,
    DashboardUser(user): DashboardUser,
    p: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<ArticleList>, AppError> {
    let Query(p) = p?;
    Ok(Json(services::list_articles(&state, &user, p.page()).await?))
}

#[instrument(skip_all)]
pub async fn history(
    State(state): State<AppState>,
    DashboardUser(user): DashboardUser,
    p: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    let Query(p) = p?;
    Ok(Json(services::history(&state, &user, p.page()).await?))
}

/// POST /:username/dashboard/predict (multipart, file field `image`)
#[instrument(skip_all)]
pub async fn predict(
    State(state): State<AppState>,
    DashboardUser(user): DashboardUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, AppError> {
    let image = match mp {
        Ok(mp) => read_image_field(mp).await?,
        Err(e) => {
            warn!(error = %e, "predict called without a multipart body");
            None
        }
    };
    Ok(Json(services::predict(&state, &user, image).await?))
}

async fn read_image_field(mut mp: Multipart) -> Result<Option<ImageUpload>, AppError> {
    let mut image = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(e.body_text()))?
    {
        if field.name() != Some("image") || field.file_name().is_none() {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        image = Some(ImageUpload {
            file_name,
            content_type,
            body,
        });
    }
    Ok(image)
}
