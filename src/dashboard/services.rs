use std::path::Path;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        ArticleCreated, ArticleList, DashboardResponse, HistoryItem, HistoryResponse,
        InsertArticleRequest, PredictResponse,
    },
    repo_types::{Article, NewPrediction, Page},
};
use crate::{auth::repo_types::User, classifier::ImageUpload, error::AppError, state::AppState};

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_dashboard(st: &AppState, user: &User) -> Result<DashboardResponse, AppError> {
    let (articles, results) = tokio::try_join!(
        st.articles.list_by_user(user.id, Page::all()),
        st.predictions.list_by_user(user.id, Page::all()),
    )?;
    Ok(DashboardResponse {
        greeting: format!("Hello, {}!", user.username),
        articles,
        results,
    })
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn insert_article(
    st: &AppState,
    user: &User,
    req: InsertArticleRequest,
) -> Result<ArticleCreated, AppError> {
    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err(AppError::validation("title and content are required"));
    }
    let article: Article = st.articles.create(user.id, &req.title, &req.content).await?;
    info!(article_id = %article.id, "article created");
    Ok(ArticleCreated {
        message: "article created".into(),
        article,
    })
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_articles(st: &AppState, user: &User, page: Page) -> Result<ArticleList, AppError> {
    let articles = st.articles.list_by_user(user.id, page).await?;
    Ok(ArticleList {
        user: user.username.clone(),
        articles,
    })
}

/// Store the upload, ask the classifier about it, then record the answer.
///
/// Nothing leaves the process when `image` is absent or empty.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn predict(
    st: &AppState,
    user: &User,
    image: Option<ImageUpload>,
) -> Result<PredictResponse, AppError> {
    let image = image
        .filter(|i| !i.body.is_empty())
        .ok_or_else(|| AppError::validation("image file is required"))?;
    if !is_acceptable_content_type(&image.content_type) {
        return Err(AppError::validation("image must be an image file"));
    }

    let key = object_key(user.id, &image);
    st.storage
        .put_object(&key, image.body.clone(), &image.content_type)
        .await?;

    let classification = match st.classifier.classify(&image).await {
        Ok(c) => c,
        Err(e) => {
            discard_upload(st, &key).await;
            return Err(AppError::Upstream(e));
        }
    };

    let photo_url = match st.storage.public_url(&key).await {
        Ok(url) => url,
        Err(e) => {
            discard_upload(st, &key).await;
            return Err(e.into());
        }
    };

    let record = match st
        .predictions
        .create(NewPrediction {
            user_id: user.id,
            image_path: &key,
            prediction: &classification.prediction,
            explanation: &classification.explanation,
        })
        .await
    {
        Ok(r) => r,
        Err(e) => {
            discard_upload(st, &key).await;
            return Err(e.into());
        }
    };

    info!(result_id = %record.id, prediction = %record.prediction, "prediction stored");
    Ok(PredictResponse {
        message: "prediction saved".into(),
        prediction: classification.prediction,
        explanation: classification.explanation,
        confidence_scores: classification.confidence_scores,
        photo_url,
        result: record,
    })
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn history(st: &AppState, user: &User, page: Page) -> Result<HistoryResponse, AppError> {
    let records = st.predictions.list_by_user(user.id, page).await?;
    let mut history = Vec::with_capacity(records.len());
    for record in records {
        let photo_url = st.storage.public_url(&record.image_path).await?;
        history.push(HistoryItem { record, photo_url });
    }
    Ok(HistoryResponse { history })
}

async fn discard_upload(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, %key, "failed to remove orphaned upload");
    }
}

fn is_acceptable_content_type(ct: &str) -> bool {
    ct.starts_with("image/") || ct == "application/octet-stream"
}

fn object_key(user_id: Uuid, image: &ImageUpload) -> String {
    let ext = ext_from_mime(&image.content_type)
        .or_else(|| ext_from_file_name(&image.file_name))
        .unwrap_or("bin");
    format!("results/{}/{}.{}", user_id, Uuid::new_v4(), ext)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}

fn ext_from_file_name(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "heic" => Some("heic"),
        "bmp" => Some("bmp"),
        _ => None,
    }
}
