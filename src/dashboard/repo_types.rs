use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Article {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One stored classifier outcome. Rows are never updated after insert.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_path: String, // storage key, relative
    pub prediction: String,
    pub explanation: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct NewPrediction<'a> {
    pub user_id: Uuid,
    pub image_path: &'a str,
    pub prediction: &'a str,
    pub explanation: &'a str,
}

/// Window over a newest-first listing. `limit: None` means everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: i64,
}

impl Page {
    pub fn all() -> Self {
        Self {
            limit: None,
            offset: 0,
        }
    }
}
