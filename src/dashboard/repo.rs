use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Article, NewPrediction, Page, PredictionRecord};

#[async_trait]
pub trait ArticleRepo: Send + Sync {
    async fn create(&self, user_id: Uuid, title: &str, content: &str) -> anyhow::Result<Article>;
    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid, page: Page) -> anyhow::Result<Vec<Article>>;
}

#[async_trait]
pub trait PredictionRepo: Send + Sync {
    async fn create(&self, new: NewPrediction<'_>) -> anyhow::Result<PredictionRecord>;
    /// Newest first.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> anyhow::Result<Vec<PredictionRecord>>;
}

#[derive(Clone)]
pub struct PgArticleRepo {
    db: PgPool,
}

impl PgArticleRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArticleRepo for PgArticleRepo {
    async fn create(&self, user_id: Uuid, title: &str, content: &str) -> anyhow::Result<Article> {
        let article = sqlx::query_as::<_, Article>(
            r#"
            INSERT INTO articles (user_id, title, content)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, content, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(content)
        .fetch_one(&self.db)
        .await
        .context("insert article")?;
        Ok(article)
    }

    async fn list_by_user(&self, user_id: Uuid, page: Page) -> anyhow::Result<Vec<Article>> {
        // LIMIT NULL is LIMIT ALL in Postgres
        let rows = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, user_id, title, content, created_at, updated_at
            FROM articles
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await
        .context("list articles by user")?;
        Ok(rows)
    }
}

#[derive(Clone)]
pub struct PgPredictionRepo {
    db: PgPool,
}

impl PgPredictionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PredictionRepo for PgPredictionRepo {
    async fn create(&self, new: NewPrediction<'_>) -> anyhow::Result<PredictionRecord> {
        let row = sqlx::query_as::<_, PredictionRecord>(
            r#"
            INSERT INTO results (user_id, image_path, prediction, explanation)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, image_path, prediction, explanation, created_at, updated_at
            "#,
        )
        .bind(new.user_id)
        .bind(new.image_path)
        .bind(new.prediction)
        .bind(new.explanation)
        .fetch_one(&self.db)
        .await
        .context("insert result")?;
        Ok(row)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> anyhow::Result<Vec<PredictionRecord>> {
        let rows = sqlx::query_as::<_, PredictionRecord>(
            r#"
            SELECT id, user_id, image_path, prediction, explanation, created_at, updated_at
            FROM results
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await
        .context("list results by user")?;
        Ok(rows)
    }
}
