use std::{sync::Arc, time::Duration};

use anyhow::Context;

use crate::{
    auth::repo::{PgUserRepo, UserRepo},
    classifier::{Classifier, HttpClassifier},
    config::{AppConfig, StorageConfig},
    dashboard::repo::{ArticleRepo, PgArticleRepo, PgPredictionRepo, PredictionRepo},
    db,
    storage::{LocalStorage, S3Storage, StorageClient},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub articles: Arc<dyn ArticleRepo>,
    pub predictions: Arc<dyn PredictionRepo>,
    pub storage: Arc<dyn StorageClient>,
    pub classifier: Arc<dyn Classifier>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await?;

        let storage: Arc<dyn StorageClient> = match &config.storage {
            StorageConfig::Local { upload_dir } => {
                tokio::fs::create_dir_all(upload_dir)
                    .await
                    .with_context(|| format!("create upload dir {}", upload_dir.display()))?;
                Arc::new(LocalStorage::new(upload_dir.clone(), &config.public_base_url))
            }
            StorageConfig::S3 {
                endpoint,
                bucket,
                access_key,
                secret_key,
                region,
                presign_ttl_secs,
            } => Arc::new(
                S3Storage::new(
                    endpoint,
                    bucket,
                    access_key,
                    secret_key,
                    region,
                    *presign_ttl_secs,
                )
                .await?,
            ),
        };

        let classifier = Arc::new(HttpClassifier::new(
            &config.classifier.base_url,
            Duration::from_secs(config.classifier.timeout_secs),
        )?);

        Ok(Self {
            users: Arc::new(PgUserRepo::new(pool.clone())),
            articles: Arc::new(PgArticleRepo::new(pool.clone())),
            predictions: Arc::new(PgPredictionRepo::new(pool)),
            storage,
            classifier,
            config,
        })
    }
}
