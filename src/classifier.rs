use std::{collections::BTreeMap, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An uploaded image on its way to the classifier.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// What the classification service answers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub prediction: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub confidence_scores: BTreeMap<String, f64>,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &ImageUpload) -> anyhow::Result<Classification>;
}

/// Talks to the external service: `POST {base}/predict` with a multipart
/// `image` field.
#[derive(Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build classifier http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/predict", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, image: &ImageUpload) -> anyhow::Result<Classification> {
        let part = reqwest::multipart::Part::bytes(image.body.to_vec())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .context("invalid image content type")?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            anyhow::bail!("classifier returned {status}: {snippet}");
        }

        let out: Classification = resp.json().await.context("decode classifier response")?;
        anyhow::ensure!(
            !out.prediction.trim().is_empty(),
            "classifier returned an empty label"
        );
        debug!(prediction = %out.prediction, "classifier answered");
        Ok(out)
    }
}
