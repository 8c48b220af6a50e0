use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::repo_types::{Article, Page, PredictionRecord};

const MAX_PAGE_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct InsertArticleRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub greeting: String,
    pub articles: Vec<Article>,
    pub results: Vec<PredictionRecord>,
}

#[derive(Debug, Serialize)]
pub struct ArticleCreated {
    pub message: String,
    pub article: Article,
}

#[derive(Debug, Serialize)]
pub struct ArticleList {
    pub user: String,
    pub articles: Vec<Article>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub message: String,
    pub prediction: String,
    pub explanation: String,
    pub confidence_scores: BTreeMap<String, f64>,
    pub photo_url: String,
    pub result: PredictionRecord,
}

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    #[serde(flatten)]
    pub record: PredictionRecord,
    pub photo_url: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryItem>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { 50 }

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn page(&self) -> Page {
        Page {
            limit: Some(self.limit.clamp(1, MAX_PAGE_LIMIT)),
            offset: self.offset.max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let p = Pagination { limit: 10_000, offset: -5 }.page();
        assert_eq!(p, Page { limit: Some(200), offset: 0 });

        let p = Pagination { limit: 0, offset: 3 }.page();
        assert_eq!(p, Page { limit: Some(1), offset: 3 });

        assert_eq!(Pagination::default().page().limit, Some(50));
    }
}
