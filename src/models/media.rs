use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StockSource {
    #[default]
    Pexels,
    Getty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StockKind {
    #[default]
    Photo,
    Video,
}

/// A stock photo or clip from any provider, in one shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAsset {
    pub source: StockSource,
    pub kind: StockKind,
    pub id: String,
    pub url: String,
    pub preview_url: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub attribution: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaSearchQuery {
    pub query: String,
    #[serde(default)]
    pub source: StockSource,
    #[serde(default)]
    pub kind: StockKind,
    pub per_page: Option<u32>,
}
