// src/getty_client.rs
// Getty Images creative image search

use crate::error::VendorError;
use crate::models::media::{StockAsset, StockKind, StockSource};
use crate::vendor::{read_json, send_with_retry};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

const VENDOR: &str = "getty";

#[derive(Debug, Clone)]
pub struct GettyClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GettySearchResponse {
    #[serde(default)]
    images: Vec<GettyImage>,
}

#[derive(Debug, Deserialize)]
struct GettyImage {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    display_sizes: Vec<GettyDisplaySize>,
}

#[derive(Debug, Deserialize)]
struct GettyDisplaySize {
    name: String,
    uri: String,
    #[serde(default)]
    width: Option<i32>,
    #[serde(default)]
    height: Option<i32>,
}

/// Getty orders sizes from small to large; `width` is only sometimes present
fn size_rank(size: &GettyDisplaySize) -> i32 {
    if let Some(width) = size.width {
        return width;
    }
    match size.name.as_str() {
        "thumb" => 1,
        "preview" => 2,
        "comp" => 3,
        "high_res_comp" => 4,
        _ => 0,
    }
}

impl GettyClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.gettyimages.com".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    pub async fn search_images(&self, phrase: &str, page_size: u32) -> Result<Vec<StockAsset>, VendorError> {
        info!("🖼️ Searching Getty for images: '{}'", phrase);

        let url = format!("{}/v3/search/images/creative", self.base_url);
        let page_size = page_size.to_string();
        let response = send_with_retry(VENDOR, || {
            self.client
                .get(&url)
                .header("Api-Key", &self.api_key)
                .query(&[
                    ("phrase", phrase),
                    ("page_size", page_size.as_str()),
                    ("fields", "id,title,artist,display_set"),
                ])
        })
        .await?;

        let results: GettySearchResponse = read_json(VENDOR, response).await?;
        info!("✅ Found {} Getty images for '{}'", results.images.len(), phrase);

        Ok(results.images.into_iter().filter_map(image_to_asset).collect())
    }
}

fn image_to_asset(image: GettyImage) -> Option<StockAsset> {
    let largest = image.display_sizes.iter().max_by_key(|s| size_rank(s))?;
    let preview = image
        .display_sizes
        .iter()
        .find(|s| s.name == "thumb")
        .map(|s| s.uri.clone());

    Some(StockAsset {
        source: StockSource::Getty,
        kind: StockKind::Photo,
        id: image.id.clone(),
        url: largest.uri.clone(),
        preview_url: preview,
        width: largest.width,
        height: largest.height,
        duration_seconds: None,
        attribution: image.artist.clone().or(image.title.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_largest_display_size_wins() {
        let image: GettyImage = serde_json::from_str(
            r#"{
                "id": "123",
                "artist": "Jane Doe",
                "display_sizes": [
                    {"name": "thumb", "uri": "https://getty/thumb.jpg"},
                    {"name": "comp", "uri": "https://getty/comp.jpg"},
                    {"name": "preview", "uri": "https://getty/preview.jpg"}
                ]
            }"#,
        )
        .unwrap();

        let asset = image_to_asset(image).unwrap();
        assert_eq!(asset.url, "https://getty/comp.jpg");
        assert_eq!(asset.preview_url.as_deref(), Some("https://getty/thumb.jpg"));
        assert_eq!(asset.attribution.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_image_without_sizes_is_skipped() {
        let image: GettyImage = serde_json::from_str(r#"{"id": "1"}"#).unwrap();
        assert!(image_to_asset(image).is_none());
    }
}
