// src/pexels_client.rs
use crate::error::VendorError;
use crate::models::media::{StockAsset, StockKind, StockSource};
use crate::vendor::{read_json, send_with_retry};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

const VENDOR: &str = "pexels";

#[derive(Debug, Clone)]
pub struct PexelsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PexelsVideoResponse {
    pub page: i32,
    pub per_page: i32,
    pub total_results: i32,
    pub videos: Vec<PexelsVideo>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PexelsVideo {
    pub id: i64,
    pub width: i32,
    pub height: i32,
    pub duration: i32,
    #[serde(default)]
    pub image: Option<String>,
    pub user: PexelsUser,
    pub video_files: Vec<PexelsVideoFile>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PexelsVideoFile {
    pub id: i64,
    pub quality: Option<String>,
    pub file_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub link: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PexelsUser {
    pub id: i64,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PexelsPhotoResponse {
    pub page: i32,
    pub per_page: i32,
    pub total_results: i32,
    pub photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PexelsPhoto {
    pub id: i64,
    pub width: i32,
    pub height: i32,
    pub url: String,
    pub photographer: String,
    pub src: PexelsPhotoSrc,
    #[serde(default)]
    pub alt: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PexelsPhotoSrc {
    pub original: String,
    pub large: String,
    pub medium: String,
    pub tiny: String,
}

impl PexelsClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.pexels.com".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    /// Search for videos on Pexels
    pub async fn search_videos(&self, query: &str, per_page: u32) -> Result<Vec<StockAsset>, VendorError> {
        info!("🎬 Searching Pexels for videos: '{}' with {} results per page", query, per_page);

        let url = format!("{}/videos/search", self.base_url);
        let per_page = per_page.to_string();
        let response = send_with_retry(VENDOR, || {
            self.client
                .get(&url)
                .header("Authorization", &self.api_key)
                .query(&[("query", query), ("per_page", per_page.as_str())])
        })
        .await?;

        let videos: PexelsVideoResponse = read_json(VENDOR, response).await?;
        info!("✅ Found {} videos for query: '{}'", videos.videos.len(), query);

        Ok(videos.videos.into_iter().filter_map(video_to_asset).collect())
    }

    /// Search for photos on Pexels
    pub async fn search_photos(&self, query: &str, per_page: u32) -> Result<Vec<StockAsset>, VendorError> {
        info!("📸 Searching Pexels for photos: '{}' with {} results per page", query, per_page);

        let url = format!("{}/v1/search", self.base_url);
        let per_page = per_page.to_string();
        let response = send_with_retry(VENDOR, || {
            self.client
                .get(&url)
                .header("Authorization", &self.api_key)
                .query(&[("query", query), ("per_page", per_page.as_str())])
        })
        .await?;

        let photos: PexelsPhotoResponse = read_json(VENDOR, response).await?;
        info!("✅ Found {} photos for query: '{}'", photos.photos.len(), query);

        Ok(photos.photos.into_iter().map(photo_to_asset).collect())
    }
}

/// Pick the widest mp4 rendition no larger than 1080p
fn best_video_file(files: &[PexelsVideoFile]) -> Option<&PexelsVideoFile> {
    let mp4 = files.iter().filter(|f| f.file_type == "video/mp4");
    mp4.clone()
        .filter(|f| f.height.unwrap_or(0) <= 1080 && f.width.unwrap_or(0) <= 1920)
        .max_by_key(|f| f.width.unwrap_or(0))
        .or_else(|| mp4.min_by_key(|f| f.width.unwrap_or(i32::MAX)))
}

fn video_to_asset(video: PexelsVideo) -> Option<StockAsset> {
    let file = best_video_file(&video.video_files)?;
    Some(StockAsset {
        source: StockSource::Pexels,
        kind: StockKind::Video,
        id: video.id.to_string(),
        url: file.link.clone(),
        preview_url: video.image.clone(),
        width: file.width.or(Some(video.width)),
        height: file.height.or(Some(video.height)),
        duration_seconds: Some(video.duration),
        attribution: Some(format!("{} on Pexels", video.user.name)),
    })
}

fn photo_to_asset(photo: PexelsPhoto) -> StockAsset {
    StockAsset {
        source: StockSource::Pexels,
        kind: StockKind::Photo,
        id: photo.id.to_string(),
        url: photo.src.large,
        preview_url: Some(photo.src.tiny),
        width: Some(photo.width),
        height: Some(photo.height),
        duration_seconds: None,
        attribution: Some(format!("{} on Pexels", photo.photographer)),
    }
}
