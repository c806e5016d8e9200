// OpenAI API client
// Chat completions for scripts, captions and replies; image generation

use crate::error::VendorError;
use crate::models::brief::BrandBrief;
use crate::models::content::{MediaStatus, Scene};
use crate::models::listening::ListeningHit;
use crate::vendor::{read_json, send_with_retry};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;

const VENDOR: &str = "openai";

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

// ============================================================================
// API REQUEST/RESPONSE STRUCTURES
// ============================================================================

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    url: Option<String>,
}

/// Script returned by the model, already normalised
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptDraft {
    pub title: String,
    pub body: String,
    pub hashtags: Vec<String>,
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionDraft {
    pub caption: String,
    pub hashtags: Vec<String>,
}

// Loose shapes the model is asked to produce
#[derive(Deserialize, Default)]
struct RawScript {
    #[serde(default)]
    title: String,
    #[serde(default, alias = "script")]
    body: String,
    #[serde(default)]
    hashtags: Vec<String>,
    #[serde(default)]
    scenes: Vec<RawScene>,
}

#[derive(Deserialize)]
struct RawScene {
    #[serde(default, alias = "visual")]
    description: String,
    #[serde(default, alias = "voiceover")]
    narration: String,
}

#[derive(Deserialize)]
struct RawCaption {
    #[serde(default)]
    caption: String,
    #[serde(default)]
    hashtags: Vec<String>,
}

// ============================================================================
// IMPLEMENTATION
// ============================================================================

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1".to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    /// Single-turn chat completion; `json_mode` asks for a JSON object reply
    pub async fn chat(&self, system: &str, user: &str, json_mode: bool) -> Result<String, VendorError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: 0.7,
            response_format: json_mode.then(|| json!({ "type": "json_object" })),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = send_with_retry(VENDOR, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
        })
        .await?;

        let chat: ChatResponse = read_json(VENDOR, response).await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(VendorError::MissingField {
                vendor: VENDOR,
                field: "choices[0].message.content",
            })
    }

    /// Write a short-form video script split into scenes
    pub async fn generate_script(
        &self,
        brief: Option<&BrandBrief>,
        platform: &str,
        topic: &str,
        scene_count: usize,
    ) -> Result<ScriptDraft, VendorError> {
        let system = format!(
            "You are a social media scriptwriter.\n{}\
             Reply with a JSON object: {{\"title\": string, \"body\": string, \"hashtags\": [string], \
             \"scenes\": [{{\"description\": string, \"narration\": string}}]}}. \
             Write exactly {} scenes. Each description is a visual prompt for a video generator.",
            brief_context(brief),
            scene_count
        );
        let user = format!("Platform: {}\nTopic: {}", platform, topic);

        tracing::info!("✍️ Generating {}-scene script for {}", scene_count, platform);
        let text = self.chat(&system, &user, true).await?;
        parse_script_draft(&text, scene_count)
    }

    /// Write a caption with hashtags
    pub async fn generate_caption(
        &self,
        brief: Option<&BrandBrief>,
        platform: &str,
        topic: &str,
    ) -> Result<CaptionDraft, VendorError> {
        let system = format!(
            "You write social media captions.\n{}\
             Reply with a JSON object: {{\"caption\": string, \"hashtags\": [string]}}.",
            brief_context(brief)
        );
        let user = format!("Platform: {}\nTopic: {}", platform, topic);

        let text = self.chat(&system, &user, true).await?;
        parse_caption_draft(&text)
    }

    /// Draft a reply to a social listening hit in the brand's voice
    pub async fn draft_reply(&self, brief: Option<&BrandBrief>, hit: &ListeningHit) -> Result<String, VendorError> {
        let system = format!(
            "You reply to social media posts on behalf of a brand. Keep it under 280 characters, \
             friendly and on-brand. Reply with the reply text only.\n{}",
            brief_context(brief)
        );
        let user = format!(
            "Platform: {}\nAuthor: {}\nPost: {}",
            hit.platform, hit.author, hit.text
        );

        let text = self.chat(&system, &user, false).await?;
        Ok(text.trim().trim_matches('"').to_string())
    }

    /// Generate an image and return its hosted URL
    pub async fn generate_image(&self, prompt: &str, size: &str) -> Result<String, VendorError> {
        let body = json!({
            "model": "dall-e-3",
            "prompt": prompt,
            "size": size,
            "n": 1,
        });

        let url = format!("{}/images/generations", self.base_url);
        let response = send_with_retry(VENDOR, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        let images: ImageResponse = read_json(VENDOR, response).await?;
        images
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or(VendorError::MissingField {
                vendor: VENDOR,
                field: "data[0].url",
            })
    }
}

fn brief_context(brief: Option<&BrandBrief>) -> String {
    match brief {
        Some(brief) => format!("Write for this brand:\n{}", brief.as_prompt_context()),
        None => String::new(),
    }
}

fn hashtag_regex() -> &'static Regex {
    static HASHTAG: OnceLock<Regex> = OnceLock::new();
    HASHTAG.get_or_init(|| Regex::new(r"#(\w+)").expect("valid hashtag regex"))
}

/// Normalise tags to `#tag`, dropping blanks and case-insensitive duplicates
pub fn normalize_hashtags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.as_ref().trim().trim_start_matches('#').replace(' ', ""))
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(|t| format!("#{}", t))
        .collect()
}

/// Hashtags written inline in free text
pub fn extract_hashtags(text: &str) -> Vec<String> {
    normalize_hashtags(hashtag_regex().captures_iter(text).map(|c| c[1].to_string()))
}

pub fn parse_script_draft(text: &str, scene_count: usize) -> Result<ScriptDraft, VendorError> {
    let raw: RawScript = serde_json::from_str(text).map_err(|e| VendorError::decode(VENDOR, e))?;

    if raw.body.trim().is_empty() && raw.scenes.is_empty() {
        return Err(VendorError::MissingField {
            vendor: VENDOR,
            field: "body",
        });
    }

    let body = if raw.body.trim().is_empty() {
        raw.scenes
            .iter()
            .map(|s| s.narration.trim())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        raw.body.trim().to_string()
    };

    let hashtags = if raw.hashtags.is_empty() {
        extract_hashtags(&body)
    } else {
        normalize_hashtags(&raw.hashtags)
    };

    let scenes = raw
        .scenes
        .into_iter()
        .filter(|s| !s.description.trim().is_empty())
        .take(scene_count)
        .enumerate()
        .map(|(index, s)| Scene {
            index,
            description: s.description.trim().to_string(),
            narration: s.narration.trim().to_string(),
            video_url: None,
            status: MediaStatus::None,
            error: None,
        })
        .collect();

    Ok(ScriptDraft {
        title: raw.title.trim().to_string(),
        body,
        hashtags,
        scenes,
    })
}

pub fn parse_caption_draft(text: &str) -> Result<CaptionDraft, VendorError> {
    let raw: RawCaption = serde_json::from_str(text).map_err(|e| VendorError::decode(VENDOR, e))?;
    let caption = raw.caption.trim().to_string();
    if caption.is_empty() {
        return Err(VendorError::MissingField {
            vendor: VENDOR,
            field: "caption",
        });
    }

    let hashtags = if raw.hashtags.is_empty() {
        extract_hashtags(&caption)
    } else {
        normalize_hashtags(&raw.hashtags)
    };

    Ok(CaptionDraft { caption, hashtags })
}
