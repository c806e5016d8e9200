// Eleven Labs API Client
// Text-to-speech for voiceovers and the voice catalogue

use crate::error::VendorError;
use crate::vendor::{read_json, send_with_retry};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const VENDOR: &str = "elevenlabs";

#[derive(Clone)]
pub struct ElevenLabsClient {
    api_key: String,
    client: Client,
    base_url: String,
}

// ============================================================================
// API REQUEST/RESPONSE STRUCTURES
// ============================================================================

#[derive(Serialize, Debug)]
pub struct TextToSpeechRequest<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_settings: Option<VoiceSettings>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VoiceSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_boost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_speaker_boost: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct VoicesResponse {
    voices: Vec<Voice>,
}

// ============================================================================
// IMPLEMENTATION
// ============================================================================

impl ElevenLabsClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.elevenlabs.io/v1".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
            base_url,
        }
    }

    /// Generate speech from text using a specific voice; returns mp3 bytes
    pub async fn text_to_speech(
        &self,
        text: &str,
        voice_id: &str,
        model_id: Option<&str>,
        voice_settings: Option<VoiceSettings>,
    ) -> Result<Vec<u8>, VendorError> {
        let url = format!("{}/text-to-speech/{}", self.base_url, voice_id);

        let request_body = TextToSpeechRequest {
            text,
            model_id: Some(model_id.unwrap_or(ElevenLabsModels::MULTILINGUAL_V2)),
            voice_settings,
        };

        tracing::info!("🎙️ Generating voiceover ({} chars) with voice {}", text.len(), voice_id);

        let response = send_with_retry(VENDOR, || {
            self.client
                .post(&url)
                .header("xi-api-key", &self.api_key)
                .header("Accept", "audio/mpeg")
                .query(&[("output_format", "mp3_44100_128")])
                .json(&request_body)
        })
        .await?;

        let audio_bytes = response.bytes().await.map_err(|e| VendorError::http(VENDOR, e))?;
        if audio_bytes.is_empty() {
            return Err(VendorError::MissingField {
                vendor: VENDOR,
                field: "audio",
            });
        }
        Ok(audio_bytes.to_vec())
    }

    /// List all available voices
    pub async fn list_voices(&self) -> Result<Vec<Voice>, VendorError> {
        let url = format!("{}/voices", self.base_url);

        let response = send_with_retry(VENDOR, || {
            self.client.get(&url).header("xi-api-key", &self.api_key)
        })
        .await?;

        let voices_data: VoicesResponse = read_json(VENDOR, response).await?;
        Ok(voices_data.voices)
    }
}

// ============================================================================
// WELL-KNOWN VOICE IDS (Default Voices)
// ============================================================================

pub struct DefaultVoices;

impl DefaultVoices {
    pub const RACHEL: &'static str = "21m00Tcm4TlvDq8ikWAM"; // Young female, calm
    pub const BELLA: &'static str = "EXAVITQu4vr4xnSDxMaL"; // Female, soft
    pub const MATILDA: &'static str = "XrExE9yKIg1WjnnlVkGX"; // Female, warm
    pub const DREW: &'static str = "29vD33N1CtxCmqQRPOHJ"; // Male, middle-aged
    pub const ADAM: &'static str = "pNInz6obpgDQGcFmaJgB"; // Male, deep
    pub const LIAM: &'static str = "TX3LPaxmHKxFdv7VOQHJ"; // Male, articulate

    pub const ALL: [(&'static str, &'static str); 6] = [
        ("rachel", Self::RACHEL),
        ("bella", Self::BELLA),
        ("matilda", Self::MATILDA),
        ("drew", Self::DREW),
        ("adam", Self::ADAM),
        ("liam", Self::LIAM),
    ];

    pub fn get_voice_id_by_name(name: &str) -> Option<&'static str> {
        let name = name.trim().to_lowercase();
        Self::ALL.iter().find(|(n, _)| *n == name).map(|(_, id)| *id)
    }

    /// Accepts a known voice name or a raw voice id; falls back to the default voice
    pub fn resolve(voice: Option<&str>) -> String {
        match voice.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Self::get_voice_id_by_name(v)
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string()),
            None => Self::get_default_voice().to_string(),
        }
    }

    pub fn get_default_voice() -> &'static str {
        Self::RACHEL
    }
}

// ============================================================================
// MODELS
// ============================================================================

pub struct ElevenLabsModels;

impl ElevenLabsModels {
    pub const FLASH_V2_5: &'static str = "eleven_flash_v2_5"; // 75ms latency
    pub const MULTILINGUAL_V2: &'static str = "eleven_multilingual_v2"; // Highest quality
}
