//! 语音合成 - 业务能力层
//!
//! 只负责"文本 → 音频字节"，上传和落库由流程层处理。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{ConfigError, PipelineError, Result};
use crate::models::Stage;

pub const DEFAULT_SPEECH_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_SPEECH_MODEL: &str = "eleven_monolingual_v1";

const PROVIDER: &str = "ElevenLabs";

/// 语音合成能力
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// 合成音频（mp3 字节）；空音频视为失败
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// ElevenLabs 文本转语音客户端
pub struct ElevenLabsSynthesizer {
    client: Client,
    api_key: String,
    voice_id: String,
    model_id: String,
    base_url: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> std::result::Result<Self, ConfigError> {
        let api_key = config.require_api_key("speech")?.to_string();
        if config.voice_id.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                section: "speech",
                key: "voice_id",
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            client,
            api_key,
            voice_id: config.voice_id.clone(),
            model_id: non_empty_or(&config.model_id, DEFAULT_SPEECH_MODEL),
            base_url: non_empty_or(&config.base_url, DEFAULT_SPEECH_BASE_URL),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.base_url.trim_end_matches('/'),
            self.voice_id
        )
    }

    fn request_body(&self, text: &str) -> JsonValue {
        json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75,
                "style": 0.0,
                "use_speaker_boost": true
            }
        })
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// 从错误响应中提取服务端给出的说明
fn error_detail(body: &str) -> String {
    let parsed: Option<JsonValue> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/detail/message")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("detail"))
        })
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "API error".to_string()
            } else {
                body.trim().to_string()
            }
        })
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        debug!("调用语音合成，音色: {}，文本长度: {}", self.voice_id, text.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| PipelineError::generator(Stage::Audio, PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body);
            warn!("语音合成失败 ({}): {}", status, detail);
            return Err(PipelineError::generator(
                Stage::Audio,
                PROVIDER,
                format!("HTTP {}: {}", status, detail),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::generator(Stage::Audio, PROVIDER, e))?;

        if bytes.is_empty() {
            return Err(PipelineError::generator(Stage::Audio, PROVIDER, "合成的音频为空"));
        }

        debug!("语音合成成功: {} 字节", bytes.len());
        Ok(bytes.to_vec())
    }
}
