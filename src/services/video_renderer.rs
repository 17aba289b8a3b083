//! 视频渲染 - 业务能力层
//!
//! 把音频、字幕、题目信息和模板交给渲染后端。
//! 后端未配置或不可用时返回占位地址，并标记渲染引擎未被调用。

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ConfigError, PipelineError, Result};
use crate::models::{CaptionSegment, QuestionDisplay, Stage, Template};

/// 渲染请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSpec {
    pub video_id: Uuid,
    pub template_id: u8,
    pub template: Option<Template>,
    pub audio_url: String,
    pub captions: Vec<CaptionSegment>,
    pub question_data: QuestionDisplay,
}

/// 渲染结果
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub video_uri: String,
    /// 是否真正调用了渲染引擎；为 false 时 `video_uri` 只是占位地址
    pub engine_invoked: bool,
    pub message: String,
}

impl RenderOutcome {
    pub fn rendered(video_uri: impl Into<String>) -> Self {
        Self {
            video_uri: video_uri.into(),
            engine_invoked: true,
            message: "视频已由渲染后端生成".to_string(),
        }
    }

    pub fn placeholder(video_uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            video_uri: video_uri.into(),
            engine_invoked: false,
            message: message.into(),
        }
    }
}

/// 视频渲染能力
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    async fn render(&self, spec: &RenderSpec) -> Result<RenderOutcome>;

    /// 渲染不可用时记录的占位地址
    fn placeholder_uri(&self, spec: &RenderSpec) -> String;
}

#[derive(Deserialize)]
struct RenderResponse {
    video_url: Option<String>,
}

/// HTTP 渲染后端客户端
pub struct HttpVideoRenderer {
    client: Client,
    backend_url: Option<String>,
    storage_base: String,
}

impl HttpVideoRenderer {
    /// `timeout` 只是传输层兜底，状态机另有渲染硬超时
    pub fn new(
        backend_url: Option<String>,
        storage_base: impl Into<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            client,
            backend_url: backend_url.filter(|url| !url.trim().is_empty()),
            storage_base: storage_base.into(),
        })
    }

    async fn call_backend(
        &self,
        backend_url: &str,
        spec: &RenderSpec,
    ) -> std::result::Result<String, String> {
        let response = self
            .client
            .post(format!("{}/render", backend_url.trim_end_matches('/')))
            .json(spec)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, body));
        }

        let parsed: RenderResponse = response.json().await.map_err(|e| e.to_string())?;
        parsed
            .video_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| "渲染后端未返回 video_url".to_string())
    }
}

#[async_trait]
impl VideoRenderer for HttpVideoRenderer {
    async fn render(&self, spec: &RenderSpec) -> Result<RenderOutcome> {
        if spec.captions.is_empty() {
            return Err(PipelineError::generator(Stage::Video, "renderer", "字幕为空，无法渲染"));
        }

        let Some(backend_url) = self.backend_url.as_deref() else {
            return Ok(RenderOutcome::placeholder(
                self.placeholder_uri(spec),
                "未配置渲染后端，已生成占位地址，视频需要手动渲染",
            ));
        };

        info!("🎬 提交渲染任务: 条目 {} 模板 {}", spec.video_id, spec.template_id);
        match self.call_backend(backend_url, spec).await {
            Ok(video_url) => Ok(RenderOutcome::rendered(video_url)),
            Err(e) => {
                warn!("渲染后端不可用: {}", e);
                Ok(RenderOutcome::placeholder(
                    self.placeholder_uri(spec),
                    format!("渲染后端不可用 ({e})，已生成占位地址，视频需要手动渲染"),
                ))
            }
        }
    }

    fn placeholder_uri(&self, spec: &RenderSpec) -> String {
        format!(
            "{}/storage/v1/object/public/video-renders/video_{}_template_{}.mp4",
            self.storage_base.trim_end_matches('/'),
            spec.video_id,
            spec.template_id
        )
    }
}
