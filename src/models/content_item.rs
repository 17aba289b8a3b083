use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::caption::CaptionSegment;

/// 条目状态
///
/// 序列化为数据库中 `status` 列的取值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Created,
    ScriptReady,
    AudioReady,
    CaptionsReady,
    VideoReady,
    /// 只拿到了占位视频地址，渲染未确认
    RenderPending,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Created => "created",
            ItemStatus::ScriptReady => "script_ready",
            ItemStatus::AudioReady => "audio_ready",
            ItemStatus::CaptionsReady => "captions_ready",
            ItemStatus::VideoReady => "video_ready",
            ItemStatus::RenderPending => "render_pending",
        }
    }

    /// 进度序号，状态只能向前（或原地）迁移
    pub fn progress(self) -> u8 {
        match self {
            ItemStatus::Created => 0,
            ItemStatus::ScriptReady => 1,
            ItemStatus::AudioReady => 2,
            ItemStatus::CaptionsReady => 3,
            ItemStatus::RenderPending => 4,
            ItemStatus::VideoReady => 5,
        }
    }

    pub fn can_advance_to(self, next: ItemStatus) -> bool {
        next.progress() >= self.progress()
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条讲解视频的生产记录
///
/// 字段名与 `videos` 表的列名保持一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    #[serde(rename = "question_id", deserialize_with = "deserialize_question_id")]
    pub source_question_id: String,
    #[serde(default)]
    pub course_id: Option<i64>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(rename = "audio_url", default)]
    pub audio_ref: Option<String>,
    #[serde(rename = "captions_data", default)]
    pub captions: Option<Vec<CaptionSegment>>,
    #[serde(rename = "video_url", default)]
    pub video_ref: Option<String>,
    pub status: ItemStatus,
    #[serde(default)]
    pub template_id: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// 创建一个尚未生成任何产物的条目
    pub fn new(source_question_id: impl Into<String>, course_id: Option<i64>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source_question_id: source_question_id.into(),
            course_id,
            script: None,
            audio_ref: None,
            captions: None,
            video_ref: None,
            status: ItemStatus::Created,
            template_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 字段与状态是否一致：第 N 阶段的字段有值，当且仅当状态已到达第 N 阶段
    pub fn is_consistent(&self) -> bool {
        let progress = self.status.progress();
        self.script.is_some() == (progress >= 1)
            && self.template_id.is_some() == (progress >= 1)
            && self.audio_ref.is_some() == (progress >= 2)
            && self.captions.is_some() == (progress >= 3)
            && self.video_ref.is_some() == (progress >= 4)
    }

    /// 应用一次阶段写入
    ///
    /// 只覆盖 patch 中带值的字段。
    pub fn apply(&mut self, patch: &ItemPatch) {
        if let Some(script) = &patch.script {
            self.script = Some(script.clone());
        }
        if let Some(template_id) = patch.template_id {
            self.template_id = Some(template_id);
        }
        if let Some(audio_ref) = &patch.audio_ref {
            self.audio_ref = Some(audio_ref.clone());
        }
        if let Some(captions) = &patch.captions {
            self.captions = Some(captions.clone());
        }
        if let Some(video_ref) = &patch.video_ref {
            self.video_ref = Some(video_ref.clone());
        }
        self.status = patch.status;
        self.updated_at = patch.updated_at;
    }
}

/// 单个阶段的写入内容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<u8>,
    #[serde(rename = "audio_url", skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,
    #[serde(rename = "captions_data", skip_serializing_if = "Option::is_none")]
    pub captions: Option<Vec<CaptionSegment>>,
    #[serde(rename = "video_url", skip_serializing_if = "Option::is_none")]
    pub video_ref: Option<String>,
    pub status: ItemStatus,
    pub updated_at: DateTime<Utc>,
}

impl ItemPatch {
    pub fn new(status: ItemStatus) -> Self {
        Self {
            script: None,
            template_id: None,
            audio_ref: None,
            captions: None,
            video_ref: None,
            status,
            updated_at: Utc::now(),
        }
    }

    pub fn script(mut self, script: impl Into<String>, template_id: u8) -> Self {
        self.script = Some(script.into());
        self.template_id = Some(template_id);
        self
    }

    pub fn audio(mut self, audio_ref: impl Into<String>) -> Self {
        self.audio_ref = Some(audio_ref.into());
        self
    }

    pub fn captions(mut self, captions: Vec<CaptionSegment>) -> Self {
        self.captions = Some(captions);
        self
    }

    pub fn video(mut self, video_ref: impl Into<String>) -> Self {
        self.video_ref = Some(video_ref.into());
        self
    }
}

/// 题目 ID 在库里可能是自增整数，也可能是 UUID 字符串
pub(crate) fn deserialize_question_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;

    struct QuestionIdVisitor;

    impl<'de> Visitor<'de> for QuestionIdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer question id")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(QuestionIdVisitor)
}
