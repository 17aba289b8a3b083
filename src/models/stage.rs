//! 流水线阶段
//!
//! 四个阶段严格有序：script → audio → captions → video。
//! 每个阶段的前置条件只看条目上已经落库的产物。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::content_item::{ContentItem, ItemStatus};

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 生成讲解脚本
    Script,
    /// 合成配音
    Audio,
    /// 生成字幕时间轴
    Captions,
    /// 渲染视频
    Video,
}

impl Stage {
    /// 全部阶段（按执行顺序）
    pub const ALL: [Stage; 4] = [Stage::Script, Stage::Audio, Stage::Captions, Stage::Video];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Script => "script",
            Stage::Audio => "audio",
            Stage::Captions => "captions",
            Stage::Video => "video",
        }
    }

    /// 满足本阶段前置条件的条目可能处于的状态
    ///
    /// 用于在存储层预筛选候选条目，最终仍以 [`Stage::is_ready`] 为准。
    pub fn ready_statuses(self) -> &'static [ItemStatus] {
        match self {
            Stage::Script => &[ItemStatus::Created],
            Stage::Audio => &[ItemStatus::ScriptReady],
            Stage::Captions => &[ItemStatus::AudioReady],
            Stage::Video => &[ItemStatus::CaptionsReady, ItemStatus::RenderPending],
        }
    }

    /// 本阶段成功后条目的状态
    ///
    /// video 阶段还可能落到 `render_pending`，由状态机根据渲染结果决定。
    pub fn completed_status(self) -> ItemStatus {
        match self {
            Stage::Script => ItemStatus::ScriptReady,
            Stage::Audio => ItemStatus::AudioReady,
            Stage::Captions => ItemStatus::CaptionsReady,
            Stage::Video => ItemStatus::VideoReady,
        }
    }

    /// 检查条目是否满足本阶段的前置条件
    ///
    /// 返回不满足的原因；满足时返回 `None`。
    pub fn unmet_precondition(self, item: &ContentItem) -> Option<&'static str> {
        match self {
            Stage::Script => item.script.as_ref().map(|_| "脚本已存在"),
            Stage::Audio => {
                if item.script.is_none() {
                    Some("缺少脚本")
                } else if item.audio_ref.is_some() {
                    Some("音频已存在")
                } else {
                    None
                }
            }
            Stage::Captions => {
                if item.audio_ref.is_none() {
                    Some("缺少音频")
                } else if item.captions.is_none() {
                    None
                } else {
                    Some("字幕已存在")
                }
            }
            Stage::Video => {
                if item.captions.is_none() {
                    Some("缺少字幕")
                } else if item.status == ItemStatus::VideoReady {
                    Some("视频已渲染完成")
                } else {
                    None
                }
            }
        }
    }

    pub fn is_ready(self, item: &ContentItem) -> bool {
        self.unmet_precondition(item).is_none()
    }

    /// 前置条件检查，不满足时返回 [`PipelineError::Precondition`]
    pub fn check(self, item: &ContentItem) -> Result<(), PipelineError> {
        match self.unmet_precondition(item) {
            Some(reason) => Err(PipelineError::precondition(self, item.id.to_string(), reason)),
            None => Ok(()),
        }
    }

    /// 下一个阶段
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Script => Some(Stage::Audio),
            Stage::Audio => Some(Stage::Captions),
            Stage::Captions => Some(Stage::Video),
            Stage::Video => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "script" => Ok(Stage::Script),
            "audio" => Ok(Stage::Audio),
            "captions" => Ok(Stage::Captions),
            "video" => Ok(Stage::Video),
            other => Err(PipelineError::UnknownStage(other.to_string())),
        }
    }
}
