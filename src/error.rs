use thiserror::Error;

use crate::models::{ItemStatus, Stage};

/// 流水线错误类型
///
/// 所有错误都只作用于单个条目，不会导致进程退出。
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 阶段调用顺序错误：在任何外部调用之前拒绝，不改变状态
    #[error("[{stage}] 前置条件不满足 (条目: {item}): {reason}")]
    Precondition {
        stage: Stage,
        item: String,
        reason: String,
    },

    /// 外部生成器失败（非成功响应、空结果、格式错误）
    #[error("[{stage}] {provider} 调用失败: {detail}")]
    Generator {
        stage: Stage,
        provider: String,
        detail: String,
    },

    /// 生成成功后写入存储失败，产物未保存，需要重新执行阶段
    #[error("存储操作失败 ({operation}): {detail}")]
    Persistence { operation: String, detail: String },

    /// 条件写入失败：条目状态已被其他调用修改
    #[error("状态冲突 (条目: {item}): 期望 {expected}, 实际 {actual}")]
    Conflict {
        item: String,
        expected: ItemStatus,
        actual: ItemStatus,
    },

    #[error("{kind} 不存在: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("未知阶段: {0}")]
    UnknownStage(String),

    #[error(transparent)]
    Align(#[from] AlignError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 字幕对齐错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlignError {
    /// 去掉控制标记后没有可朗读的词
    #[error("去除控制标记后讲解文本为空")]
    EmptyNarration,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    #[error("缺少凭据: [{section}] {key}")]
    MissingCredential {
        section: &'static str,
        key: &'static str,
    },

    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("HTTP 客户端初始化失败: {0}")]
    HttpClient(#[source] reqwest::Error),
}

// ========== 便捷构造函数 ==========

impl PipelineError {
    pub fn precondition(stage: Stage, item: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Precondition {
            stage,
            item: item.into(),
            reason: reason.into(),
        }
    }

    pub fn generator(stage: Stage, provider: impl Into<String>, detail: impl ToString) -> Self {
        PipelineError::Generator {
            stage,
            provider: provider.into(),
            detail: detail.to_string(),
        }
    }

    pub fn persistence(operation: impl Into<String>, detail: impl ToString) -> Self {
        PipelineError::Persistence {
            operation: operation.into(),
            detail: detail.to_string(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        PipelineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, PipelineError::Precondition { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PipelineError::Conflict { .. })
    }
}

/// 流水线结果类型
pub type Result<T> = std::result::Result<T, PipelineError>;
