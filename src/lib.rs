//! # Narration Pipeline
//!
//! 把一道题目加工成讲解视频的流水线：脚本 → 配音 → 字幕 → 视频
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 条目状态的唯一可信来源
//! - `ContentStore` - 读写条目、条件写入、上传文件
//! - `SupabaseStore` / `MemoryStore` - 两种实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `ScriptGenerator` - LLM 写讲解脚本
//! - `SpeechSynthesizer` - 文本转语音
//! - `caption_aligner` - 按固定语速生成字幕时间轴
//! - `VideoRenderer` - 提交渲染，后端不可用时给出占位地址
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个条目"的阶段流转
//! - `PipelineFlow` - 前置条件检查 → 外部调用 → 条件写入
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/work_queue` - 按阶段找出待处理条目
//! - `orchestrator/batch_processor` - 并发批处理和统计

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{PipelineError, Result};
pub use infrastructure::{ContentStore, MemoryStore, SupabaseStore};
pub use models::{CaptionSegment, ContentItem, ItemStatus, Stage};
pub use orchestrator::{App, BatchStats, WorkQueue};
pub use utils::logging;
pub use workflow::{PipelineFlow, StageReport};
