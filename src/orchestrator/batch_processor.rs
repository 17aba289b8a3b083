//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责组装能力和批量调度。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：按配置创建存储和三个外部客户端
//! 2. **取候选**：从待处理队列取出某阶段的候选条目（每次最多 10 个）；
//!    script 阶段取的是待写脚本的题目
//! 3. **并发控制**：使用 Semaphore 限制同时处理的条目数
//! 4. **全局统计**：汇总成功、待确认、失败数量
//!
//! 同一条目上的阶段始终串行；不同条目之间并发。

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::infrastructure::{ContentStore, SupabaseStore};
use crate::models::{ContentItem, Stage};
use crate::orchestrator::work_queue::WorkQueue;
use crate::services::{ElevenLabsSynthesizer, HttpVideoRenderer, LlmScriptGenerator};
use crate::utils::logging;
use crate::workflow::{ItemCtx, PipelineFlow, StageReport};

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<PipelineFlow>,
    queue: WorkQueue,
}

/// 批处理的单个目标
enum Target {
    /// 已有条目
    Item(ContentItem),
    /// script 阶段按题目处理
    Question(String),
}

/// 批处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub success: usize,
    /// 成功但结果未确认（render_pending）
    pub provisional: usize,
    pub failed: usize,
}

impl App {
    /// 按配置初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(config.max_concurrent_items);

        let store: Arc<dyn ContentStore> = Arc::new(SupabaseStore::new(&config)?);
        let flow = PipelineFlow::new(
            store.clone(),
            Arc::new(LlmScriptGenerator::new(
                &config.script,
                config.request_timeout(),
            )?),
            Arc::new(ElevenLabsSynthesizer::new(
                &config.speech,
                config.request_timeout(),
            )?),
            Arc::new(HttpVideoRenderer::new(
                config.renderer.backend_url.clone(),
                config.store.url.clone(),
                config.render_timeout(),
            )?),
        )
        .with_render_timeout(config.render_timeout());

        Ok(Self::from_parts(config, flow))
    }

    /// 用已组装好的流程创建应用
    pub fn from_parts(config: Config, flow: PipelineFlow) -> Self {
        let queue = WorkQueue::new(flow.store().clone());
        Self {
            config,
            flow: Arc::new(flow),
            queue,
        }
    }

    pub fn flow(&self) -> &PipelineFlow {
        &self.flow
    }

    /// 列出某阶段的候选条目
    pub async fn candidates(&self, stage: Stage) -> Result<Vec<ContentItem>> {
        self.queue.find_candidates(stage).await
    }

    /// script 阶段的待处理题目 ID
    pub async fn script_sources(&self) -> Result<Vec<String>> {
        self.queue.find_script_sources().await
    }

    /// 为题目生成并保存脚本
    pub async fn script(&self, question_id: &str) -> Result<StageReport> {
        self.flow.run_script(question_id).await
    }

    /// 对单个条目执行一个阶段
    pub async fn run_one(&self, stage: Stage, item_id: Uuid) -> Result<StageReport> {
        self.flow.run_stage(stage, item_id).await
    }

    /// 让单个条目走完剩余阶段
    pub async fn advance(&self, item_id: Uuid) -> Result<Vec<StageReport>> {
        self.flow.advance(item_id).await
    }

    /// 批量执行某个阶段
    pub async fn run_stage(&self, stage: Stage) -> Result<BatchStats> {
        let candidates: Vec<Target> = match stage {
            Stage::Script => self
                .queue
                .find_script_sources()
                .await?
                .into_iter()
                .map(Target::Question)
                .collect(),
            _ => self
                .queue
                .find_candidates(stage)
                .await?
                .into_iter()
                .map(Target::Item)
                .collect(),
        };

        if candidates.is_empty() {
            warn!("⚠️ 没有可以执行 {} 阶段的条目", stage);
            return Ok(BatchStats::default());
        }

        logging::log_batch_start(stage, candidates.len(), self.config.max_concurrent_items);

        let stats = self.process_batch(stage, candidates).await;

        logging::log_batch_complete(
            stage,
            stats.success,
            stats.provisional,
            stats.failed,
            stats.total,
        );
        Ok(stats)
    }

    async fn process_batch(&self, stage: Stage, targets: Vec<Target>) -> BatchStats {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_items.max(1)));
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let semaphore = semaphore.clone();
            let flow = self.flow.clone();
            let ctx = match &target {
                Target::Item(item) => ItemCtx::for_item(item, stage),
                Target::Question(question_id) => ItemCtx::new(None, question_id.clone(), stage),
            };

            handles.push(tokio::spawn(async move {
                // semaphore 不会被关闭
                let _permit = semaphore.acquire_owned().await.ok();

                let result = match target {
                    Target::Item(item) => flow.run_stage(stage, item.id).await,
                    Target::Question(question_id) => flow.run_script(&question_id).await,
                };
                result.map_err(|e| {
                    error!("{} ❌ 处理失败: {}", ctx, e);
                    e
                })
            }));
        }

        let mut stats = BatchStats {
            total: handles.len(),
            ..Default::default()
        };

        for result in join_all(handles).await {
            match result {
                Ok(Ok(report)) if report.is_provisional() => stats.provisional += 1,
                Ok(Ok(_)) => stats.success += 1,
                Ok(Err(_)) => stats.failed += 1,
                Err(e) => {
                    error!("任务执行失败: {}", e);
                    stats.failed += 1;
                }
            }
        }

        stats
    }
}
