//! 待处理队列 - 编排层
//!
//! 找出"可以执行某个阶段"的条目，支持断点续跑和乱序批处理。

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::infrastructure::ContentStore;
use crate::models::{ContentItem, Stage};

/// 每次最多返回的候选数量
pub const PAGE_SIZE: usize = 10;

pub struct WorkQueue {
    store: Arc<dyn ContentStore>,
}

impl WorkQueue {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// 满足 `stage` 前置条件的条目，按创建时间倒序，最多 [`PAGE_SIZE`] 条
    pub async fn find_candidates(&self, stage: Stage) -> Result<Vec<ContentItem>> {
        let mut candidates = Vec::with_capacity(PAGE_SIZE);
        let mut offset = 0;

        // 状态只是预筛选，字段才是准绳；被过滤掉的行不占名额
        loop {
            let page = self
                .store
                .find_by_status(stage.ready_statuses(), PAGE_SIZE, offset)
                .await?;
            let page_len = page.len();
            offset += page_len;

            candidates.extend(page.into_iter().filter(|item| stage.is_ready(item)));
            if candidates.len() >= PAGE_SIZE || page_len < PAGE_SIZE {
                break;
            }
        }
        candidates.truncate(PAGE_SIZE);

        debug!("阶段 {} 找到 {} 个候选条目", stage, candidates.len());
        Ok(candidates)
    }

    /// script 阶段的待处理题目 ID，最多 [`PAGE_SIZE`] 个
    ///
    /// 先是已建条目但还没有脚本的题目，再是尚未使用、也没有条目的题目。
    pub async fn find_script_sources(&self) -> Result<Vec<String>> {
        let mut sources: Vec<String> = self
            .find_candidates(Stage::Script)
            .await?
            .into_iter()
            .map(|item| item.source_question_id)
            .collect();

        let remaining = PAGE_SIZE.saturating_sub(sources.len());
        if remaining > 0 {
            let questions = self.store.find_unused_questions(remaining).await?;
            sources.extend(questions.into_iter().map(|q| q.id));
        }

        debug!("script 阶段找到 {} 道待处理题目", sources.len());
        Ok(sources)
    }
}
