//! 内存存储
//!
//! 单进程内的 [`ContentStore`] 实现，用于本地试跑和测试。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::infrastructure::store::ContentStore;
use crate::models::{ContentItem, ItemPatch, ItemStatus, QuestionRecord};

pub struct MemoryStore {
    items: RwLock<HashMap<Uuid, ContentItem>>,
    /// 按登记顺序保存
    questions: RwLock<Vec<QuestionRecord>>,
    exams: RwLock<HashMap<i64, String>>,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    public_base: String,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_public_base("memory://storage")
    }

    pub fn with_public_base(public_base: impl Into<String>) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            questions: RwLock::new(Vec::new()),
            exams: RwLock::new(HashMap::new()),
            blobs: RwLock::new(HashMap::new()),
            public_base: public_base.into(),
        }
    }

    /// 登记题目；同一 ID 再次登记时原地替换
    pub async fn add_question(&self, question: QuestionRecord) {
        let mut questions = self.questions.write().await;
        match questions.iter_mut().find(|q| q.id == question.id) {
            Some(existing) => *existing = question,
            None => questions.push(question),
        }
    }

    /// 登记课程对应的考试名称
    pub async fn add_exam(&self, course_id: i64, exam_name: impl Into<String>) {
        self.exams.write().await.insert(course_id, exam_name.into());
    }

    /// 读取已上传的文件内容
    pub async fn blob(&self, filename: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(filename).cloned()
    }

    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn item_count(&self) -> usize {
        self.items.read().await.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_item(&self, id: Uuid) -> Result<ContentItem> {
        self.items
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PipelineError::not_found("条目", id))
    }

    async fn find_item_by_question(&self, question_id: &str) -> Result<Option<ContentItem>> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .find(|item| item.source_question_id == question_id)
            .cloned())
    }

    async fn insert_item(&self, item: &ContentItem) -> Result<ContentItem> {
        let mut items = self.items.write().await;
        if let Some(existing) = items
            .values()
            .find(|existing| existing.source_question_id == item.source_question_id)
        {
            return Err(PipelineError::Conflict {
                item: existing.id.to_string(),
                expected: item.status,
                actual: existing.status,
            });
        }
        if items.contains_key(&item.id) {
            return Err(PipelineError::persistence(
                "insert_item",
                format!("条目 {} 已存在", item.id),
            ));
        }
        items.insert(item.id, item.clone());
        debug!("插入条目 {} (题目 {})", item.id, item.source_question_id);
        Ok(item.clone())
    }

    async fn update_if(
        &self,
        id: Uuid,
        expected: ItemStatus,
        patch: &ItemPatch,
    ) -> Result<ContentItem> {
        // 比较和写入在同一把写锁内完成
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&id)
            .ok_or_else(|| PipelineError::not_found("条目", id))?;

        if !expected.can_advance_to(patch.status) {
            return Err(PipelineError::persistence(
                "update_if",
                format!("状态不能从 {} 回退到 {}", expected, patch.status),
            ));
        }
        if item.status != expected {
            return Err(PipelineError::Conflict {
                item: id.to_string(),
                expected,
                actual: item.status,
            });
        }

        item.apply(patch);
        debug!("条目 {} 状态: {} → {}", id, expected, item.status);
        Ok(item.clone())
    }

    async fn find_by_status(
        &self,
        statuses: &[ItemStatus],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContentItem>> {
        let mut found: Vec<ContentItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|item| statuses.contains(&item.status))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_unused_questions(&self, limit: usize) -> Result<Vec<QuestionRecord>> {
        let items = self.items.read().await;
        let questions = self.questions.read().await;
        Ok(questions
            .iter()
            .rev()
            .filter(|q| !q.is_used())
            .filter(|q| items.values().all(|item| item.source_question_id != q.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_question(&self, question_id: &str) -> Result<QuestionRecord> {
        self.questions
            .read()
            .await
            .iter()
            .find(|q| q.id == question_id)
            .cloned()
            .ok_or_else(|| PipelineError::not_found("题目", question_id))
    }

    async fn exam_name_for_course(&self, course_id: i64) -> Result<Option<String>> {
        Ok(self.exams.read().await.get(&course_id).cloned())
    }

    async fn mark_question_used(&self, question_id: &str) -> Result<()> {
        let mut questions = self.questions.write().await;
        let question = questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or_else(|| PipelineError::not_found("题目", question_id))?;
        question.used_in_video = Some("yes".to_string());
        Ok(())
    }

    async fn upload_binary(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        _content_type: &str,
    ) -> Result<String> {
        self.blobs.write().await.insert(filename.to_string(), bytes);
        Ok(format!("{}/{}", self.public_base.trim_end_matches('/'), filename))
    }
}
