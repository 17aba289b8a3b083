//! 持久化存储 - 基础设施层
//!
//! 条目状态的唯一可信来源。所有阶段写入都通过 [`ContentStore::update_if`]
//! 做条件写入：只有当前状态等于期望状态时才落库。

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ContentItem, ItemPatch, ItemStatus, QuestionRecord};

/// 持久化存储能力
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// 读取条目，不存在时返回 `NotFound`
    async fn get_item(&self, id: Uuid) -> Result<ContentItem>;

    /// 按来源题目查找条目
    async fn find_item_by_question(&self, question_id: &str) -> Result<Option<ContentItem>>;

    /// 插入新条目，返回落库后的记录
    ///
    /// 每道题目最多一个条目；题目已有条目时返回 `Conflict`。
    async fn insert_item(&self, item: &ContentItem) -> Result<ContentItem>;

    /// 条件写入：当前状态等于 `expected` 时应用 `patch`，否则返回 `Conflict`
    async fn update_if(&self, id: Uuid, expected: ItemStatus, patch: &ItemPatch)
        -> Result<ContentItem>;

    /// 按状态查找条目，按创建时间倒序，跳过前 `offset` 条后最多取 `limit` 条
    async fn find_by_status(
        &self,
        statuses: &[ItemStatus],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContentItem>>;

    /// 尚未被视频使用、也还没有对应条目的题目，新登记的在前
    async fn find_unused_questions(&self, limit: usize) -> Result<Vec<QuestionRecord>>;

    async fn get_question(&self, question_id: &str) -> Result<QuestionRecord>;

    /// 课程所属考试的名称
    async fn exam_name_for_course(&self, course_id: i64) -> Result<Option<String>>;

    /// 标记题目已被视频使用
    async fn mark_question_used(&self, question_id: &str) -> Result<()>;

    /// 上传二进制文件，按文件名覆盖写入，返回公开地址
    async fn upload_binary(&self, bytes: Vec<u8>, filename: &str, content_type: &str)
        -> Result<String>;
}
