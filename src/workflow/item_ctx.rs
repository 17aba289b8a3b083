//! 条目处理上下文
//!
//! 封装"我正在处理哪个条目的哪个阶段"，只用于日志前缀。

use std::fmt::Display;

use uuid::Uuid;

use crate::models::{ContentItem, Stage};

#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 脚本落库前还没有条目 ID
    pub item_id: Option<Uuid>,
    pub question_id: String,
    pub stage: Stage,
}

impl ItemCtx {
    pub fn new(item_id: Option<Uuid>, question_id: impl Into<String>, stage: Stage) -> Self {
        Self {
            item_id,
            question_id: question_id.into(),
            stage,
        }
    }

    pub fn for_item(item: &ContentItem, stage: Stage) -> Self {
        Self::new(Some(item.id), item.source_question_id.clone(), stage)
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.item_id {
            Some(id) => {
                let id = id.to_string();
                write!(
                    f,
                    "[条目 {} 题目#{} 阶段#{}]",
                    &id[..8],
                    self.question_id,
                    self.stage
                )
            }
            None => write!(f, "[新条目 题目#{} 阶段#{}]", self.question_id, self.stage),
        }
    }
}
