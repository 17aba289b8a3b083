use serde::{Deserialize, Serialize};

use crate::models::content_item::deserialize_question_id;

/// 兜底的考试名称
pub const DEFAULT_EXAM_NAME: &str = "this exam";

/// 题库中的一道题（外部维护）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(deserialize_with = "deserialize_question_id")]
    pub id: String,
    #[serde(default)]
    pub course_id: Option<i64>,
    pub question_statement: String,
    #[serde(default)]
    pub question_type: Option<String>,
    #[serde(default)]
    pub options: Option<String>,
    pub answer: String,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub used_in_video: Option<String>,
}

impl QuestionRecord {
    /// 是否已经被某个视频消费
    pub fn is_used(&self) -> bool {
        self.used_in_video.as_deref() == Some("yes")
    }

    /// 是否有需要朗读的选项
    pub fn has_options(&self) -> bool {
        self.options
            .as_deref()
            .map(|o| !o.trim().is_empty())
            .unwrap_or(false)
    }
}

/// 脚本生成器的输入
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPayload {
    pub exam_name: String,
    pub question: QuestionRecord,
}

impl QuestionPayload {
    pub fn new(question: QuestionRecord, exam_name: Option<String>) -> Self {
        Self {
            exam_name: exam_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_EXAM_NAME.to_string()),
            question,
        }
    }
}

/// 渲染时展示的题目信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDisplay {
    pub statement: String,
    pub options: Option<String>,
    pub answer: String,
    pub solution: Option<String>,
}

impl From<&QuestionRecord> for QuestionDisplay {
    fn from(q: &QuestionRecord) -> Self {
        Self {
            statement: q.question_statement.clone(),
            options: q.options.clone(),
            answer: q.answer.clone(),
            solution: q.solution.clone(),
        }
    }
}
