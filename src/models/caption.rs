use serde::{Deserialize, Serialize};

/// 单个词的时间区间（秒）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// 一段字幕
///
/// 相邻字幕段首尾相接，`words` 恰好覆盖 `[start, end]`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

/// 对齐结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub segments: Vec<CaptionSegment>,
    pub total_duration: f64,
}

impl Alignment {
    /// 按顺序展开所有字幕段中的词
    pub fn words(&self) -> impl Iterator<Item = &WordTiming> {
        self.segments.iter().flat_map(|s| s.words.iter())
    }
}
