//! 字幕对齐 - 业务能力层
//!
//! 按固定语速估算每个词的时间，不分析音频。
//! 字幕会和真实语音有偏差，这是已知的近似。
//!
//! 分段规则：当前段累计到 5 个词、遇到以 `.` `!` `?` 结尾的词、
//! 或到达最后一个词时结束一段。

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AlignError;
use crate::models::{Alignment, CaptionSegment, WordTiming};

/// 语速：每秒 2.5 个词
pub const WORDS_PER_SECOND: f64 = 2.5;

/// 每个词的时长（秒）
pub const SECONDS_PER_WORD: f64 = 1.0 / WORDS_PER_SECOND;

/// 一段字幕达到该词数即结束
pub const MAX_SEGMENT_WORDS: usize = 5;

static COUNTDOWN_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[COUNTDOWN:.*?\]").unwrap_or_else(|e| panic!("invalid countdown regex: {e}"))
});

/// 去掉倒计时标记和 `**` 强调标记
///
/// 这些是制作指令，不会被朗读。
pub fn clean_narration(script: &str) -> String {
    COUNTDOWN_MARKER
        .replace_all(script, "")
        .replace("**", "")
        .trim()
        .to_string()
}

/// 把讲解文本切分为带时间轴的字幕段
pub fn align(narration: &str) -> Result<Alignment, AlignError> {
    let cleaned = clean_narration(narration);
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.is_empty() {
        return Err(AlignError::EmptyNarration);
    }

    let mut segments = Vec::new();
    // 已经排好时间的词数，时间都从它换算，避免浮点累加误差
    let mut elapsed_words = 0usize;
    let mut current: Vec<&str> = Vec::with_capacity(MAX_SEGMENT_WORDS);

    for (i, word) in words.iter().enumerate() {
        current.push(word);

        let is_last = i == words.len() - 1;
        if current.len() >= MAX_SEGMENT_WORDS || ends_sentence(word) || is_last {
            segments.push(build_segment(&current, elapsed_words));
            elapsed_words += current.len();
            current.clear();
        }
    }

    Ok(Alignment {
        total_duration: clock(elapsed_words),
        segments,
    })
}

fn ends_sentence(word: &str) -> bool {
    word.ends_with(['.', '!', '?'])
}

fn build_segment(words: &[&str], offset: usize) -> CaptionSegment {
    let timings = words
        .iter()
        .enumerate()
        .map(|(idx, w)| WordTiming {
            word: w.to_string(),
            start: clock(offset + idx),
            end: clock(offset + idx + 1),
        })
        .collect();

    CaptionSegment {
        text: words.join(" "),
        start: clock(offset),
        end: clock(offset + words.len()),
        words: timings,
    }
}

/// 第 `word_index` 个词开始的时刻，保留两位小数
fn clock(word_index: usize) -> f64 {
    round2(word_index as f64 * SECONDS_PER_WORD)
}

fn round2(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}
