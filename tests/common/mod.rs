#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use narration_pipeline::error::{PipelineError, Result};
use narration_pipeline::models::{
    CaptionSegment, ContentItem, ItemPatch, ItemStatus, QuestionPayload, QuestionRecord, Stage,
    WordTiming,
};
use narration_pipeline::services::{
    RenderOutcome, RenderSpec, ScriptGenerator, SpeechSynthesizer, VideoRenderer,
};
use narration_pipeline::{ContentStore, MemoryStore, PipelineFlow};

pub const SCRIPT: &str = "Hello everyone, today we are going to solve a question for JEE entrance exam. \
So the question says: what is the derivative of x squared? Option A: x, Option B: 2x. \
Try solving this question on your own. I'll give you 5 seconds. [COUNTDOWN: 5...4...3...2...1] \
The answer is: **B**. Follow and comment JEE and it will be in your DMs.";

pub fn question(id: &str) -> QuestionRecord {
    QuestionRecord {
        id: id.to_string(),
        course_id: Some(7),
        question_statement: "What is the derivative of x squared?".to_string(),
        question_type: Some("MCQ".to_string()),
        options: Some("A: x, B: 2x".to_string()),
        answer: "B".to_string(),
        solution: Some("d/dx x^2 = 2x".to_string()),
        used_in_video: None,
    }
}

// ========== 假的外部能力 ==========

pub struct FakeScriptGenerator {
    pub reply: Option<String>,
    pub calls: AtomicUsize,
    pub last_exam: Mutex<Option<String>>,
}

impl FakeScriptGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
            last_exam: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            last_exam: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptGenerator for FakeScriptGenerator {
    async fn generate(&self, payload: &QuestionPayload) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_exam.lock().unwrap() = Some(payload.exam_name.clone());
        self.reply
            .clone()
            .ok_or_else(|| PipelineError::generator(Stage::Script, "fake-llm", "503 unavailable"))
    }
}

pub struct FakeSynthesizer {
    pub audio: Vec<u8>,
    pub fail: bool,
    pub calls: AtomicUsize,
    pub last_text: Mutex<Option<String>>,
}

impl FakeSynthesizer {
    pub fn returning(audio: Vec<u8>) -> Self {
        Self {
            audio,
            fail: false,
            calls: AtomicUsize::new(0),
            last_text: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::returning(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_text.lock().unwrap() = Some(text.to_string());
        if self.fail {
            return Err(PipelineError::generator(Stage::Audio, "fake-tts", "401 invalid api key"));
        }
        Ok(self.audio.clone())
    }
}

pub struct FakeRenderer {
    pub engine_invoked: bool,
    pub delay: Option<Duration>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeRenderer {
    pub fn rendering() -> Self {
        Self {
            engine_invoked: true,
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn placeholder_only() -> Self {
        Self {
            engine_invoked: false,
            ..Self::rendering()
        }
    }

    pub fn hanging(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::rendering()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::rendering()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoRenderer for FakeRenderer {
    async fn render(&self, spec: &RenderSpec) -> Result<RenderOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(PipelineError::generator(Stage::Video, "fake-renderer", "bad spec"));
        }
        if self.engine_invoked {
            Ok(RenderOutcome::rendered(format!(
                "https://cdn.test/videos/{}.mp4",
                spec.video_id
            )))
        } else {
            Ok(RenderOutcome::placeholder(
                self.placeholder_uri(spec),
                "未配置渲染后端，已生成占位地址",
            ))
        }
    }

    fn placeholder_uri(&self, spec: &RenderSpec) -> String {
        format!(
            "https://cdn.test/video-renders/video_{}_template_{}.mp4",
            spec.video_id, spec.template_id
        )
    }
}

/// 可以让条件写入失败的存储
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_updates: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_updates: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ContentStore for FlakyStore {
    async fn get_item(&self, id: Uuid) -> Result<ContentItem> {
        self.inner.get_item(id).await
    }

    async fn find_item_by_question(&self, question_id: &str) -> Result<Option<ContentItem>> {
        self.inner.find_item_by_question(question_id).await
    }

    async fn insert_item(&self, item: &ContentItem) -> Result<ContentItem> {
        self.inner.insert_item(item).await
    }

    async fn update_if(
        &self,
        id: Uuid,
        expected: ItemStatus,
        patch: &ItemPatch,
    ) -> Result<ContentItem> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PipelineError::persistence("update_if", "connection reset"));
        }
        self.inner.update_if(id, expected, patch).await
    }

    async fn find_by_status(
        &self,
        statuses: &[ItemStatus],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContentItem>> {
        self.inner.find_by_status(statuses, limit, offset).await
    }

    async fn find_unused_questions(&self, limit: usize) -> Result<Vec<QuestionRecord>> {
        self.inner.find_unused_questions(limit).await
    }

    async fn get_question(&self, question_id: &str) -> Result<QuestionRecord> {
        self.inner.get_question(question_id).await
    }

    async fn exam_name_for_course(&self, course_id: i64) -> Result<Option<String>> {
        self.inner.exam_name_for_course(course_id).await
    }

    async fn mark_question_used(&self, question_id: &str) -> Result<()> {
        self.inner.mark_question_used(question_id).await
    }

    async fn upload_binary(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String> {
        self.inner.upload_binary(bytes, filename, content_type).await
    }
}

// ========== 组装 ==========

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub generator: Arc<FakeScriptGenerator>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub renderer: Arc<FakeRenderer>,
}

impl Harness {
    pub async fn new(
        generator: FakeScriptGenerator,
        synthesizer: FakeSynthesizer,
        renderer: FakeRenderer,
    ) -> Self {
        let store = Arc::new(MemoryStore::with_public_base("https://cdn.test/audio-files"));
        store.add_exam(7, "JEE").await;
        for id in ["q-1", "q-2", "q-3"] {
            store.add_question(question(id)).await;
        }

        Self {
            store,
            generator: Arc::new(generator),
            synthesizer: Arc::new(synthesizer),
            renderer: Arc::new(renderer),
        }
    }

    pub async fn happy() -> Self {
        Self::new(
            FakeScriptGenerator::replying(SCRIPT),
            FakeSynthesizer::returning(vec![0xFF, 0xFB, 0x90, 0x64]),
            FakeRenderer::rendering(),
        )
        .await
    }

    pub fn flow(&self) -> PipelineFlow {
        PipelineFlow::new(
            self.store.clone(),
            self.generator.clone(),
            self.synthesizer.clone(),
            self.renderer.clone(),
        )
    }
}

/// 直接构造处于某个状态、字段一致的条目
pub fn item_at(question_id: &str, status: ItemStatus) -> ContentItem {
    let mut item = ContentItem::new(question_id, Some(7));
    let progress = status.progress();

    if progress >= 1 {
        item.apply(&ItemPatch::new(ItemStatus::ScriptReady).script(SCRIPT, 2));
    }
    if progress >= 2 {
        item.apply(&ItemPatch::new(ItemStatus::AudioReady).audio("https://cdn.test/a.mp3"));
    }
    if progress >= 3 {
        item.apply(&ItemPatch::new(ItemStatus::CaptionsReady).captions(vec![CaptionSegment {
            text: "Hello.".to_string(),
            start: 0.0,
            end: 0.4,
            words: vec![WordTiming {
                word: "Hello.".to_string(),
                start: 0.0,
                end: 0.4,
            }],
        }]));
    }
    if progress >= 4 {
        item.apply(&ItemPatch::new(status).video("https://cdn.test/v.mp4"));
    }
    item
}
