//! 条目处理流程 - 流程层
//!
//! 核心职责：驱动一个条目依次通过四个阶段
//!
//! 流程顺序：
//! 1. script → 生成脚本，随机选定模板，创建/填充条目
//! 2. audio → 清理标记后合成配音，上传，标记题目已使用
//! 3. captions → 按固定语速生成字幕时间轴（进程内）
//! 4. video → 提交渲染；渲染引擎未被调用时落到 `render_pending`
//!
//! 每个阶段先检查前置条件，再调用一次外部能力，最后做一次条件写入。
//! 外部调用失败时不写入任何内容；不自动重试。

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::infrastructure::ContentStore;
use crate::models::{
    ContentItem, ItemPatch, ItemStatus, QuestionPayload, QuestionRecord, Stage, Template,
    DEFAULT_TEMPLATE_ID,
};
use crate::services::caption_aligner::{align, clean_narration};
use crate::services::{RenderOutcome, RenderSpec, ScriptGenerator, SpeechSynthesizer, VideoRenderer};
use crate::workflow::item_ctx::ItemCtx;

/// 渲染调用的默认硬超时
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(300);

/// 单个阶段的执行结果
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    /// 写入后的条目
    pub item: ContentItem,
    /// 非致命提示（如只拿到了占位视频地址）
    pub advisory: Option<String>,
}

impl StageReport {
    fn completed(stage: Stage, item: ContentItem) -> Self {
        Self {
            stage,
            item,
            advisory: None,
        }
    }

    /// 结果是否未经确认
    pub fn is_provisional(&self) -> bool {
        self.advisory.is_some()
    }
}

/// 条目处理流程
///
/// - 只依赖能力（store / generator / synthesizer / renderer）
/// - 不缓存条目，每个阶段都从存储重新读取
/// - 同一条目上的并发调用由条件写入兜底，后到者得到 `Conflict`
pub struct PipelineFlow {
    store: Arc<dyn ContentStore>,
    script_generator: Arc<dyn ScriptGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    renderer: Arc<dyn VideoRenderer>,
    render_timeout: Duration,
}

impl PipelineFlow {
    pub fn new(
        store: Arc<dyn ContentStore>,
        script_generator: Arc<dyn ScriptGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        renderer: Arc<dyn VideoRenderer>,
    ) -> Self {
        Self {
            store,
            script_generator,
            synthesizer,
            renderer,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_render_timeout(mut self, render_timeout: Duration) -> Self {
        self.render_timeout = render_timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    // ========== script ==========

    /// 生成脚本但不落库
    pub async fn preview_script(&self, question_id: &str) -> Result<String> {
        self.script_slot(question_id).await?;
        let question = self.store.get_question(question_id).await?;
        self.generate_script(&question).await
    }

    /// 接受一份脚本并落库
    pub async fn accept_script(&self, question_id: &str, script: String) -> Result<StageReport> {
        let question = self.store.get_question(question_id).await?;
        self.save_script(&question, script).await
    }

    /// 生成并保存脚本
    pub async fn run_script(&self, question_id: &str) -> Result<StageReport> {
        self.script_slot(question_id).await?;
        let question = self.store.get_question(question_id).await?;
        let script = self.generate_script(&question).await?;
        self.save_script(&question, script).await
    }

    /// 题目已有脚本时拒绝；返回尚未生成脚本的已有条目
    async fn script_slot(&self, question_id: &str) -> Result<Option<ContentItem>> {
        match self.store.find_item_by_question(question_id).await? {
            Some(item) => {
                Stage::Script.check(&item)?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    async fn generate_script(&self, question: &QuestionRecord) -> Result<String> {
        let ctx = ItemCtx::new(None, question.id.clone(), Stage::Script);

        let exam_name = match question.course_id {
            Some(course_id) => self.store.exam_name_for_course(course_id).await?,
            None => None,
        };
        let payload = QuestionPayload::new(question.clone(), exam_name);

        info!("{} ✍️ 正在生成讲解脚本 (考试: {})", ctx, payload.exam_name);
        let script = self.script_generator.generate(&payload).await?;

        if script.trim().is_empty() {
            return Err(PipelineError::generator(Stage::Script, "script generator", "未生成脚本"));
        }
        info!("{} ✓ 脚本生成完成 ({} 字符)", ctx, script.chars().count());
        Ok(script)
    }

    async fn save_script(&self, question: &QuestionRecord, script: String) -> Result<StageReport> {
        let ctx = ItemCtx::new(None, question.id.clone(), Stage::Script);
        if script.trim().is_empty() {
            return Err(PipelineError::precondition(Stage::Script, question.id.clone(), "脚本为空"));
        }

        // 生成期间可能已有别的调用落库，重新检查
        let existing = self.script_slot(&question.id).await?;

        let template = Template::random();
        let patch = ItemPatch::new(Stage::Script.completed_status()).script(script, template.id);

        let item = match existing {
            Some(item) => self.store.update_if(item.id, item.status, &patch).await?,
            None => {
                let mut item = ContentItem::new(question.id.clone(), question.course_id);
                item.apply(&patch);
                self.store.insert_item(&item).await?
            }
        };

        info!("{} 💾 脚本已保存 (条目 {}, 模板 {})", ctx, item.id, template.id);
        Ok(StageReport::completed(Stage::Script, item))
    }

    // ========== audio ==========

    pub async fn run_audio(&self, item_id: Uuid) -> Result<StageReport> {
        let item = self.store.get_item(item_id).await?;
        let ctx = ItemCtx::for_item(&item, Stage::Audio);
        Stage::Audio.check(&item)?;

        let narration = clean_narration(item.script.as_deref().unwrap_or_default());
        if narration.is_empty() {
            return Err(PipelineError::precondition(
                Stage::Audio,
                item.id.to_string(),
                "去除控制标记后脚本为空",
            ));
        }

        info!("{} 🎙️ 正在合成配音 ({} 字符)", ctx, narration.chars().count());
        let audio = self.synthesizer.synthesize(&narration).await?;
        if audio.is_empty() {
            return Err(PipelineError::generator(Stage::Audio, "speech synthesizer", "合成的音频为空"));
        }

        // 文件名只取条目 ID：写入失败后重试会覆盖同一个文件
        let filename = format!("audio_{}.mp3", item.id);
        let audio_ref = self
            .store
            .upload_binary(audio, &filename, "audio/mpeg")
            .await?;
        info!("{} 📤 音频已上传: {}", ctx, audio_ref);

        let patch = ItemPatch::new(Stage::Audio.completed_status()).audio(audio_ref);
        let updated = self.store.update_if(item.id, item.status, &patch).await?;

        // 条目已经落库，这里失败不影响阶段结果
        if let Err(e) = self.store.mark_question_used(&item.source_question_id).await {
            warn!("{} ⚠️ 标记题目已使用失败: {}", ctx, e);
        }

        info!("{} ✓ 配音完成", ctx);
        Ok(StageReport::completed(Stage::Audio, updated))
    }

    // ========== captions ==========

    pub async fn run_captions(&self, item_id: Uuid) -> Result<StageReport> {
        let item = self.store.get_item(item_id).await?;
        let ctx = ItemCtx::for_item(&item, Stage::Captions);
        Stage::Captions.check(&item)?;

        let alignment = align(item.script.as_deref().unwrap_or_default())?;
        info!(
            "{} 📝 生成 {} 段字幕，总时长 {:.2} 秒",
            ctx,
            alignment.segments.len(),
            alignment.total_duration
        );

        let patch = ItemPatch::new(Stage::Captions.completed_status()).captions(alignment.segments);
        let updated = self.store.update_if(item.id, item.status, &patch).await?;

        info!("{} ✓ 字幕已保存", ctx);
        Ok(StageReport::completed(Stage::Captions, updated))
    }

    // ========== video ==========

    pub async fn run_video(&self, item_id: Uuid) -> Result<StageReport> {
        let item = self.store.get_item(item_id).await?;
        let ctx = ItemCtx::for_item(&item, Stage::Video);
        Stage::Video.check(&item)?;

        let question = self.store.get_question(&item.source_question_id).await?;
        let spec = build_render_spec(&item, &question);

        info!("{} 🎬 正在渲染视频 (模板 {})", ctx, spec.template_id);
        let outcome = match tokio::time::timeout(self.render_timeout, self.renderer.render(&spec)).await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!("{} ⏱️ 渲染超时 ({} 秒)", ctx, self.render_timeout.as_secs());
                RenderOutcome::placeholder(
                    self.renderer.placeholder_uri(&spec),
                    format!(
                        "渲染超时 ({} 秒)，已生成占位地址，视频需要手动渲染",
                        self.render_timeout.as_secs()
                    ),
                )
            }
        };

        if outcome.video_uri.trim().is_empty() {
            return Err(PipelineError::generator(Stage::Video, "video renderer", "未返回视频地址"));
        }

        let status = if outcome.engine_invoked {
            Stage::Video.completed_status()
        } else {
            ItemStatus::RenderPending
        };
        let patch = ItemPatch::new(status).video(outcome.video_uri.clone());
        let updated = self.store.update_if(item.id, item.status, &patch).await?;

        let advisory = if outcome.engine_invoked {
            info!("{} ✓ 视频渲染完成: {}", ctx, outcome.video_uri);
            None
        } else {
            warn!("{} ⚠️ {}", ctx, outcome.message);
            Some(outcome.message)
        };

        Ok(StageReport {
            stage: Stage::Video,
            item: updated,
            advisory,
        })
    }

    // ========== 调度 ==========

    /// 对已有条目执行指定阶段
    pub async fn run_stage(&self, stage: Stage, item_id: Uuid) -> Result<StageReport> {
        match stage {
            Stage::Script => {
                let item = self.store.get_item(item_id).await?;
                Stage::Script.check(&item)?;
                self.run_script(&item.source_question_id).await
            }
            Stage::Audio => self.run_audio(item_id).await,
            Stage::Captions => self.run_captions(item_id).await,
            Stage::Video => self.run_video(item_id).await,
        }
    }

    /// 按顺序执行条目剩余的所有阶段，遇到失败即停止
    ///
    /// video 阶段最多尝试一次，`render_pending` 时也会停下。
    pub async fn advance(&self, item_id: Uuid) -> Result<Vec<StageReport>> {
        let mut reports = Vec::new();

        loop {
            let item = self.store.get_item(item_id).await?;
            let Some(stage) = Stage::ALL.into_iter().find(|s| s.is_ready(&item)) else {
                break;
            };

            let report = self.run_stage(stage, item_id).await.map_err(|e| {
                error!("{} ❌ 阶段失败: {}", ItemCtx::for_item(&item, stage), e);
                e
            })?;
            reports.push(report);

            if stage == Stage::Video {
                break;
            }
        }

        Ok(reports)
    }
}

/// 组装渲染请求
fn build_render_spec(item: &ContentItem, question: &QuestionRecord) -> RenderSpec {
    let template_id = item.template_id.unwrap_or(DEFAULT_TEMPLATE_ID);
    RenderSpec {
        video_id: item.id,
        template_id,
        template: Template::by_id(template_id),
        audio_url: item.audio_ref.clone().unwrap_or_default(),
        captions: item.captions.clone().unwrap_or_default(),
        question_data: question.into(),
    }
}
