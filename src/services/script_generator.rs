//! 脚本生成 - 业务能力层
//!
//! 只负责"根据题目写出讲解脚本"，不关心落库和流程。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（Gemini、Azure 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{ConfigError, PipelineError, Result};
use crate::models::{QuestionPayload, Stage};

/// 脚本里的倒计时标记
pub const COUNTDOWN_MARKER: &str = "[COUNTDOWN: 5...4...3...2...1]";

pub const DEFAULT_SCRIPT_MODEL: &str = "gemini-2.0-flash-exp";

/// 脚本生成能力
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// 生成讲解脚本；空文本视为失败
    async fn generate(&self, payload: &QuestionPayload) -> Result<String>;
}

/// 基于 LLM 的脚本生成器
pub struct LlmScriptGenerator {
    client: Client<OpenAIConfig>,
    model_name: String,
    /// 单次请求（含 SDK 内部重试）的总时限
    timeout: Duration,
}

impl LlmScriptGenerator {
    pub fn new(
        config: &ProviderConfig,
        timeout: Duration,
    ) -> std::result::Result<Self, ConfigError> {
        let api_key = config.require_api_key("script")?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if !config.base_url.trim().is_empty() {
            openai_config = openai_config.with_api_base(&config.base_url);
        }

        let model_name = if config.model_id.trim().is_empty() {
            DEFAULT_SCRIPT_MODEL.to_string()
        } else {
            config.model_id.clone()
        };

        Ok(Self {
            client: Client::with_config(openai_config),
            model_name,
            timeout,
        })
    }

    fn provider(&self) -> String {
        format!("LLM({})", self.model_name)
    }

    async fn send_to_llm(&self, user_message: &str, system_message: &str) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let to_err = |e: async_openai::error::OpenAIError| {
            PipelineError::generator(Stage::Script, self.provider(), e)
        };

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()
            .map_err(to_err)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(to_err)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.7)
            .max_tokens(2048u32)
            .build()
            .map_err(to_err)?;

        // SDK 自带的 HTTP 客户端没有超时
        let response = match tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
        {
            Ok(result) => result.map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                to_err(e)
            })?,
            Err(_) => {
                warn!("LLM API 调用超时 ({:?})", self.timeout);
                return Err(PipelineError::generator(
                    Stage::Script,
                    self.provider(),
                    format!("请求超时 ({:?})", self.timeout),
                ));
            }
        };

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl ScriptGenerator for LlmScriptGenerator {
    async fn generate(&self, payload: &QuestionPayload) -> Result<String> {
        let prompt = build_prompt(payload);
        let script = self.send_to_llm(&prompt, SYSTEM_MESSAGE).await?;

        if script.is_empty() {
            return Err(PipelineError::generator(
                Stage::Script,
                self.provider(),
                "未生成脚本",
            ));
        }
        if !script.contains("[COUNTDOWN:") {
            warn!("生成的脚本缺少倒计时标记，视频中不会出现倒计时");
        }

        Ok(script)
    }
}

const SYSTEM_MESSAGE: &str = "You write narration scripts for short educational videos. \
                              The script is read aloud verbatim by a text-to-speech system.";

/// 构建脚本生成提示词
///
/// 结构固定：开场 → 读题 → 读选项 → 5 秒倒计时 → 公布答案 → 讲解 → 引导关注。
pub fn build_prompt(payload: &QuestionPayload) -> String {
    let exam = &payload.exam_name;
    let q = &payload.question;
    let solution_hint = q
        .solution
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Provide a clear explanation");

    let mut prompt = format!(
        r#"Create an engaging educational video script for this question. Follow this exact structure:

1. Start with: "Hello everyone, today we are going to solve a question for {exam} entrance exam."
2. Say: "So the question says:" then read the question statement word by word
3. For MCQ/MSQ questions, read each option clearly: "Option A: [text], Option B: [text]" etc.
4. After reading the question and options, say: "Try solving this question on your own. I'll give you 5 seconds." [PAUSE 5 SECONDS - indicate with {COUNTDOWN_MARKER}]
5. Then reveal: "The answer is: {answer}"
6. Finally explain the solution: {solution_hint}
7. End with: "If you are looking for a complete guide for {exam} or more practice questions and guidance, follow and comment {exam} and it will be in your DMs."

Question: {statement}
"#,
        answer = q.answer,
        statement = q.question_statement,
    );

    if q.has_options() {
        prompt.push_str(&format!("Options: {}\n", q.options.as_deref().unwrap_or_default()));
    }
    prompt.push_str(&format!("Answer: {}\n", q.answer));
    if let Some(solution) = q.solution.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!("Solution: {}\n", solution));
    }

    prompt.push_str(
        "\nMake the script conversational, engaging, and suitable for voice-over. \
         Use simple language that sounds natural when spoken. \
         The script should be read exactly as written by our text-to-speech system.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionRecord;

    fn payload(options: Option<&str>, solution: Option<&str>) -> QuestionPayload {
        QuestionPayload::new(
            QuestionRecord {
                id: "17".to_string(),
                course_id: Some(3),
                question_statement: "What is the derivative of x^2?".to_string(),
                question_type: Some("MCQ".to_string()),
                options: options.map(str::to_string),
                answer: "B".to_string(),
                solution: solution.map(str::to_string),
                used_in_video: None,
            },
            Some("JEE".to_string()),
        )
    }

    #[test]
    fn test_prompt_follows_narration_structure() {
        let prompt = build_prompt(&payload(Some("A: x, B: 2x"), Some("d/dx x^2 = 2x")));

        let order = [
            "Hello everyone, today we are going to solve a question for JEE entrance exam.",
            "So the question says:",
            "Option A: [text]",
            "[COUNTDOWN: 5...4...3...2...1]",
            "The answer is: B",
            "Finally explain the solution: d/dx x^2 = 2x",
            "follow and comment JEE",
        ];
        let mut last = 0;
        for needle in order {
            let pos = prompt[last..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing or out of order: {needle}"));
            last += pos;
        }

        assert!(prompt.contains("Question: What is the derivative of x^2?"));
        assert!(prompt.contains("Options: A: x, B: 2x"));
        assert!(prompt.contains("Solution: d/dx x^2 = 2x"));
    }

    #[test]
    fn test_prompt_without_options_or_solution() {
        let prompt = build_prompt(&payload(None, None));

        assert!(!prompt.contains("Options:"));
        assert!(!prompt.contains("Solution:"));
        assert!(prompt.contains("Finally explain the solution: Provide a clear explanation"));
    }

    #[test]
    fn test_requires_api_key() {
        let err = LlmScriptGenerator::new(&ProviderConfig::default(), Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingCredential { section: "script", .. }));
    }

    #[tokio::test]
    async fn test_generate_times_out_when_server_never_answers() {
        // 只接受连接、从不回复的服务端
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = ProviderConfig {
            api_key: "sk-test".to_string(),
            base_url: format!("http://{addr}/v1"),
            ..Default::default()
        };
        let generator = LlmScriptGenerator::new(&config, Duration::from_millis(300)).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            generator.generate(&payload(Some("A: x, B: 2x"), None)),
        )
        .await
        .expect("generate 应在请求超时后返回");

        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::Generator { stage: Stage::Script, .. }));
        assert!(err.to_string().contains("超时"));
    }

    /// 需要真实的 API Key：
    /// ```bash
    /// SCRIPT_API_KEY=... cargo test test_generate_live -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_generate_live() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = crate::config::Config::default()
            .with_env_overrides(|k| std::env::var(k).ok())
            .unwrap();
        let generator = LlmScriptGenerator::new(&config.script, config.request_timeout()).unwrap();

        let script = generator
            .generate(&payload(Some("A: x, B: 2x"), None))
            .await
            .unwrap();
        println!("{}", script);
        assert!(!script.is_empty());
    }
}
