use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 配置文件路径的环境变量
pub const CONFIG_PATH_VAR: &str = "PIPELINE_CONFIG";

/// 默认配置文件路径（不存在时只用默认值和环境变量）
pub const DEFAULT_CONFIG_PATH: &str = "pipeline.toml";

/// 外部 AI 服务凭据
///
/// 启动时解析一次，注入到对应客户端的构造函数。
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub base_url: String,
}

impl ProviderConfig {
    /// 取出 API Key，为空时报错
    pub fn require_api_key(&self, section: &'static str) -> Result<&str, ConfigError> {
        if self.api_key.trim().is_empty() {
            Err(ConfigError::MissingCredential {
                section,
                key: "api_key",
            })
        } else {
            Ok(&self.api_key)
        }
    }
}

/// 持久化存储（Supabase）配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub service_key: String,
    pub items_table: String,
    pub questions_table: String,
    pub audio_bucket: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            service_key: String::new(),
            items_table: "videos".to_string(),
            questions_table: "new_questions".to_string(),
            audio_bucket: "audio-files".to_string(),
        }
    }
}

/// 视频渲染后端配置
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// 渲染后端地址，未配置时只生成占位地址
    pub backend_url: Option<String>,
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时处理的条目数量
    pub max_concurrent_items: usize,
    /// 渲染调用的硬超时（秒）
    pub render_timeout_secs: u64,
    /// 其他 HTTP 调用的超时（秒）
    pub request_timeout_secs: u64,
    pub store: StoreConfig,
    /// 脚本生成（OpenAI 兼容接口）
    pub script: ProviderConfig,
    /// 语音合成
    pub speech: ProviderConfig,
    pub renderer: RendererConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_items: 4,
            render_timeout_secs: 300,
            request_timeout_secs: 60,
            store: StoreConfig::default(),
            script: ProviderConfig {
                model_id: "gemini-2.0-flash-exp".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
                ..Default::default()
            },
            speech: ProviderConfig {
                voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
                model_id: "eleven_monolingual_v1".to_string(),
                base_url: "https://api.elevenlabs.io".to_string(),
                ..Default::default()
            },
            renderer: RendererConfig::default(),
        }
    }
}

impl Config {
    /// 加载配置：默认值 → 配置文件 → 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_VAR).ok();
        let path = explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

        let base = if explicit.is_some() || Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        base.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// 从 TOML 文件加载，缺失的字段使用默认值
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖配置
    ///
    /// `lookup` 便于测试时注入变量表。
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("MAX_CONCURRENT_ITEMS") {
            self.max_concurrent_items = parse_var("MAX_CONCURRENT_ITEMS", &v, "usize")?;
        }
        if let Some(v) = lookup("RENDER_TIMEOUT_SECS") {
            self.render_timeout_secs = parse_var("RENDER_TIMEOUT_SECS", &v, "u64")?;
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", &v, "u64")?;
        }

        let strings: [(&str, &mut String); 9] = [
            ("SUPABASE_URL", &mut self.store.url),
            ("SUPABASE_SERVICE_ROLE_KEY", &mut self.store.service_key),
            ("SCRIPT_API_KEY", &mut self.script.api_key),
            ("SCRIPT_MODEL_ID", &mut self.script.model_id),
            ("SCRIPT_BASE_URL", &mut self.script.base_url),
            ("SPEECH_API_KEY", &mut self.speech.api_key),
            ("SPEECH_VOICE_ID", &mut self.speech.voice_id),
            ("SPEECH_MODEL_ID", &mut self.speech.model_id),
            ("SPEECH_BASE_URL", &mut self.speech.base_url),
        ];
        for (key, slot) in strings {
            if let Some(v) = lookup(key) {
                *slot = v;
            }
        }

        if let Some(v) = lookup("RENDER_BACKEND_URL") {
            self.renderer.backend_url = Some(v).filter(|url| !url.trim().is_empty());
        }

        Ok(self)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(
    var_name: &str,
    value: &str,
    expected_type: &str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: expected_type.to_string(),
        })
}
