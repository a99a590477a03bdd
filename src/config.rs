use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::AppError;

pub const API_KEY_PREFIX: &str = "pplx-";
pub const API_KEY_LENGTH: usize = 53;
pub const CUSTOM_SYSTEM_PROMPT_MAX_CHARS: usize = 250;
pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_TTS_ENGINE: &str = "tts.piper";

/// Top-level configuration loaded by the binary
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub options: AssistantOptions,
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub api: ApiSettings,
}

/// Options of one configured assistant instance.
///
/// This is the flat record the setup wizard produces and the options flow
/// edits. Every field has a default so partially filled entries deserialize.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssistantOptions {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Model,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub custom_system_prompt: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_creativity")]
    pub creativity: f32,
    /// Nucleus sampling threshold (top_p)
    #[serde(default = "default_diversity")]
    pub diversity: f32,
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f32,

    #[serde(default = "default_true")]
    pub allow_entities_access: bool,
    #[serde(default = "default_true")]
    pub allow_actions_on_entities: bool,
    #[serde(default = "default_true")]
    pub enable_response_on_speakers: bool,
    #[serde(default)]
    pub notify_response: bool,
    #[serde(default)]
    pub enable_web_search: bool,

    /// Seconds an entities summary stays valid
    #[serde(default = "default_refresh_rate")]
    pub entities_summary_refresh_rate: u64,
    #[serde(default = "default_tts_engine")]
    pub tts_engine: String,
}

impl Default for AssistantOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: Model::default(),
            language: Language::default(),
            custom_system_prompt: String::new(),
            max_tokens: default_max_tokens(),
            creativity: default_creativity(),
            diversity: default_diversity(),
            frequency_penalty: default_frequency_penalty(),
            allow_entities_access: true,
            allow_actions_on_entities: true,
            enable_response_on_speakers: true,
            notify_response: false,
            enable_web_search: false,
            entities_summary_refresh_rate: default_refresh_rate(),
            tts_engine: default_tts_engine(),
        }
    }
}

/// Facts about the host the assistant runs inside
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostSettings {
    /// Display name of the configured entry, also the assistant's name
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    #[serde(default = "default_host_version")]
    pub version: String,
    #[serde(default = "default_entry_id")]
    pub entry_id: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            version: default_host_version(),
            entry_id: default_entry_id(),
        }
    }
}

/// Remote endpoint settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// No timeout is applied when unset
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Model {
    #[default]
    Sonar,
    SonarPro,
    SonarReasoning,
    SonarReasoningPro,
    SonarDeepResearch,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Sonar => "sonar",
            Model::SonarPro => "sonar-pro",
            Model::SonarReasoning => "sonar-reasoning",
            Model::SonarReasoningPro => "sonar-reasoning-pro",
            Model::SonarDeepResearch => "sonar-deep-research",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Model::Sonar => "Sonar",
            Model::SonarPro => "Sonar Pro",
            Model::SonarReasoning => "Sonar Reasoning",
            Model::SonarReasoningPro => "Sonar Reasoning Pro",
            Model::SonarDeepResearch => "Sonar Deep Research",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
    Es,
    De,
    It,
    Pt,
    Nl,
    Zh,
    Ja,
    Ko,
}

impl Language {
    pub const ALL: [Language; 10] = [
        Language::En,
        Language::Fr,
        Language::Es,
        Language::De,
        Language::It,
        Language::Pt,
        Language::Nl,
        Language::Zh,
        Language::Ja,
        Language::Ko,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Es => "es",
            Language::De => "de",
            Language::It => "it",
            Language::Pt => "pt",
            Language::Nl => "nl",
            Language::Zh => "zh",
            Language::Ja => "ja",
            Language::Ko => "ko",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Fr => "Français",
            Language::Es => "Español",
            Language::De => "Deutsch",
            Language::It => "Italiano",
            Language::Pt => "Português",
            Language::Nl => "Nederlands",
            Language::Zh => "中文",
            Language::Ja => "日本語",
            Language::Ko => "한국어",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

fn default_max_tokens() -> u32 {
    500
}

fn default_creativity() -> f32 {
    0.9
}

fn default_diversity() -> f32 {
    0.95
}

fn default_frequency_penalty() -> f32 {
    0.5
}

fn default_true() -> bool {
    true
}

fn default_refresh_rate() -> u64 {
    10
}

fn default_tts_engine() -> String {
    DEFAULT_TTS_ENGINE.to_string()
}

fn default_agent_name() -> String {
    "Perplexity Assistant".to_string()
}

fn default_host_version() -> String {
    "unknown".to_string()
}

fn default_entry_id() -> String {
    "perplexity_assistant".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Load configuration from a TOML file, overridden by
/// `PERPLEXITY_ASSISTANT__*` environment variables.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("PERPLEXITY_ASSISTANT").separator("__"))
        .build()?;

    let cfg: AppConfig = config.try_deserialize()?;
    validate_options(&cfg.options)?;

    Ok(cfg)
}

/// Check the API key format: fixed prefix, then fixed total length.
pub fn validate_api_key(api_key: &str) -> Result<(), AppError> {
    if !api_key.starts_with(API_KEY_PREFIX) {
        return Err(AppError::validation("api_key", "invalid_api_key"));
    }
    if api_key.chars().count() != API_KEY_LENGTH {
        return Err(AppError::validation("api_key", "invalid_api_key_length"));
    }
    Ok(())
}

pub fn validate_custom_system_prompt(prompt: &str) -> Result<(), AppError> {
    if prompt.chars().count() > CUSTOM_SYSTEM_PROMPT_MAX_CHARS {
        return Err(AppError::validation("custom_system_prompt", "max_length_exceeded"));
    }
    Ok(())
}

pub fn validate_model_parameters(options: &AssistantOptions) -> Result<(), AppError> {
    if !(1..=1000).contains(&options.max_tokens) {
        return Err(AppError::validation("max_tokens", "out_of_range"));
    }
    let unit_ranged = [
        ("creativity", options.creativity),
        ("diversity", options.diversity),
        ("frequency_penalty", options.frequency_penalty),
    ];
    for (field, value) in unit_ranged {
        if !(0.0..=1.0).contains(&value) {
            return Err(AppError::validation(field, "out_of_range"));
        }
    }
    Ok(())
}

pub fn validate_refresh_rate(seconds: u64) -> Result<(), AppError> {
    if !(5..=1800).contains(&seconds) {
        return Err(AppError::validation("entities_summary_refresh_rate", "out_of_range"));
    }
    Ok(())
}

/// Validate a complete options record
pub fn validate_options(options: &AssistantOptions) -> Result<(), AppError> {
    validate_api_key(&options.api_key)?;
    validate_custom_system_prompt(&options.custom_system_prompt)?;
    validate_model_parameters(options)?;
    validate_refresh_rate(options.entities_summary_refresh_rate)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_api_key() -> String {
    format!("{}{}", API_KEY_PREFIX, "a".repeat(API_KEY_LENGTH - API_KEY_PREFIX.len()))
}
