//! Setup wizard and options menu.
//!
//! The host renders the forms; these flows only decide which form comes next,
//! validate what was submitted, and produce the options record to persist.
//! Calling a step with `None` asks for its form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{
    config::{self, AssistantOptions, Language, Model, DEFAULT_TTS_ENGINE},
    error::AppError,
};

/// Field name -> error code, as shown next to the form field
pub type FormErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    /// Options menu
    Init,
    User,
    Api,
    Model,
    ModelParameters,
    Authorization,
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowStep::Init => "init",
            FlowStep::User => "user",
            FlowStep::Api => "api",
            FlowStep::Model => "model",
            FlowStep::ModelParameters => "model_parameters",
            FlowStep::Authorization => "authorization",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    ShowForm {
        step: FlowStep,
        errors: FormErrors,
        last_step: bool,
    },
    CreateEntry {
        title: String,
        options: AssistantOptions,
    },
}

impl FlowResult {
    fn form(step: FlowStep) -> Self {
        Self::ShowForm {
            step,
            errors: FormErrors::new(),
            last_step: false,
        }
    }

    fn last_form(step: FlowStep) -> Self {
        Self::ShowForm {
            step,
            errors: FormErrors::new(),
            last_step: true,
        }
    }

    fn form_error(step: FlowStep, error: AppError) -> Self {
        let mut errors = FormErrors::new();
        match error {
            AppError::Validation { field, code } => {
                errors.insert(field, code);
            }
            other => {
                errors.insert("base".to_string(), other.kind().to_string());
            }
        }
        Self::ShowForm {
            step,
            errors,
            last_step: false,
        }
    }

    pub fn errors(&self) -> Option<&FormErrors> {
        match self {
            Self::ShowForm { errors, .. } => Some(errors),
            Self::CreateEntry { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyInput {
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInput {
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub model: Model,
    #[serde(default)]
    pub custom_system_prompt: String,
    /// Wizard only: detour through the model parameters form
    #[serde(default)]
    pub advanced_configuration: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelParametersInput {
    pub max_tokens: u32,
    pub creativity: f32,
    #[serde(default)]
    pub diversity: Option<f32>,
    #[serde(default)]
    pub frequency_penalty: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationInput {
    #[serde(default)]
    pub allow_entities_access: Option<bool>,
    pub entities_summary_refresh_rate: u64,
    #[serde(default)]
    pub allow_actions_on_entities: Option<bool>,
    #[serde(default)]
    pub enable_response_on_speakers: Option<bool>,
    pub tts_engine: String,
    #[serde(default)]
    pub notify_response: Option<bool>,
    #[serde(default)]
    pub enable_web_search: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuChoice {
    Api,
    Model,
    ModelParameters,
    Authorization,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuInput {
    pub menu: MenuChoice,
}

impl ModelInput {
    fn apply(&self, options: &mut AssistantOptions) -> Result<(), AppError> {
        config::validate_custom_system_prompt(&self.custom_system_prompt)?;
        options.language = self.language;
        options.model = self.model;
        options.custom_system_prompt = self.custom_system_prompt.clone();
        Ok(())
    }
}

impl ModelParametersInput {
    fn apply(&self, options: &mut AssistantOptions) -> Result<(), AppError> {
        let mut candidate = options.clone();
        candidate.max_tokens = self.max_tokens;
        candidate.creativity = self.creativity;
        if let Some(diversity) = self.diversity {
            candidate.diversity = diversity;
        }
        if let Some(penalty) = self.frequency_penalty {
            candidate.frequency_penalty = penalty;
        }
        config::validate_model_parameters(&candidate)?;
        *options = candidate;
        Ok(())
    }
}

impl AuthorizationInput {
    fn apply(&self, options: &mut AssistantOptions) -> Result<(), AppError> {
        config::validate_refresh_rate(self.entities_summary_refresh_rate)?;
        options.entities_summary_refresh_rate = self.entities_summary_refresh_rate;
        options.tts_engine = self.tts_engine.clone();

        let toggles = [
            (self.allow_entities_access, &mut options.allow_entities_access),
            (self.allow_actions_on_entities, &mut options.allow_actions_on_entities),
            (self.enable_response_on_speakers, &mut options.enable_response_on_speakers),
            (self.notify_response, &mut options.notify_response),
            (self.enable_web_search, &mut options.enable_web_search),
        ];
        for (submitted, current) in toggles {
            if let Some(value) = submitted {
                *current = value;
            }
        }
        Ok(())
    }
}

/// Entry title: `Perplexity Assistant - {language}{last 4 chars of key}`
pub fn entry_title(options: &AssistantOptions) -> String {
    let key: Vec<char> = options.api_key.chars().collect();
    let tail: String = key[key.len().saturating_sub(4)..].iter().collect();
    format!("Perplexity Assistant - {}{}", options.language, tail)
}

/// First-time setup: user -> model -> [model_parameters] -> authorization
#[derive(Debug, Clone)]
pub struct ConfigFlow {
    data: AssistantOptions,
}

impl ConfigFlow {
    /// `default_tts_engine` is the host's default voice engine, prefilled in the
    /// authorization form.
    pub fn new(default_tts_engine: Option<&str>) -> Self {
        let data = AssistantOptions {
            tts_engine: default_tts_engine.unwrap_or(DEFAULT_TTS_ENGINE).to_string(),
            ..AssistantOptions::default()
        };
        Self { data }
    }

    /// Values collected so far, used as form defaults
    pub fn data(&self) -> &AssistantOptions {
        &self.data
    }

    pub fn step_user(&mut self, input: Option<ApiKeyInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(FlowStep::User);
        };
        if let Err(e) = config::validate_api_key(&input.api_key) {
            return FlowResult::form_error(FlowStep::User, e);
        }
        self.data.api_key = input.api_key;
        self.step_model(None)
    }

    pub fn step_model(&mut self, input: Option<ModelInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(FlowStep::Model);
        };
        if let Err(e) = input.apply(&mut self.data) {
            return FlowResult::form_error(FlowStep::Model, e);
        }
        if input.advanced_configuration {
            self.step_model_parameters(None)
        } else {
            self.step_authorization(None)
        }
    }

    pub fn step_model_parameters(&mut self, input: Option<ModelParametersInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(FlowStep::ModelParameters);
        };
        if let Err(e) = input.apply(&mut self.data) {
            return FlowResult::form_error(FlowStep::ModelParameters, e);
        }
        self.step_authorization(None)
    }

    pub fn step_authorization(&mut self, input: Option<AuthorizationInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::last_form(FlowStep::Authorization);
        };
        if let Err(e) = input.apply(&mut self.data) {
            return FlowResult::form_error(FlowStep::Authorization, e);
        }
        FlowResult::CreateEntry {
            title: entry_title(&self.data),
            options: self.data.clone(),
        }
    }
}

/// Options menu for an existing entry. Every step saves immediately.
#[derive(Debug, Clone)]
pub struct OptionsFlow {
    current: AssistantOptions,
}

impl OptionsFlow {
    pub fn new(current: AssistantOptions) -> Self {
        Self { current }
    }

    /// Current values, used as form defaults
    pub fn current(&self) -> &AssistantOptions {
        &self.current
    }

    pub fn step_init(&mut self, input: Option<MenuInput>) -> FlowResult {
        match input.map(|i| i.menu) {
            None => FlowResult::form(FlowStep::Init),
            Some(MenuChoice::Api) => self.step_api(None),
            Some(MenuChoice::Model) => self.step_model(None),
            Some(MenuChoice::ModelParameters) => self.step_model_parameters(None),
            Some(MenuChoice::Authorization) => self.step_authorization(None),
        }
    }

    pub fn step_api(&mut self, input: Option<ApiKeyInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(FlowStep::Api);
        };
        if let Err(e) = config::validate_api_key(&input.api_key) {
            return FlowResult::form_error(FlowStep::Api, e);
        }
        self.current.api_key = input.api_key;
        self.save()
    }

    pub fn step_model(&mut self, input: Option<ModelInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(FlowStep::Model);
        };
        if let Err(e) = input.apply(&mut self.current) {
            return FlowResult::form_error(FlowStep::Model, e);
        }
        self.save()
    }

    pub fn step_model_parameters(&mut self, input: Option<ModelParametersInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(FlowStep::ModelParameters);
        };
        if let Err(e) = input.apply(&mut self.current) {
            return FlowResult::form_error(FlowStep::ModelParameters, e);
        }
        self.save()
    }

    pub fn step_authorization(&mut self, input: Option<AuthorizationInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(FlowStep::Authorization);
        };
        if let Err(e) = input.apply(&mut self.current) {
            return FlowResult::form_error(FlowStep::Authorization, e);
        }
        self.save()
    }

    fn save(&self) -> FlowResult {
        FlowResult::CreateEntry {
            title: String::new(),
            options: self.current.clone(),
        }
    }
}
