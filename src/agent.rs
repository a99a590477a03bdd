//! Conversation adapter.
//!
//! [`PerplexityAgent`] is what the host talks to: the conversation protocol
//! (`process`) and the dedicated `ask` command. Each call reads the current
//! options once, so an options update never affects a call already running.

use arc_swap::ArcSwap;
use chrono::Local;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    config::{AppConfig, AssistantOptions, HostSettings, Language},
    cost::CostTracker,
    error::AppError,
    host::HostContext,
    models::perplexity::ChatMessage,
    processor::{ProcessedReply, ResponseProcessor},
    prompt::{self, StatusContext, ENTITIES_ACCESS_DENIED, UNKNOWN_USER},
    providers::perplexity::{build_request, PerplexityClient},
    summary::EntitiesSummarizer,
};

pub const ATTRIBUTION: &str = "Created by Pekul & Powered by Perplexity AI";
pub const NO_PROMPT_MESSAGE: &str = "No prompt provided.";
/// Event fired after every `ask` call
pub const RESPONSE_EVENT: &str = "perplexity_assistant_response";

/// Payload of the `ask` command
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AskRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub enable_websearch: bool,
    #[serde(default = "default_true")]
    pub execute_actions: bool,
    #[serde(default)]
    pub force_actions_execution: bool,
}

fn default_true() -> bool {
    true
}

impl AskRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            enable_websearch: false,
            execute_actions: true,
            force_actions_execution: false,
        }
    }
}

/// Structured result of the `ask` command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskResult {
    pub prompt: String,
    /// Model the request was sent to, `None` when nothing was sent
    pub model: Option<String>,
    #[serde(flatten)]
    pub reply: ProcessedReply,
}

/// One user turn as delivered by the host conversation protocol
#[derive(Debug, Clone, Default)]
pub struct ConversationInput {
    pub text: String,
    /// Host user id of the caller, if known
    pub user_id: Option<String>,
    pub conversation_id: Option<String>,
}

impl ConversationInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Speech reply handed back to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationResult {
    pub speech: String,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Per-call knobs shared by `ask` and `process`
struct Turn<'a> {
    prompt: &'a str,
    user_name: &'a str,
    model_override: Option<&'a str>,
    force_search: bool,
    execute_actions: bool,
    force_execute: bool,
}

pub struct PerplexityAgent {
    host: HostContext,
    settings: HostSettings,
    options: ArcSwap<AssistantOptions>,
    client: PerplexityClient,
    summarizer: EntitiesSummarizer,
    processor: ResponseProcessor,
    costs: Arc<CostTracker>,
}

impl PerplexityAgent {
    /// Build the agent and restore its cost counters from the host state store
    pub async fn new(host: HostContext, config: &AppConfig, http: Client) -> Self {
        crate::metrics::init_metric_descriptions();

        let costs = Arc::new(CostTracker::restore(host.states.clone(), &config.host.entry_id).await);
        let client = PerplexityClient::new(http, &config.api, &config.host.version);
        let summarizer = EntitiesSummarizer::new(host.entities.clone());
        let processor = ResponseProcessor::new(costs.clone(), host.services.clone());

        info!(
            agent = %config.host.agent_name,
            model = %config.options.model,
            endpoint = %client.endpoint(),
            "Perplexity agent ready"
        );

        Self {
            settings: config.host.clone(),
            options: ArcSwap::from_pointee(config.options.clone()),
            client,
            summarizer,
            processor,
            costs,
            host,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.agent_name
    }

    pub fn attribution(&self) -> &'static str {
        ATTRIBUTION
    }

    pub fn supported_languages(&self) -> Vec<&'static str> {
        Language::ALL.iter().map(Language::code).collect()
    }

    pub fn options(&self) -> Arc<AssistantOptions> {
        self.options.load_full()
    }

    /// Replace the options wholesale; calls already running keep the old ones
    pub fn update_options(&self, options: AssistantOptions) {
        info!(model = %options.model, "Perplexity agent options updated");
        self.options.store(Arc::new(options));
    }

    pub fn costs(&self) -> &Arc<CostTracker> {
        &self.costs
    }

    /// Handle the `ask` command. The result is also fired as [`RESPONSE_EVENT`].
    pub async fn ask(&self, request: AskRequest) -> AskResult {
        let result = if request.prompt.is_empty() {
            AskResult {
                prompt: String::new(),
                model: None,
                reply: ProcessedReply::failure(
                    NO_PROMPT_MESSAGE,
                    &AppError::validation("prompt", "empty_prompt"),
                ),
            }
        } else {
            let options = self.options.load_full();
            let model = request
                .model
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| options.model.to_string());

            let turn = Turn {
                prompt: &request.prompt,
                user_name: UNKNOWN_USER,
                model_override: Some(model.as_str()),
                force_search: request.enable_websearch,
                execute_actions: request.execute_actions,
                force_execute: request.force_actions_execution,
            };
            let reply = self.run(&options, turn).await;

            AskResult {
                prompt: request.prompt.clone(),
                model: Some(model),
                reply,
            }
        };

        match serde_json::to_value(&result) {
            Ok(data) => self.host.events.fire(RESPONSE_EVENT, data),
            Err(e) => warn!("Failed to serialize ask result: {}", e),
        }

        result
    }

    /// Handle one turn of the host conversation protocol
    pub async fn process(&self, input: ConversationInput) -> ConversationResult {
        let options = self.options.load_full();

        let user_name = match &input.user_id {
            Some(user_id) => self.host.users.display_name(user_id).await,
            None => None,
        };
        let user_name = user_name.as_deref().unwrap_or(UNKNOWN_USER);

        let turn = Turn {
            prompt: &input.text,
            user_name,
            model_override: None,
            force_search: false,
            execute_actions: true,
            force_execute: false,
        };
        let reply = self.run(&options, turn).await;

        ConversationResult {
            speech: reply.reply_text,
            language: options.language,
            conversation_id: input.conversation_id,
        }
    }

    async fn run(&self, options: &AssistantOptions, turn: Turn<'_>) -> ProcessedReply {
        let raw = self.complete(options, &turn).await;
        self.processor
            .process(raw, options, self.name(), turn.execute_actions, turn.force_execute)
            .await
    }

    /// Build the request for one turn and send it
    async fn complete(&self, options: &AssistantOptions, turn: &Turn<'_>) -> Result<Value, AppError> {
        let entities = if options.allow_entities_access {
            self.summarizer
                .summary(Duration::from_secs(options.entities_summary_refresh_rate))
        } else {
            ENTITIES_ACCESS_DENIED.to_string()
        };

        let status = prompt::status_block(&StatusContext {
            now: Local::now(),
            host_version: &self.settings.version,
            entities: &entities,
            agent_name: self.name(),
            vocal_notifications: options.enable_response_on_speakers,
            actions_on_entities: options.allow_actions_on_entities,
            user_name: turn.user_name,
            language: options.language,
        });

        let messages = vec![ChatMessage::user(prompt::user_message(
            &options.custom_system_prompt,
            turn.prompt,
        ))];
        let request = build_request(options, status, messages, turn.model_override, turn.force_search);

        debug!(model = %request.model, user = turn.user_name, "Asking Perplexity");

        let result = self.client.send(options, &request).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        crate::metrics::record_request(&request.model, outcome);

        result
    }
}
