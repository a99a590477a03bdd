use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::{
    actions::{ActionExecutor, ExecutionReport, ExecutionSettings},
    config::AssistantOptions,
    cost::CostTracker,
    error::AppError,
    host::{ServiceCall, ServiceDispatcher},
    models::perplexity::{AssistantReply, ChatCompletionResponse, SuggestedAction},
};

pub const COMMUNICATION_ERROR_MESSAGE: &str = "Error communicating with the Perplexity AI service.";
pub const PROCESSING_ERROR_MESSAGE: &str = "Error processing the Perplexity AI response.";

/// Result of turning one raw completion into something the host can use
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedReply {
    pub reply_text: String,
    /// Internal error detail, `None` on success
    pub error: Option<String>,
    pub cost: f64,
    pub actions: Vec<SuggestedAction>,
    /// Present when actions were dispatched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed: Option<ExecutionReport>,
}

impl ProcessedReply {
    pub fn failure(message: &str, error: &AppError) -> Self {
        Self {
            reply_text: message.to_string(),
            error: Some(error.to_string()),
            cost: 0.0,
            actions: Vec::new(),
            executed: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Parse `choices[0].message.content` of a raw body into the structured reply
pub fn parse_completion(raw: Value) -> Result<(AssistantReply, f64), AppError> {
    let response: ChatCompletionResponse = serde_json::from_value(raw)?;
    let content = response
        .first_content()
        .ok_or_else(|| AppError::InvalidResponse("Response contains no choices".to_string()))?;
    let reply: AssistantReply = serde_json::from_str(content)?;
    Ok((reply, response.total_cost()))
}

/// Render the persistent notification body
pub fn notification_message(reply: &AssistantReply) -> String {
    match reply.actions.as_deref() {
        Some(actions) if !actions.is_empty() => {
            let rendered: Vec<String> = actions.iter().map(ToString::to_string).collect();
            format!("{}\n\n- {}", reply.content, rendered.join("\n- "))
        }
        _ => reply.content.clone(),
    }
}

/// Reacts to a parsed completion: costs, notification, actions
pub struct ResponseProcessor {
    costs: Arc<CostTracker>,
    executor: ActionExecutor,
    services: Arc<dyn ServiceDispatcher>,
}

impl ResponseProcessor {
    pub fn new(costs: Arc<CostTracker>, services: Arc<dyn ServiceDispatcher>) -> Self {
        Self {
            costs,
            executor: ActionExecutor::new(services.clone()),
            services,
        }
    }

    pub async fn process(
        &self,
        raw: Result<Value, AppError>,
        options: &AssistantOptions,
        agent_name: &str,
        execute_actions: bool,
        force_execute: bool,
    ) -> ProcessedReply {
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                error!("Exception while communicating with Perplexity API: {}", e);
                return ProcessedReply::failure(COMMUNICATION_ERROR_MESSAGE, &e);
            }
        };

        let (reply, cost) = match parse_completion(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("Failed to parse Perplexity response: {}", e);
                return ProcessedReply::failure(PROCESSING_ERROR_MESSAGE, &e);
            }
        };

        debug!(cost, content = %reply.content, "Perplexity API has responded successfully");

        self.costs.record(cost).await;

        if options.notify_response {
            self.notify(agent_name, notification_message(&reply));
        }

        let actions = reply.actions.clone().unwrap_or_default();
        let should_execute =
            (execute_actions && !actions.is_empty() && options.allow_actions_on_entities) || force_execute;

        let executed = if should_execute {
            let settings = ExecutionSettings {
                speaker_output: options.enable_response_on_speakers,
                tts_engine: options.tts_engine.clone(),
            };
            Some(self.executor.execute_all(&actions, &reply.content, &settings).await)
        } else {
            None
        };

        ProcessedReply {
            reply_text: reply.content,
            error: None,
            cost,
            actions,
            executed,
        }
    }

    /// Fire-and-forget persistent notification
    fn notify(&self, agent_name: &str, message: String) {
        debug!("Sending notification for Perplexity response");

        let mut data = Map::new();
        data.insert(
            "title".to_string(),
            Value::String(format!("{} (Perplexity Assistant)", agent_name)),
        );
        data.insert("message".to_string(), Value::String(message));
        let call = ServiceCall::new("notify", "persistent_notification", data);

        let services = self.services.clone();
        tokio::spawn(async move {
            if let Err(e) = services.call(call).await {
                warn!("Failed to send Perplexity notification: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_api_key;
    use crate::host::memory::{JsonStateStore, RecordingDispatcher};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    fn completion(reply: Value, cost: f64) -> Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": reply.to_string()}}],
            "usage": {"cost": {"total_cost": cost}}
        })
    }

    fn create_test_options() -> AssistantOptions {
        AssistantOptions {
            api_key: test_api_key(),
            ..AssistantOptions::default()
        }
    }

    async fn create_processor() -> (ResponseProcessor, Arc<RecordingDispatcher>, Arc<CostTracker>) {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let costs = Arc::new(CostTracker::restore(Arc::new(JsonStateStore::in_memory()), "entry").await);
        let processor = ResponseProcessor::new(costs.clone(), dispatcher.clone());
        (processor, dispatcher, costs)
    }

    #[tokio::test]
    async fn test_error_marker_yields_zero_cost() {
        let (processor, dispatcher, costs) = create_processor().await;
        let raw = Err(AppError::UpstreamError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "boom".to_string(),
        });

        let result = processor.process(raw, &create_test_options(), "Jarvis", true, true).await;

        assert_eq!(result.reply_text, COMMUNICATION_ERROR_MESSAGE);
        assert_eq!(result.cost, 0.0);
        assert!(result.error.unwrap().contains("500"));
        assert!(dispatcher.calls().is_empty());
        assert_eq!(costs.all_time_total(), 0.0);
    }

    #[tokio::test]
    async fn test_invalid_payload() {
        let (processor, _, _) = create_processor().await;
        let raw = Ok(json!({
            "choices": [{"message": {"role": "assistant", "content": "plain text, not JSON"}}]
        }));

        let result = processor.process(raw, &create_test_options(), "Jarvis", true, false).await;
        assert_eq!(result.reply_text, PROCESSING_ERROR_MESSAGE);
        assert!(result.error.is_some());
        assert_eq!(result.cost, 0.0);

        let result = processor
            .process(Ok(json!({"choices": []})), &create_test_options(), "Jarvis", true, false)
            .await;
        assert_eq!(result.reply_text, PROCESSING_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_success_records_cost_and_executes_actions() {
        let (processor, dispatcher, costs) = create_processor().await;
        let raw = Ok(completion(
            json!({
                "content": "Turning on the lights.",
                "actions": [
                    {"domain": "light", "service": "turn_on", "target": "light.kitchen", "parameters": null},
                    {"domain": "light", "service": "turn_on", "target": "light.hall", "parameters": {"brightness": 50}}
                ]
            }),
            0.0125,
        ));

        let result = processor.process(raw, &create_test_options(), "Jarvis", true, false).await;

        assert!(result.is_success());
        assert_eq!(result.reply_text, "Turning on the lights.");
        assert_eq!(result.cost, 0.0125);
        assert_eq!(result.actions.len(), 2);
        assert_eq!(result.executed.unwrap().attempted, 2);
        assert_eq!(dispatcher.calls().len(), 2);
        assert_eq!(costs.all_time_total(), 0.0125);
    }

    #[tokio::test]
    async fn test_null_cost_keeps_reply() {
        let (processor, _, costs) = create_processor().await;
        let raw = Ok(json!({
            "choices": [{"message": {"role": "assistant", "content": json!({"content": "It is 21 degrees."}).to_string()}}],
            "usage": {"cost": {"total_cost": null}}
        }));

        let result = processor.process(raw, &create_test_options(), "Jarvis", true, false).await;

        assert!(result.is_success());
        assert_eq!(result.reply_text, "It is 21 degrees.");
        assert_eq!(result.cost, 0.0);
        assert_eq!(costs.all_time_total(), 0.0);
    }

    #[tokio::test]
    async fn test_actions_not_executed_without_authorization() {
        let (processor, dispatcher, _) = create_processor().await;
        let mut options = create_test_options();
        options.allow_actions_on_entities = false;
        let reply = json!({
            "content": "ok",
            "actions": [{"domain": "light", "service": "turn_off", "target": "light.a", "parameters": null}]
        });

        let result = processor
            .process(Ok(completion(reply.clone(), 0.0)), &options, "Jarvis", true, false)
            .await;
        assert!(result.executed.is_none());
        assert!(dispatcher.calls().is_empty());

        // execute_actions=false is honored even when authorized
        let result = processor
            .process(Ok(completion(reply.clone(), 0.0)), &create_test_options(), "Jarvis", false, false)
            .await;
        assert!(result.executed.is_none());

        // force overrides both
        let result = processor
            .process(Ok(completion(reply, 0.0)), &options, "Jarvis", false, true)
            .await;
        assert_eq!(result.executed.unwrap().attempted, 1);
        assert_eq!(dispatcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_sent() {
        let (processor, dispatcher, _) = create_processor().await;
        let mut options = create_test_options();
        options.notify_response = true;
        options.allow_actions_on_entities = false;
        let reply = json!({
            "content": "Done.",
            "actions": [{"domain": "lock", "service": "lock", "target": "lock.front", "parameters": null}]
        });

        processor
            .process(Ok(completion(reply, 0.0)), &options, "Jarvis", true, false)
            .await;

        // The notification runs on a detached task
        let mut calls = dispatcher.calls();
        for _ in 0..50 {
            if !calls.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            calls = dispatcher.calls();
        }

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to_string(), "notify.persistent_notification");
        assert_eq!(calls[0].data["title"], "Jarvis (Perplexity Assistant)");
        assert_eq!(
            calls[0].data["message"],
            "Done.\n\n- ACTION: lock.lock > lock.front > {}"
        );
    }

    #[test]
    fn test_notification_message_without_actions() {
        let reply = AssistantReply {
            content: "Hello".to_string(),
            actions: Some(vec![]),
        };
        assert_eq!(notification_message(&reply), "Hello");
    }
}
