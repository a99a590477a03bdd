use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    error::AppError,
    host::{ServiceCall, ServiceDispatcher},
    models::perplexity::SuggestedAction,
};

/// Per-call settings that shape how actions are forwarded
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    /// Whether `tts.speak` actions are rewritten for speaker output
    pub speaker_output: bool,
    /// Voice engine entity forced on spoken replies
    pub tts_engine: String,
}

/// Outcome of dispatching a batch of actions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub attempted: usize,
    pub failed: Vec<String>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failed.len()
    }
}

/// Forwards suggested actions to the host dispatcher
pub struct ActionExecutor {
    dispatcher: Arc<dyn ServiceDispatcher>,
}

impl ActionExecutor {
    pub fn new(dispatcher: Arc<dyn ServiceDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Translate one action into the service call the host should receive
    pub fn service_call(
        action: &SuggestedAction,
        reply_text: &str,
        settings: &ExecutionSettings,
    ) -> ServiceCall {
        let mut data = Map::new();

        if action.is_speak() && settings.speaker_output {
            let speaker = action
                .parameter_str("media_player_entity_id")
                .or_else(|| action.parameter_str("entity_id"))
                .unwrap_or(action.target.as_str());
            let message = action.parameter_str("message").unwrap_or(reply_text);

            data.insert("media_player_entity_id".to_string(), Value::String(speaker.to_string()));
            data.insert("message".to_string(), Value::String(message.to_string()));
            data.insert("cache".to_string(), Value::Bool(false));
            data.insert("entity_id".to_string(), Value::String(settings.tts_engine.clone()));
        } else {
            data.insert("entity_id".to_string(), Value::String(action.target.clone()));
            if let Some(parameters) = &action.parameters {
                for (key, value) in parameters {
                    data.insert(key.clone(), value.clone());
                }
            }
        }

        ServiceCall::new(action.domain.clone(), action.service.clone(), data)
    }

    /// Dispatch a single action
    pub async fn execute(
        &self,
        action: &SuggestedAction,
        reply_text: &str,
        settings: &ExecutionSettings,
    ) -> Result<(), AppError> {
        let call = Self::service_call(action, reply_text, settings);
        debug!(
            service = %call,
            target = %action.target,
            "Executing action from Perplexity response"
        );
        self.dispatcher.call(call).await
    }

    /// Dispatch every action in order. A failing action is logged and skipped.
    pub async fn execute_all(
        &self,
        actions: &[SuggestedAction],
        reply_text: &str,
        settings: &ExecutionSettings,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for action in actions {
            report.attempted += 1;
            match self.execute(action, reply_text, settings).await {
                Ok(()) => crate::metrics::record_action(&action.domain, "success"),
                Err(e) => {
                    crate::metrics::record_action(&action.domain, "failure");
                    warn!(
                        "Failed to execute action {}.{} on {}: {}",
                        action.domain, action.service, action.target, e
                    );
                    report.failed.push(format!("{}.{}", action.domain, action.service));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Dispatcher failing for one service and recording every attempt
    struct FlakyDispatcher {
        failing_service: &'static str,
        calls: Mutex<Vec<ServiceCall>>,
    }

    #[async_trait]
    impl ServiceDispatcher for FlakyDispatcher {
        async fn call(&self, call: ServiceCall) -> Result<(), AppError> {
            let fails = call.service == self.failing_service;
            self.calls.lock().unwrap().push(call.clone());
            if fails {
                Err(AppError::dispatch(call.to_string(), "entity not found"))
            } else {
                Ok(())
            }
        }
    }

    fn action(domain: &str, service: &str, target: &str, parameters: Option<Value>) -> SuggestedAction {
        SuggestedAction {
            domain: domain.to_string(),
            service: service.to_string(),
            target: target.to_string(),
            parameters: parameters.map(|p| p.as_object().unwrap().clone()),
        }
    }

    fn settings(speaker_output: bool) -> ExecutionSettings {
        ExecutionSettings {
            speaker_output,
            tts_engine: "tts.piper".to_string(),
        }
    }

    #[test]
    fn test_plain_action_forwarded_verbatim() {
        let a = action("light", "turn_on", "light.kitchen", Some(json!({"brightness": 200})));
        let call = ActionExecutor::service_call(&a, "reply", &settings(true));
        assert_eq!(call.domain, "light");
        assert_eq!(call.service, "turn_on");
        assert_eq!(Value::Object(call.data), json!({"entity_id": "light.kitchen", "brightness": 200}));
    }

    #[test]
    fn test_speak_falls_back_to_target_and_reply() {
        let a = action("tts", "speak", "media_player.living_room", None);
        let call = ActionExecutor::service_call(&a, "The door is locked.", &settings(true));
        assert_eq!(
            Value::Object(call.data),
            json!({
                "media_player_entity_id": "media_player.living_room",
                "message": "The door is locked.",
                "cache": false,
                "entity_id": "tts.piper"
            })
        );
    }

    #[test]
    fn test_speak_parameter_precedence() {
        let a = action(
            "tts",
            "speak",
            "media_player.target",
            Some(json!({"entity_id": "media_player.fallback", "message": "Hello"})),
        );
        let call = ActionExecutor::service_call(&a, "reply", &settings(true));
        assert_eq!(call.data["media_player_entity_id"], "media_player.fallback");
        assert_eq!(call.data["message"], "Hello");

        let a = action(
            "tts",
            "speak",
            "media_player.target",
            Some(json!({"media_player_entity_id": "media_player.explicit", "entity_id": "media_player.fallback"})),
        );
        let call = ActionExecutor::service_call(&a, "reply", &settings(true));
        assert_eq!(call.data["media_player_entity_id"], "media_player.explicit");
        assert_eq!(call.data["message"], "reply");
    }

    #[test]
    fn test_speak_without_speaker_output_is_plain() {
        let a = action("tts", "speak", "media_player.kitchen", None);
        let call = ActionExecutor::service_call(&a, "reply", &settings(false));
        assert_eq!(Value::Object(call.data), json!({"entity_id": "media_player.kitchen"}));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_siblings() {
        let dispatcher = Arc::new(FlakyDispatcher {
            failing_service: "open_cover",
            calls: Mutex::new(Vec::new()),
        });
        let executor = ActionExecutor::new(dispatcher.clone());
        let actions = vec![
            action("light", "turn_on", "light.a", None),
            action("cover", "open_cover", "cover.garage", None),
            action("switch", "turn_off", "switch.fan", None),
        ];

        let report = executor.execute_all(&actions, "ok", &settings(true)).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed, vec!["cover.open_cover".to_string()]);
        assert_eq!(report.succeeded(), 2);

        let calls = dispatcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].to_string(), "switch.turn_off");
    }
}
