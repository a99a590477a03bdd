use chrono::{DateTime, Local};

use crate::config::Language;

/// Placeholder sent instead of the entities summary when access is disabled
pub const ENTITIES_ACCESS_DENIED: &str = "Access not allowed.";

/// Caller name used when the conversation carries no resolvable user
pub const UNKNOWN_USER: &str = "UNKNOWN";

/// Fixed assistant-behavior preamble, always the first system message
pub const SYSTEM_PROMPT: &str = "
    You are an assistant integrated with Home Assistant, a smart home automation platform.
    Your purpose is to help users manage and control their smart home devices.
    - Be polite, concise, and clear: responses must be one sentence or under 20 words.
    - Use plain, natural language. Do not include code, markdown, or any unsafe, unethical, or illegal content.
    - Always prioritize local Home Assistant context when generating responses.

    Home Assistant overview:
    - Manages entities such as lights, thermostats, sensors, and other connected devices.
    - Performs actions (e.g., turn on/off, set values).
    - Supports automations and routines for smart home control.
    - Provides a user-friendly interface for managing devices and automations.
    - Has extensive documentation and community support.

    Behavioral rules:
    - Only provide advice or explanations when explicitly requested by the user.
    - Ensure all information is accurate. If unsure, say you don't know.
    - For time-sensitive data older than one week, warn that it may be outdated and include the data's date.
    - Cite source names only for rare or hard-to-verify facts. Never use numeric citations (e.g., [1], [2]).
    - Always reply in the user's language (default: English).

    When the user requests an action:
    - Actions follow a VERB + ENTITY TYPE format (e.g., \"turn on the living room light\", \"set the thermostat to 22°C\", \"start coffee machine\").
    - Multiple actions can be included in a single request.
    - Skip any unsafe or invalid actions.
    - If you can locate the exact room where the user is based on their requests, with a high level of confidence, add an action to send the response through the speakers.
";

/// Everything the status block reports about the current turn
#[derive(Debug, Clone)]
pub struct StatusContext<'a> {
    pub now: DateTime<Local>,
    pub host_version: &'a str,
    /// Entities summary, or [`ENTITIES_ACCESS_DENIED`]
    pub entities: &'a str,
    pub agent_name: &'a str,
    pub vocal_notifications: bool,
    pub actions_on_entities: bool,
    pub user_name: &'a str,
    pub language: Language,
}

/// Second system message: situational facts for this turn
pub fn status_block(ctx: &StatusContext<'_>) -> String {
    format!(
        "
            DATE & TIME: {}
            HOME ASSISTANT VERSION: {}
            ENTITIES: {}
            YOUR NAME IS {}
            AUTHORIZATIONS
                - enable_vocal_notifications={}
                - enable_actions_on_entities={}
            USER NAME: {}
            USER LANGUAGE: {}
            ",
        ctx.now.format("%Y-%m-%d %H:%M:%S%.6f"),
        ctx.host_version,
        ctx.entities,
        ctx.agent_name,
        ctx.vocal_notifications,
        ctx.actions_on_entities,
        ctx.user_name,
        ctx.language,
    )
}

/// User turn carrying the user's own system prompt next to the request
pub fn user_message(custom_system_prompt: &str, prompt: &str) -> String {
    format!(
        "USER SYSTEM PROMPT: {} | USER PROMPT: {}",
        custom_system_prompt, prompt
    )
}
