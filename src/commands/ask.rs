use anyhow::Result;
use colored::Colorize;
use perplexity_assistant::agent::{AskRequest, PerplexityAgent};
use perplexity_assistant::config;
use perplexity_assistant::host::memory::{
    JsonStateStore, RecordingDispatcher, RecordingEventBus, StaticEntityDirectory,
    StaticUserDirectory,
};
use perplexity_assistant::host::HostContext;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Arguments of the ask command
pub struct AskArgs {
    pub prompt: String,
    pub model: Option<String>,
    pub web_search: bool,
    pub no_actions: bool,
    pub force_actions: bool,
    pub entities: Option<PathBuf>,
}

/// Execute the ask command
///
/// Runs one prompt through the agent against standalone host adapters:
/// suggested actions are recorded and printed instead of executed.
pub async fn execute(config_path: &Path, state_file: &Path, args: AskArgs) -> Result<()> {
    let cfg = config::load_config(config_path)?;

    let entities = match &args.entities {
        Some(path) => StaticEntityDirectory::from_file(path)?,
        None => StaticEntityDirectory::default(),
    };
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let host = HostContext {
        entities: Arc::new(entities),
        services: dispatcher.clone(),
        states: Arc::new(JsonStateStore::open(state_file)),
        users: Arc::new(StaticUserDirectory::default()),
        events: Arc::new(RecordingEventBus::new()),
    };

    let agent = PerplexityAgent::new(host, &cfg, reqwest::Client::new()).await;
    info!(agent = agent.name(), "Sending prompt");

    let request = AskRequest {
        prompt: args.prompt,
        model: args.model,
        enable_websearch: args.web_search,
        execute_actions: !args.no_actions,
        force_actions_execution: args.force_actions,
    };
    let result = agent.ask(request).await;
    let reply = &result.reply;

    if reply.is_success() {
        println!("{}", reply.reply_text.green().bold());
    } else {
        println!("{}", reply.reply_text.red().bold());
        if let Some(error) = &reply.error {
            println!("  {}: {}", "Detail".dimmed(), error);
        }
    }
    println!();

    if let Some(model) = &result.model {
        println!("  {}: {}", "Model".cyan(), model);
    }
    println!("  {}: ${:.4}", "Cost".cyan(), reply.cost);

    if !reply.actions.is_empty() {
        println!("  {}:", "Suggested actions".cyan());
        for action in &reply.actions {
            println!("    {}", action);
        }
    }

    let calls = dispatcher.calls();
    if !calls.is_empty() {
        println!("  {}:", "Dispatched".cyan());
        for call in calls {
            println!(
                "    {} {}",
                call.to_string().yellow(),
                serde_json::Value::Object(call.data)
            );
        }
    }

    let costs = agent.costs().snapshot();
    println!(
        "  {}: ${:.4} this month, ${:.4} in total",
        "Bill".cyan(),
        costs.monthly,
        costs.all_time
    );

    Ok(())
}
