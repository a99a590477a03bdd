use anyhow::Result;
use colored::Colorize;
use perplexity_assistant::config::{self, AppConfig};
use perplexity_assistant::logging::mask_api_key;
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the current configuration with the API key masked
pub fn show(path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!(path = %path.display(), "Loading configuration for display");

    let cfg = config::load_config(path)?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
pub fn validate(path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!(path = %path.display(), "Validating configuration file");

    let cfg = config::load_config(path)?;
    let options = &cfg.options;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  {}: {}", "Agent".cyan(), cfg.host.agent_name);
    println!("  {}: {} ({})", "Model".cyan(), options.model.label(), options.model);
    println!("  {}: {}", "Language".cyan(), options.language.label());
    println!("  {}: {}", "Endpoint".cyan(), cfg.api.base_url);
    println!(
        "  {}: max_tokens={} creativity={} diversity={} frequency_penalty={}",
        "Sampling".cyan(),
        options.max_tokens,
        options.creativity,
        options.diversity,
        options.frequency_penalty
    );
    println!();
    println!("{}", "Authorizations:".cyan());
    print_toggle("Entities access", options.allow_entities_access);
    print_toggle("Actions on entities", options.allow_actions_on_entities);
    print_toggle("Response on speakers", options.enable_response_on_speakers);
    print_toggle("Notify response", options.notify_response);
    print_toggle("Web search", options.enable_web_search);

    info!("Configuration validation successful");
    Ok(())
}

fn print_toggle(name: &str, enabled: bool) {
    let status = if enabled {
        "enabled".green()
    } else {
        "disabled".red()
    };
    println!("    {}: {}", name, status);
}

/// Copy of the configuration that is safe to print
fn sanitize_secrets(cfg: &AppConfig) -> AppConfig {
    let mut sanitized = cfg.clone();
    sanitized.options.api_key = mask_api_key(&sanitized.options.api_key);
    sanitized
}
