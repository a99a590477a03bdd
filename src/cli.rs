use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "perplexity-assistant",
    version,
    about = "Perplexity AI assistant for Home Assistant"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    /// File holding the persisted cost counters
    #[arg(long, default_value = "perplexity_state.json", global = true)]
    pub state_file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Send one prompt to Perplexity
    Ask {
        /// The user prompt
        prompt: String,

        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,

        /// Let Perplexity search the web for this prompt
        #[arg(long)]
        web_search: bool,

        /// Do not dispatch suggested actions
        #[arg(long, conflicts_with = "force_actions")]
        no_actions: bool,

        /// Dispatch suggested actions even when not authorized
        #[arg(long)]
        force_actions: bool,

        /// JSON entity snapshot used as the home context
        #[arg(short, long)]
        entities: Option<PathBuf>,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show the accumulated Perplexity bill
    Costs,

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display current configuration (with secrets masked)
    Show,

    /// Validate configuration file
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_ask() {
        let args = vec!["perplexity-assistant", "ask", "turn on the kitchen light", "--web-search"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Ask {
                prompt,
                model,
                web_search,
                no_actions,
                force_actions,
                entities,
            } => {
                assert_eq!(prompt, "turn on the kitchen light");
                assert!(model.is_none());
                assert!(web_search);
                assert!(!no_actions);
                assert!(!force_actions);
                assert!(entities.is_none());
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_cli_parsing_ask_with_model() {
        let args = vec!["perplexity-assistant", "ask", "hello", "-m", "sonar-pro", "--force-actions"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Ask { model, force_actions, .. } => {
                assert_eq!(model.as_deref(), Some("sonar-pro"));
                assert!(force_actions);
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_cli_rejects_conflicting_action_flags() {
        let args = vec!["perplexity-assistant", "ask", "hello", "--no-actions", "--force-actions"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_cli_parsing_config_show() {
        let args = vec!["perplexity-assistant", "config", "show"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Config { action } => {
                assert!(matches!(action, ConfigCommands::Show));
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_cli_global_paths() {
        let args = vec![
            "perplexity-assistant",
            "costs",
            "--config",
            "custom.toml",
            "--state-file",
            "bill.json",
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.state_file, PathBuf::from("bill.json"));
        assert!(matches!(cli.command, Commands::Costs));
    }
}
