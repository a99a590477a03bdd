use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use perplexity_assistant::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    init_tracing();

    match args.command {
        cli::Commands::Ask {
            prompt,
            model,
            web_search,
            no_actions,
            force_actions,
            entities,
        } => {
            let ask = commands::ask::AskArgs {
                prompt,
                model,
                web_search,
                no_actions,
                force_actions,
                entities,
            };
            commands::ask::execute(&args.config, &args.state_file, ask).await?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
        },
        cli::Commands::Costs => {
            commands::costs::execute(&args.config, &args.state_file).await?;
        }
        cli::Commands::Version => {
            println!("Perplexity Assistant v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
