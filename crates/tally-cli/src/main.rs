use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tally_cli::commands::{self, export, import, status, tag, task};
use tally_cli::{Cli, Commands, Config, TagAction, TaskAction};

/// Wall-clock milliseconds; the engine itself never reads the clock.
fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    let now = now_ms();

    match &cli.command {
        Some(Commands::Task { action }) => match action {
            TaskAction::Add { name, link, tags } => {
                let mut workspace = commands::load_workspace(&config)?;
                let id = task::add(&mut workspace, name, link.clone(), tags)?;
                commands::save_workspace(&config, &workspace, now);
                println!("created task [{id}] {name}");
            }
            TaskAction::Toggle { id } => {
                let mut workspace = commands::load_workspace(&config)?;
                let running = task::toggle(&mut workspace, *id, now)?;
                commands::save_workspace(&config, &workspace, now);
                if running {
                    println!("started task [{id}]");
                } else {
                    println!("stopped task [{id}]");
                }
            }
            TaskAction::Tags { id, set } => {
                let mut workspace = commands::load_workspace(&config)?;
                task::set_tags(&mut workspace, *id, set, now)?;
                commands::save_workspace(&config, &workspace, now);
                println!("updated tags on task [{id}]");
            }
            TaskAction::Rm { id } => {
                let mut workspace = commands::load_workspace(&config)?;
                task::rm(&mut workspace, *id, now)?;
                commands::save_workspace(&config, &workspace, now);
                println!("deleted task [{id}]");
            }
            TaskAction::Restore { id } => {
                let mut workspace = commands::load_workspace(&config)?;
                task::restore(&mut workspace, *id)?;
                commands::save_workspace(&config, &workspace, now);
                println!("restored task [{id}]");
            }
            TaskAction::Purge { id } => {
                let mut workspace = commands::load_workspace(&config)?;
                task::purge(&mut workspace, *id)?;
                commands::save_workspace(&config, &workspace, now);
                println!("purged task [{id}] and its sessions");
            }
            TaskAction::List { all } => {
                let workspace = commands::load_workspace(&config)?;
                task::list(&mut std::io::stdout(), &workspace, *all, now)?;
            }
        },
        Some(Commands::Tag { action }) => match action {
            TagAction::Add { name } => {
                let mut workspace = commands::load_workspace(&config)?;
                let id = tag::add(&mut workspace, name)?;
                commands::save_workspace(&config, &workspace, now);
                println!("created tag [{id}] {name}");
            }
            TagAction::Rm { id } => {
                let mut workspace = commands::load_workspace(&config)?;
                tag::rm(&mut workspace, *id, now)?;
                commands::save_workspace(&config, &workspace, now);
                println!("deleted tag [{id}]");
            }
            TagAction::Restore { id } => {
                let mut workspace = commands::load_workspace(&config)?;
                tag::restore(&mut workspace, *id, now)?;
                commands::save_workspace(&config, &workspace, now);
                println!("restored tag [{id}]");
            }
            TagAction::Purge { id } => {
                let mut workspace = commands::load_workspace(&config)?;
                tag::purge(&mut workspace, *id)?;
                commands::save_workspace(&config, &workspace, now);
                println!("purged tag [{id}] and its sessions");
            }
            TagAction::List { all } => {
                let workspace = commands::load_workspace(&config)?;
                tag::list(&mut std::io::stdout(), &workspace, *all, now)?;
            }
        },
        Some(Commands::Status) => {
            let workspace = commands::load_workspace(&config)?;
            status::run(&mut std::io::stdout(), &workspace, now)?;
        }
        Some(Commands::Export { dir }) => {
            let workspace = commands::load_workspace(&config)?;
            export::run(&workspace, dir)?;
            println!("exported backup to {}", dir.display());
        }
        Some(Commands::Import { dir, files }) => {
            let current = commands::load_workspace(&config)?;
            let workspace = import::run(&current, dir.as_deref(), files, now)?;
            commands::save_workspace(&config, &workspace, now);
            println!(
                "imported {} tasks and {} tags",
                workspace.tasks.len(),
                workspace.tags.len()
            );
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
