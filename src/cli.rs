//! Command-line interface.

use crate::config::Config;
use crate::heartbeat::{ExecuteFn, HeartbeatService, NotifyFn};
use crate::memory::{ConsolidationDisposition, MemoryStore};
use crate::providers::{ChatMessage, create_provider};
use crate::session::Session;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "vigilia", version, about = "Agent liveness and memory daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the heartbeat loop until interrupted
    Run,
    /// Fire a single heartbeat cycle immediately and exit
    Trigger,
    /// Consolidate a recorded session transcript into long-term memory
    Consolidate {
        /// Path to a JSONL transcript (one message object per line)
        #[arg(long)]
        transcript: PathBuf,
    },
    /// Print the resolved configuration and workspace paths
    Status,
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Command::Run => run(config).await,
        Command::Trigger => trigger(config).await,
        Command::Consolidate { transcript } => consolidate(config, &transcript).await,
        Command::Status => status(&config),
    }
}

fn build_service(config: &Config) -> Arc<HeartbeatService> {
    let provider = create_provider(config);
    let model = config.default_model.clone();

    let execute_provider = Arc::clone(&provider);
    let execute_model = model.clone();
    let on_execute: ExecuteFn = Arc::new(move |tasks: String| {
        let provider = Arc::clone(&execute_provider);
        let model = execute_model.clone();
        Box::pin(async move {
            let messages = vec![
                ChatMessage::system(
                    "You are an autonomous agent working through your periodic task list. \
                     Complete the tasks and report the outcome concisely.",
                ),
                ChatMessage::user(tasks),
            ];
            let response = provider
                .chat(&messages, &[], &model)
                .await
                .context("task execution request failed")?;
            Ok(response.text)
        })
    });

    let on_notify: NotifyFn = Arc::new(|result: String| {
        Box::pin(async move {
            tracing::info!("heartbeat result ready");
            println!("{result}");
            Ok(())
        })
    });

    Arc::new(
        HeartbeatService::new(
            &config.workspace_dir,
            provider,
            &config.default_model,
            &config.heartbeat,
        )
        .on_execute(on_execute)
        .on_notify(on_notify),
    )
}

async fn run(config: Config) -> Result<()> {
    let service = build_service(&config);
    service.ensure_trigger_file().await?;

    if !service.start() {
        tracing::warn!(
            "heartbeat is disabled; enable it in {} to run the loop",
            config.config_path.display()
        );
        return Ok(());
    }

    tracing::info!("running until interrupted (ctrl-c to stop)");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    service.stop();
    Ok(())
}

async fn trigger(config: Config) -> Result<()> {
    let service = build_service(&config);
    service.ensure_trigger_file().await?;

    match service.trigger_now().await? {
        Some(result) if !result.is_empty() => {}
        Some(_) => println!("Tasks executed; no output produced."),
        None => println!("Nothing to do."),
    }
    Ok(())
}

async fn consolidate(config: Config, transcript: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(transcript)
        .await
        .with_context(|| format!("failed to read transcript {}", transcript.display()))?;
    let session = Session::from_jsonl(&content)?;

    let provider = create_provider(&config);
    let store = MemoryStore::new(&config.workspace_dir);
    let disposition = store
        .consolidate(
            &session,
            provider.as_ref(),
            &config.default_model,
            config.memory.memory_window,
        )
        .await?;

    match disposition {
        ConsolidationDisposition::Consolidated => {
            println!("Consolidated into {}", store.snapshot_path().display());
        }
        ConsolidationDisposition::SkippedNotDue => {
            println!(
                "Session has {} messages; consolidation runs at {} or more.",
                session.messages.len(),
                config.memory.memory_window
            );
        }
        ConsolidationDisposition::NoToolCall => {
            println!("Model produced no save_memory call; nothing written.");
        }
    }
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    println!("config:    {}", config.config_path.display());
    println!("workspace: {}", config.workspace_dir.display());
    println!("api base:  {}", config.api_base);
    println!("model:     {}", config.default_model);
    println!(
        "heartbeat: {} (every {} min)",
        if config.heartbeat.enabled {
            "enabled"
        } else {
            "disabled"
        },
        config.heartbeat.interval_minutes
    );
    println!("memory window: {} messages", config.memory.memory_window);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn consolidate_requires_transcript() {
        let parsed = Cli::try_parse_from(["vigilia", "consolidate"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from(["vigilia", "consolidate", "--transcript", "s.jsonl"]);
        assert!(parsed.is_ok());
    }
}
