//! `sitewright chat` — interactive session, one agent turn per input line.

use sitewright_agent::Session;
use sitewright_core::event::AgentEvent;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use super::{Overrides, build_agent, load_config};

pub async fn run(overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let agent = Arc::new(build_agent(&config)?);

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║       Sitewright Agent — Interactive Mode    ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:   {}", config.provider);
    println!("  Model:      {}", config.model);
    println!("  Tools:      {}", agent.tools().names().join(", "));
    println!("  Workspace:  {}", config.workspace.root.display());
    println!("  Max steps:  {}", agent.max_steps());
    println!();
    println!("  Type your task and press Enter.");
    println!("  Type 'exit' or 'quit' (or Ctrl+D) to leave.");
    println!();

    let mut events = agent.event_bus().subscribe();
    let progress = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = describe(&event) {
                        eprintln!("  {line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress printer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut session = Session::new(agent);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        match session.run(input).await {
            Ok(outcome) => {
                println!();
                match outcome.result {
                    Some(result) if outcome.is_final => {
                        for line in result.summary.lines() {
                            println!("  Sitewright > {line}");
                        }
                        if !result.artifacts.is_empty() {
                            println!("  Artifacts:   {}", result.artifacts.join(", "));
                        }
                        if let Some(notes) = result.notes {
                            println!("  Notes:       {notes}");
                        }
                    }
                    _ => println!("  Sitewright > step budget exhausted without a final answer"),
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    progress.abort();
    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// One progress line for an agent event, if it is worth showing.
fn describe(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::ModelReplied { step, tokens_used, .. } => Some(match tokens_used {
            Some(tokens) => format!("[step {step}] model replied ({tokens} tokens)"),
            None => format!("[step {step}] model replied"),
        }),
        AgentEvent::ToolExecuted {
            step,
            tool_name,
            success,
            duration_ms,
            error,
            ..
        } => Some(if *success {
            format!("[step {step}] {tool_name} ok ({duration_ms} ms)")
        } else {
            format!(
                "[step {step}] {tool_name} failed: {}",
                error.as_deref().unwrap_or("unknown error")
            )
        }),
        AgentEvent::UnknownTool { step, tool_name, .. } => {
            Some(format!("[step {step}] unknown tool '{tool_name}'"))
        }
        AgentEvent::NoDirective { step, .. } => Some(format!("[step {step}] no directive in reply")),
        AgentEvent::TurnStarted { .. } | AgentEvent::Finished { .. } | AgentEvent::StepsExhausted { .. } => None,
    }
}
