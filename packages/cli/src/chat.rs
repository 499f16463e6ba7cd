//! Terminal chat with a campaign agent.
//!
//! Keeps one [`CampaignSession`] for the whole conversation and prints
//! the agent's events as they arrive. `/state` prints the session
//! snapshot, `exit` or an empty line ends the chat.

use std::path::PathBuf;

use dialoguer::{Input, Select};
use resonance_agents::Services;
use resonance_agents::registry::{all_agents, find_agent};
use resonance_agents::session::CampaignSession;
use resonance_agents_models::AgentDefinition;
use resonance_ai::AgentEvent;
use resonance_ai::providers::create_provider_from_env;
use tokio::sync::mpsc;
use uuid::Uuid;

fn pick_agent(id: Option<String>) -> Result<AgentDefinition, Box<dyn std::error::Error>> {
    if let Some(id) = id {
        return Ok(find_agent(&id)?);
    }

    let agents = all_agents();
    let labels: Vec<String> = agents
        .iter()
        .map(|a| format!("{} - {}", a.name, a.description))
        .collect();

    let idx = Select::new()
        .with_prompt("Which agent?")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(agents[idx].clone())
}

fn format_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::SessionId { .. } => None,
        AgentEvent::Thinking { message } => Some(format!("  ... {message}")),
        AgentEvent::ToolCall { tool, params } => Some(format!("  -> {tool} {params}")),
        AgentEvent::ToolResult { tool, summary } => Some(format!("  <- {tool}: {summary}")),
        AgentEvent::Answer { text } => Some(format!("\n{text}\n")),
        AgentEvent::Error { message } => Some(format!("Error: {message}")),
    }
}

/// Runs the chat loop until the user exits.
///
/// # Errors
///
/// Returns an error if the agent is unknown, the chat provider is not
/// configured, or the terminal prompt fails.
pub async fn run(
    agent_id: Option<String>,
    data_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let agent = pick_agent(agent_id)?;
    let provider = create_provider_from_env(&agent.model)?;

    let mut services = Services::from_env();
    if data_path.is_some() {
        services.default_data_path = data_path;
    }

    let mut session = CampaignSession::new(Uuid::new_v4());

    println!("{} ({})", agent.name, agent.model);
    println!("Type /state to inspect the session, exit to quit.");

    loop {
        let question: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim();

        match question {
            "" | "exit" | "quit" => break,
            "/state" => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&session.snapshot())?
                );
                continue;
            }
            _ => {}
        }

        let (tx, mut rx) = mpsc::channel(32);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Some(line) = format_event(&event) {
                    println!("{line}");
                }
            }
        });

        let result = resonance_agents::ask_agent_with(
            &services,
            provider.as_ref(),
            &agent,
            &mut session,
            question,
            &tx,
        )
        .await;
        drop(tx);
        printer.await?;

        if let Err(e) = result {
            log::debug!("Agent run ended with error: {e}");
        }
    }

    Ok(())
}
