//! `sitewright run` — one agent turn, printed as JSON.

use sitewright_core::message::Conversation;

use super::{Overrides, build_agent, load_config};

pub async fn run(overrides: &Overrides, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let agent = build_agent(&config)?;

    let mut conversation = Conversation::new();
    let outcome = agent.run_turn(&mut conversation, message).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
