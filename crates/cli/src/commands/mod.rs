//! Subcommand implementations and the setup they share.

pub mod ask;
pub mod chat;
pub mod init;
pub mod run;
pub mod tools;

use sitewright_agent::AgentLoop;
use sitewright_config::AppConfig;
use sitewright_core::provider::Provider;
use sitewright_providers::router::{build_from_config, is_keyless};
use std::sync::Arc;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub max_steps: Option<u32>,
    pub model: Option<String>,
}

/// Load the config file and environment, then apply `overrides`.
pub fn load_config(overrides: &Overrides) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(steps) = overrides.max_steps {
        config.agent.max_steps = steps;
    }
    if let Some(model) = &overrides.model {
        config.model = model.clone();
    }
    Ok(config)
}

/// The configured provider, after checking that it can authenticate.
pub fn provider(config: &AppConfig) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    // Check for API key early — give a clear error
    if !config.has_api_key() && !is_keyless(&config.provider) {
        eprintln!();
        eprintln!("  ERROR: No API key configured for provider '{}'!", config.provider);
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    SITEWRIGHT_API_KEY=sk-...      (generic)");
        eprintln!("    OPENAI_API_KEY=sk-...          (for OpenAI direct)");
        eprintln!("    OPENROUTER_API_KEY=sk-or-...   (for OpenRouter)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = build_from_config(config);
    Ok(router.default().ok_or("No default provider configured")?)
}

/// An agent loop over the configured provider and the default tools.
pub fn build_agent(config: &AppConfig) -> Result<AgentLoop, Box<dyn std::error::Error>> {
    let provider = provider(config)?;
    let tools = Arc::new(sitewright_tools::default_registry(config));
    Ok(AgentLoop::from_config(config, provider, tools))
}
