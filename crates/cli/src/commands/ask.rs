//! `sitewright ask` — send one prompt to the model, bypassing the agent loop.

use sitewright_core::message::Message;
use sitewright_core::provider::ProviderRequest;
use std::io::Write;

use super::{Overrides, load_config, provider};

pub async fn run(overrides: &Overrides, prompt: &str, stream: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let provider = provider(&config)?;

    let mut request = ProviderRequest::new(config.model.clone(), vec![Message::user(prompt)]);
    request.temperature = config.temperature;
    request.max_tokens = Some(config.max_tokens);

    if !stream {
        let response = provider.complete(request).await?;
        println!("{}", response.message.text());
        return Ok(());
    }

    request.stream = true;
    let mut rx = provider.stream(request).await?;
    let mut stdout = std::io::stdout();
    while let Some(chunk) = rx.recv().await {
        let chunk = chunk?;
        if let Some(content) = chunk.content {
            print!("{content}");
            stdout.flush()?;
        }
        if chunk.done {
            break;
        }
    }
    println!();
    Ok(())
}
