//! `sitewright init` — write the default config and system prompt.

use sitewright_agent::DEFAULT_SYSTEM_PROMPT;
use sitewright_config::AppConfig;
use std::path::Path;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();

    println!("🕸️  Sitewright — First-Time Setup");
    println!("================================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    write_once(&config_dir.join("config.toml"), &AppConfig::default_toml())?;
    write_once(&config_dir.join("system_prompt.md"), DEFAULT_SYSTEM_PROMPT)?;

    println!("\n📝 Next steps:");
    println!("   1. Export SITEWRIGHT_API_KEY (or add api_key to config.toml)");
    println!("   2. Run: sitewright chat");
    println!();

    Ok(())
}

/// Write `content` to `path` unless the file already exists.
fn write_once(path: &Path, content: &str) -> std::io::Result<bool> {
    if path.exists() {
        println!("⚠️  Keeping existing {}", path.display());
        return Ok(false);
    }
    std::fs::write(path, content)?;
    println!("✅ Created {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_files_are_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.md");

        assert!(write_once(&path, "first").unwrap());
        assert!(!write_once(&path, "second").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");
    }
}
