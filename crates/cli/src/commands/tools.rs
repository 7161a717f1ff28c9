//! `sitewright tools` — list the registered tools.

use super::{Overrides, load_config};

pub async fn run(overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let registry = sitewright_tools::default_registry(&config);

    println!("🧰 Sitewright Tools ({})", registry.len());
    println!("==================\n");
    for definition in registry.definitions() {
        println!("  {:<18} {}", definition.name, definition.description);
    }
    println!();
    println!("  Workspace root: {}", config.workspace.root.display());

    Ok(())
}
