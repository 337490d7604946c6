//! `toolwright agents`: List agent definitions.

use toolwright_config::{AgentCatalog, AppConfig};
use toolwright_core::AgentStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let dir = config.resolved_agents_dir();
    let catalog = AgentCatalog::load_dir(&dir)?;

    if catalog.is_empty() {
        println!("No agents in {} — run `toolwright init`.", dir.display());
        return Ok(());
    }

    for agent in catalog.list() {
        let icon = agent.icon.as_deref().unwrap_or(" ");
        println!("{icon} {:<20} {}", agent.slug, agent.name);
        if let Some(description) = &agent.description {
            println!("    {description}");
        }
        if !agent.tools.is_empty() {
            println!("    tools: {}", agent.tools.join(", "));
        }
    }
    Ok(())
}
