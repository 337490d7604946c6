//! `toolwright init`: First-time setup.

use toolwright_config::{AgentCatalog, AppConfig};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Toolwright — First-Time Setup");
    println!("=============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("  Config already exists at: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Created config.toml at: {}", config_path.display());
    }

    let config = AppConfig::load_from(&config_path)?;
    let agents_dir = config.resolved_agents_dir();
    std::fs::create_dir_all(&agents_dir)?;

    let sample = agents_dir.join("assistant.toml");
    if sample.exists() {
        println!("  Sample agent exists: {}", sample.display());
    } else {
        std::fs::write(&sample, AgentCatalog::default_agent_toml())?;
        println!("  Created sample agent: {}", sample.display());
    }

    println!("\nNext steps:");
    println!("   1. Add your API key to {} (or set OPENAI_API_KEY)", config_path.display());
    println!("   2. Run: toolwright chat -m \"What is 17 * 23?\"\n");

    Ok(())
}
