//! `toolwright tools`: List built-in tools.

use toolwright_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let provider = super::build_provider(&config);
    let registry = super::build_registry(&config, provider);

    for name in registry.names() {
        let Some(tool) = registry.get(name) else {
            continue;
        };
        let marker = if tool.contributes_sources() { " (cites sources)" } else { "" };
        println!("{name}{marker}");
        println!("    {}", tool.description());
    }
    Ok(())
}
