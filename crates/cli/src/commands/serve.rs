//! `chatrelay serve` — Start the HTTP relay.

use chatrelay_config::AppConfig;

pub async fn run(
    mut config: AppConfig,
    port_override: Option<u16>,
    host_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    // Fail fast with a readable message before any socket is opened.
    config.require_api_key()?;

    println!("chatrelay");
    println!("   Listening: {}", config.listen_addr());
    println!("   Model:     {}", config.provider.model);
    println!("   Endpoints: POST /chat, POST /api/chat, GET /health");

    chatrelay_gateway::start(config).await?;

    Ok(())
}
