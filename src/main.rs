use anyhow::{Context, Result};
use dumtranslator::config::Config;
use dumtranslator::discord::{DiscordRest, Gateway};
use dumtranslator::language::WhatlangGate;
use dumtranslator::registry::ChannelRegistry;
use dumtranslator::relay::Relay;
use dumtranslator::translation::{JsonFieldDecoder, TranslateClient};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dumtranslator=info".parse()?),
        )
        .init();

    info!("Starting DumTranslator");

    let config = Config::from_env()?;

    let registry = ChannelRegistry::open(&config.channels_file, &config.target_channels)
        .context("Failed to open channel store")?;

    let translator = TranslateClient::new(
        &config.translate_api_url,
        config.translate_api_key.clone(),
        config.translate_timeout,
        Box::new(JsonFieldDecoder::new(
            config.translate_response_field.clone(),
            config.translate_error_field.clone(),
        )),
    )
    .context("Failed to build translation client")?;

    let rest = DiscordRest::new(
        &config.discord_api_url,
        config.discord_token.clone(),
        config.discord_timeout,
    )
    .context("Failed to build Discord client")?;
    let bot = rest
        .current_user()
        .await
        .context("Failed to fetch bot identity")?;
    info!("Authenticated as {} ({})", bot.username, bot.id);

    info!("Registering slash commands...");
    let application_id = rest
        .application_id()
        .await
        .context("Failed to fetch application id")?;
    rest.register_commands(&application_id)
        .await
        .context("Cannot create slash commands")?;

    let relay = Arc::new(Relay::new(
        bot.id,
        Arc::new(registry),
        Arc::new(WhatlangGate::default()),
        Arc::new(translator),
        Arc::new(rest.clone()),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let gateway = tokio::spawn(Gateway::new(rest, relay).run(shutdown_rx));

    info!("✓ DumTranslator is now running. Press CTRL-C to exit.");
    shutdown_signal()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    gateway.await.context("Gateway task panicked")?;

    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
