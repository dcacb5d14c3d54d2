use ampresence_artwork::AppleMediaArtwork;
use ampresence_core::{Config, Controller, ControllerSettings, LoopState, SystemClock};
use ampresence_media_session::{MusicAppBridge, PgrepProbe};
use ampresence_presence::RichPresencePublisher;
use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env before logging so RUST_LOG can live there too
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,apple_music_presence=debug,ampresence_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Starting Apple Music presence for '{}'", config.process_name);

    let mut controller = build_controller(&config)?;

    let result = tokio::select! {
        result = controller.run(LoopState::default()) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    };

    controller.shutdown();
    result.context("Presence loop stopped")?;
    Ok(())
}

fn build_controller(config: &Config) -> Result<Controller> {
    let artwork = AppleMediaArtwork::new(config).context("Failed to create artwork resolver")?;

    Ok(Controller::new(
        Box::new(PgrepProbe::new(&config.process_name, config.command_timeout)),
        Box::new(MusicAppBridge::new(&config.process_name, config.command_timeout)),
        Box::new(artwork),
        Box::new(RichPresencePublisher::new(config.client_id.clone())),
        Box::new(SystemClock),
        ControllerSettings::from(config),
    ))
}
