//! Guildwatch gateway client entry point
//!
//! Run with:
//! ```bash
//! DISCORD_TOKEN=... cargo run -p guildwatch-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use guildwatch_common::{
    try_init_tracing, try_init_tracing_with_config, AppConfig, AppError, AppResult, ConfigError,
    TracingConfig,
};
use guildwatch_gateway::{ConnectionState, GatewayClient, GatewayConfig, GatewayEvent, LoggingSink};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let outcome = match startup(AppConfig::from_env()) {
        Ok(config) => run(config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        error!(error = %e, code = e.error_code(), "Gateway client stopped");
        std::process::exit(e.exit_code());
    }
}

/// Install the subscriber the configuration asks for
///
/// When the configuration itself is unusable, the default subscriber is
/// installed instead so the failure still gets reported.
fn startup(loaded: Result<AppConfig, ConfigError>) -> AppResult<AppConfig> {
    match loaded {
        Ok(config) => {
            try_init_tracing_with_config(&TracingConfig::from_app_config(&config))
                .map_err(|e| AppError::Telemetry(e.to_string()))?;
            Ok(config)
        }
        Err(e) => {
            if let Err(init) = try_init_tracing() {
                eprintln!("Warning: Failed to initialize tracing: {init}");
            }
            Err(e.into())
        }
    }
}

async fn run(config: AppConfig) -> AppResult<()> {
    let gateway = GatewayConfig::from(&config.discord);
    info!(
        env = ?config.app.env,
        intents = gateway.intents.bits(),
        max_reconnects = gateway.max_reconnects,
        "Configuration loaded"
    );

    let client = GatewayClient::builder(gateway)
        .sink(Arc::new(LoggingSink))
        .build();
    let mut events = client.subscribe();
    client.connect();

    let outcome = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break match signal {
                    Ok(()) => {
                        info!("Shutdown signal received");
                        Ok(())
                    }
                    Err(e) => Err(AppError::internal(e)),
                };
            }
            event = events.recv() => match event {
                Ok(GatewayEvent::Error(e)) if e.is_terminal() => {
                    break Err(AppError::gateway(e));
                }
                Ok(GatewayEvent::Error(e)) => warn!(error = %e, "Gateway error"),
                Ok(GatewayEvent::StateChange { new: ConnectionState::Failed, .. }) => {
                    break Err(AppError::gateway("session failed"));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event listener lagged"),
                Err(RecvError::Closed) => break Ok(()),
            }
        }
    };

    client.disconnect().await;
    outcome
}
