mod auth;
mod config;
mod error;
mod pages;
mod platform;
mod relay;
mod server;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use teloxide::prelude::*;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::platform::registry::ChatRegistry;
use crate::platform::telegram::{self, TelegramClient};
use crate::platform::{ChatClient, ChatId};
use crate::relay::Relay;
use crate::server::AppState;

/// Relay webhook calls (plain messages, GitHub pushes, TeamCity builds) into chat messages
#[derive(Parser, Debug)]
#[command(name = "relaybot", version)]
struct Args {
    /// Settings file
    #[arg(short, long, default_value = "settings.toml")]
    settings: PathBuf,

    /// Verbose debug output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.verbose {
        "debug,teloxide=warn,hyper=warn,reqwest=warn"
    } else {
        "info,teloxide=warn,hyper=warn,reqwest=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting relaybot");

    // Load configuration
    info!("Loading settings from: {}", args.settings.display());
    let config = Config::load(&args.settings)
        .with_context(|| format!("Could not load settings file: {}", args.settings.display()))?;

    info!("Settings loaded successfully");
    info!("  Listen: {}", config.http.bind_addr());
    info!(
        "  Default chat: {}",
        config.http.default_chat().unwrap_or("<none>")
    );
    info!("  Configured chats: {}", config.chats.len());

    // Connect the chat client once; every handler shares this instance
    let bot = Bot::new(&config.telegram.bot_token);
    let me = bot
        .get_me()
        .await
        .context("Failed to connect to the Telegram Bot API")?;
    info!(
        "Telegram connection established as @{}",
        me.user.username.as_deref().unwrap_or(&me.user.first_name)
    );

    let registry = Arc::new(ChatRegistry::new(config.chats.clone()));
    let client: Arc<dyn ChatClient> = Arc::new(TelegramClient::new(bot.clone(), registry.clone()));

    let listener = if config.telegram.listen {
        Some(tokio::spawn(async move {
            if let Err(e) = telegram::run(bot, registry).await {
                error!("Telegram listener error: {:#}", e);
            }
        }))
    } else {
        info!("Telegram listener disabled, chats page shows configured chats only");
        None
    };

    let relay = Relay::new(client, config.http.default_chat().map(ChatId::from));
    let state = AppState {
        http: Arc::new(config.http.clone()),
        relay: Arc::new(relay),
    };

    server::run_server(state, shutdown_signal()).await?;

    if let Some(listener) = listener {
        listener.abort();
    }

    info!("relaybot stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => error!("Unable to listen for shutdown signal: {}", err),
    }
}
