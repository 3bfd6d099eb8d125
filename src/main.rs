use anyhow::Result;
use serenity::Client;
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod ui;

use crate::audio::{
    backend::NodeStatus,
    lavalink_client::LavalinkBackend,
    queue::GuildQueueStore,
};
use crate::bot::{
    dispatcher::GuildDispatcher,
    handlers::{DiagInfo, QueueController},
    DispatcherKey, MusicBot,
};
use crate::config::Config;
use crate::ui::notifier::DiscordNotifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tui_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?)
                .add_directive("lavalink_rs=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando TUI Music v{}", env!("CARGO_PKG_VERSION"));

    // Sin token no hay nada que hacer
    let config = match Config::load() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("❌ Configuración inválida: {:#}", e);
            std::process::exit(1);
        }
    };
    info!("{}", config.summary());

    let intents = bot::intents();

    // Construir cliente
    let songbird = Songbird::serenity();
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(MusicBot::new(config.clone()))
        .register_songbird_with(songbird.clone())
        .await?;

    // Inicializar Lavalink
    info!("🎼 Inicializando Lavalink...");
    let user_id = client.http.get_current_user().await?.id;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let status = Arc::new(NodeStatus::new());
    let backend = LavalinkBackend::connect(&config, user_id, songbird, status, event_tx).await;

    let controller = QueueController::new(
        Arc::new(backend),
        Arc::new(DiscordNotifier::new(client.http.clone())),
        Arc::new(GuildQueueStore::new()),
        DiagInfo {
            prefix: config.prefix.clone(),
            scopes: bot::scope_names(),
        },
    );
    let dispatcher = GuildDispatcher::new(Arc::new(controller));
    tokio::spawn(dispatcher.clone().forward_backend_events(event_rx));

    {
        let mut data = client.data.write().await;
        data.insert::<DispatcherKey>(dispatcher);
    }

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
