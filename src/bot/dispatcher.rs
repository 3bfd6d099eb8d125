use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{
    audio::backend::{AudioBackend, BackendEvent, PlayerEvent, SessionId},
    bot::{commands::Command, handlers::{CommandContext, QueueController}},
    ui::notifier::Notifier,
};

/// Trabajo para el carril de un guild.
#[derive(Debug)]
pub enum GuildMessage {
    Command(CommandContext, Command),
    Player {
        session: Option<SessionId>,
        event: PlayerEvent,
    },
    /// Se responde cuando todo lo encolado antes ya se procesó.
    #[cfg(test)]
    Barrier(oneshot::Sender<()>),
}

type Lanes = DashMap<GuildId, mpsc::UnboundedSender<GuildMessage>>;

/// Serializa todo el trabajo de cada guild.
///
/// Cada guild tiene su propia tarea drenando un canal sin límite, así que un
/// comando o evento termina antes de que empiece el siguiente del mismo
/// guild. Los guilds nunca se esperan entre sí. Un carril sin registro de
/// cola y sin trabajo pendiente se libera.
pub struct GuildDispatcher<B: AudioBackend, N: Notifier> {
    controller: Arc<QueueController<B, N>>,
    lanes: Arc<Lanes>,
}

impl<B: AudioBackend, N: Notifier> GuildDispatcher<B, N> {
    pub fn new(controller: Arc<QueueController<B, N>>) -> Arc<Self> {
        Arc::new(Self {
            controller,
            lanes: Arc::new(DashMap::new()),
        })
    }

    pub fn controller(&self) -> &QueueController<B, N> {
        &self.controller
    }

    pub fn dispatch(&self, guild_id: GuildId, message: GuildMessage) {
        // El envío ocurre con la entrada bloqueada: un carril no puede
        // liberarse entre que se elige y que recibe el mensaje
        let mut lane = self
            .lanes
            .entry(guild_id)
            .or_insert_with(|| self.spawn_lane(guild_id));

        if let Err(mpsc::error::SendError(message)) = lane.send(message) {
            // La tarea murió (panic en un handler): se reemplaza
            warn!("Carril del guild {} caído, reiniciando", guild_id);
            *lane = self.spawn_lane(guild_id);
            if lane.send(message).is_err() {
                warn!("No se pudo reenviar mensaje al guild {}", guild_id);
            }
        }
    }

    /// Espera a que el carril del guild procese todo lo despachado hasta ahora.
    #[cfg(test)]
    pub async fn flush(&self, guild_id: GuildId) {
        let (tx, rx) = oneshot::channel();
        self.dispatch(guild_id, GuildMessage::Barrier(tx));
        let _ = rx.await;
    }

    /// Reenvía los eventos del backend al carril de su guild hasta que el
    /// backend suelte el sender.
    pub async fn forward_backend_events(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<BackendEvent>) {
        while let Some(BackendEvent { guild_id, session, event }) = events.recv().await {
            self.dispatch(guild_id, GuildMessage::Player { session, event });
        }
        debug!("Canal de eventos del backend cerrado");
    }

    fn spawn_lane(&self, guild_id: GuildId) -> mpsc::UnboundedSender<GuildMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_lane(self.controller.clone(), self.lanes.clone(), guild_id, rx));
        tx
    }
}

async fn run_lane<B: AudioBackend, N: Notifier>(
    controller: Arc<QueueController<B, N>>,
    lanes: Arc<Lanes>,
    guild_id: GuildId,
    mut rx: mpsc::UnboundedReceiver<GuildMessage>,
) {
    debug!("Carril iniciado para guild {}", guild_id);

    while let Some(message) = rx.recv().await {
        let barrier: Option<oneshot::Sender<()>> = match message {
            GuildMessage::Command(ctx, command) => {
                controller.handle_command(&ctx, command).await;
                None
            }
            GuildMessage::Player { session, event } => {
                controller.handle_player_event(guild_id, session, event).await;
                None
            }
            #[cfg(test)]
            GuildMessage::Barrier(done) => Some(done),
        };

        // Bajo el lock de la entrada ningún mensaje nuevo puede llegar
        let released = lanes
            .remove_if(&guild_id, |_, _| rx.is_empty() && !controller.store().contains(guild_id))
            .is_some();

        if let Some(done) = barrier {
            let _ = done.send(());
        }

        if released {
            debug!("Carril liberado para guild {}", guild_id);
            break;
        }
    }
}
