use async_trait::async_trait;
use dashmap::DashMap;
use lavalink_rs::{
    hook,
    model::{
        events::{self, TrackEndReason},
        http::{UpdatePlayer, UpdatePlayerTrack},
        player::ConnectionInfo,
        track::{TrackData, TrackLoadData},
    },
    player_context::PlayerContext,
    prelude::*,
};
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::Songbird;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::audio::{
    backend::{
        search_identifier, AudioBackend, BackendError, BackendEvent, NodeEvent, NodeStatus, PlayerEvent, SessionId,
    },
    queue::TrackDescriptor,
};
use crate::config::Config;

/// Nombre con el que se reporta el único nodo configurado
pub const NODE_NAME: &str = "main";

/// Sesión abierta en un guild: el player de Lavalink más su identidad.
#[derive(Clone)]
pub struct LavalinkSession {
    pub id: SessionId,
    pub player: PlayerContext,
}

/// Estado accesible desde los hooks de lavalink-rs vía `client.data()`.
struct HookData {
    node_name: String,
    status: Arc<NodeStatus>,
    events: UnboundedSender<BackendEvent>,
    /// Sesión abierta actualmente en cada guild
    sessions: Arc<DashMap<GuildId, SessionId>>,
}

impl HookData {
    fn emit(&self, guild_id: u64, event: PlayerEvent) {
        if guild_id == 0 {
            warn!("Evento de Lavalink sin guild válido: {:?}", event);
            return;
        }

        let guild_id = GuildId::new(guild_id);
        let session = self.sessions.get(&guild_id).map(|entry| *entry);

        if self
            .events
            .send(BackendEvent {
                guild_id,
                session,
                event,
            })
            .is_err()
        {
            warn!("Canal de eventos cerrado, evento descartado para guild {}", guild_id);
        }
    }
}

/// [`AudioBackend`] sobre un nodo Lavalink.
///
/// songbird corre solo en modo gateway para obtener las credenciales del
/// servidor de voz; lavalink-rs se las pasa al nodo, que hace el streaming.
pub struct LavalinkBackend {
    client: LavalinkClient,
    songbird: Arc<Songbird>,
    status: Arc<NodeStatus>,
    sessions: Arc<DashMap<GuildId, SessionId>>,
    next_session: AtomicU64,
    endpoint: String,
    search_provider: String,
}

impl LavalinkBackend {
    pub async fn connect(
        config: &Config,
        user_id: UserId,
        songbird: Arc<Songbird>,
        status: Arc<NodeStatus>,
        events: UnboundedSender<BackendEvent>,
    ) -> Self {
        let endpoint = config.node_endpoint();
        info!("🎼 Conectando a Lavalink en {}", endpoint);

        let hooks = events::Events {
            ready: Some(node_ready),
            track_end: Some(track_end),
            track_exception: Some(track_exception),
            websocket_closed: Some(websocket_closed),
            ..Default::default()
        };

        let node = NodeBuilder {
            hostname: endpoint.clone(),
            is_ssl: config.lava_secure,
            events: events::Events::default(),
            password: config.lava_password.clone(),
            user_id: lavalink_rs::model::UserId(user_id.get()),
            session_id: None,
        };

        let sessions = Arc::new(DashMap::new());
        let data = Arc::new(HookData {
            node_name: NODE_NAME.to_string(),
            status: status.clone(),
            events,
            sessions: sessions.clone(),
        });

        let client = LavalinkClient::new_with_data(
            hooks,
            vec![node],
            NodeDistributionStrategy::round_robin(),
            data,
        )
        .await;

        Self {
            client,
            songbird,
            status,
            sessions,
            next_session: AtomicU64::new(1),
            endpoint,
            search_provider: config.search_provider.clone(),
        }
    }

    /// Se une a `channel_id` por el gateway y devuelve las credenciales que
    /// Lavalink necesita para abrir su propia conexión de voz.
    async fn join_gateway(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<ConnectionInfo, String> {
        let (info, call) = self
            .songbird
            .join_gateway(guild_id, channel_id)
            .await
            .map_err(|e| e.to_string())?;

        if let Err(e) = call.lock().await.deafen(true).await {
            warn!("No se pudo ensordecer al bot en guild {}: {:?}", guild_id, e);
        }

        Ok(ConnectionInfo {
            endpoint: info.endpoint,
            token: info.token,
            session_id: info.session_id,
        })
    }
}

fn lavalink_guild(guild_id: GuildId) -> lavalink_rs::model::GuildId {
    lavalink_rs::model::GuildId(guild_id.get())
}

fn descriptor(track: TrackData) -> TrackDescriptor {
    TrackDescriptor {
        title: track.info.title,
        payload: track.encoded,
    }
}

#[async_trait]
impl AudioBackend for LavalinkBackend {
    type Session = LavalinkSession;

    fn session_id(session: &LavalinkSession) -> SessionId {
        session.id
    }

    /// Listo solo si el nodo informó `Ready` y su websocket sigue vivo.
    fn is_ready(&self) -> bool {
        let running = self
            .client
            .nodes
            .iter()
            .any(|node| node.is_running.load(Ordering::SeqCst));

        self.status.reconcile(NODE_NAME, running)
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn resolve(&self, guild_id: GuildId, query: &str) -> Result<Vec<TrackDescriptor>, BackendError> {
        let identifier = search_identifier(query, &self.search_provider);

        let loaded = self
            .client
            .load_tracks(lavalink_guild(guild_id), &identifier)
            .await
            .map_err(|e| BackendError::Resolve {
                query: identifier.clone(),
                reason: format!("{e:?}"),
            })?;

        let tracks = match loaded.data {
            Some(TrackLoadData::Track(track)) => vec![track],
            Some(TrackLoadData::Search(tracks)) => tracks,
            Some(TrackLoadData::Playlist(playlist)) => playlist.tracks,
            Some(TrackLoadData::Error(exception)) => {
                return Err(BackendError::Resolve {
                    query: identifier,
                    reason: format!("{exception:?}"),
                });
            }
            None => Vec::new(),
        };

        Ok(tracks.into_iter().map(descriptor).collect())
    }

    async fn open_session(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<LavalinkSession, BackendError> {
        let connection = self
            .join_gateway(guild_id, channel_id)
            .await
            .map_err(BackendError::Join)?;

        match self
            .client
            .create_player_context(lavalink_guild(guild_id), connection)
            .await
        {
            Ok(player) => {
                let id = self.next_session.fetch_add(1, Ordering::SeqCst);
                self.sessions.insert(guild_id, id);
                info!("🔊 Conectado al canal {} en guild {} (sesión {})", channel_id, guild_id, id);
                Ok(LavalinkSession { id, player })
            }
            Err(e) => {
                // Sin player en el nodo no tiene sentido seguir en el canal
                if let Err(leave_err) = self.songbird.remove(guild_id).await {
                    warn!("Error al salir del canal tras fallo: {:?}", leave_err);
                }
                Err(BackendError::Join(format!("{e:?}")))
            }
        }
    }

    async fn move_session(
        &self,
        guild_id: GuildId,
        session: &LavalinkSession,
        channel_id: ChannelId,
    ) -> Result<(), BackendError> {
        let connection = self
            .join_gateway(guild_id, channel_id)
            .await
            .map_err(BackendError::Move)?;

        let update = UpdatePlayer {
            voice: Some(connection),
            ..Default::default()
        };

        session
            .player
            .update_player(&update, true)
            .await
            .map_err(|e| BackendError::Move(format!("{e:?}")))?;

        info!("🔀 Movido al canal {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    async fn close_session(&self, guild_id: GuildId, session: &LavalinkSession) {
        // Desde aquí los eventos del guild ya no son de esta sesión
        self.sessions.remove_if(&guild_id, |_, id| *id == session.id);

        if let Err(e) = self.client.delete_player(lavalink_guild(guild_id)).await {
            warn!("Error al destruir player en guild {}: {:?}", guild_id, e);
        }

        if self.songbird.get(guild_id).is_some() {
            if let Err(e) = self.songbird.remove(guild_id).await {
                warn!("Error al salir del canal de voz en guild {}: {:?}", guild_id, e);
            }
        }

        info!("👋 Desconectado del guild {}", guild_id);
    }

    async fn start_playback(&self, session: &LavalinkSession, payload: &str) -> Result<(), BackendError> {
        let update = UpdatePlayer {
            track: Some(UpdatePlayerTrack {
                encoded: Some(payload.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        session
            .player
            .update_player(&update, false)
            .await
            .map(|_| ())
            .map_err(|e| BackendError::Player(format!("{e:?}")))
    }

    async fn stop_playback(&self, session: &LavalinkSession) {
        if let Err(e) = session.player.stop_now().await {
            warn!("Error al detener track: {:?}", e);
        }
    }

    async fn set_paused(&self, session: &LavalinkSession, paused: bool) -> Result<(), BackendError> {
        session
            .player
            .set_pause(paused)
            .await
            .map(|_| ())
            .map_err(|e| BackendError::Player(format!("{e:?}")))
    }
}

fn hook_data(client: &LavalinkClient) -> Option<Arc<HookData>> {
    match client.data::<HookData>() {
        Ok(data) => Some(data),
        Err(e) => {
            error!("Datos de Lavalink no disponibles: {:?}", e);
            None
        }
    }
}

#[hook]
async fn node_ready(client: LavalinkClient, _session_id: String, _event: &events::Ready) {
    if let Some(data) = hook_data(&client) {
        data.status.apply(NodeEvent::Ready(data.node_name.clone()));
    }
}

#[hook]
async fn track_end(client: LavalinkClient, _session_id: String, event: &events::TrackEnd) {
    // Un fallo de carga ya llega como TrackException
    if matches!(event.reason, TrackEndReason::LoadFailed) {
        return;
    }

    if let Some(data) = hook_data(&client) {
        data.emit(
            event.guild_id.0,
            PlayerEvent::Ended {
                track: Some(event.track.encoded.clone()),
            },
        );
    }
}

#[hook]
async fn track_exception(client: LavalinkClient, _session_id: String, event: &events::TrackException) {
    if let Some(data) = hook_data(&client) {
        data.emit(
            event.guild_id.0,
            PlayerEvent::Exception {
                track: Some(event.track.encoded.clone()),
                error: format!("{:?}", event.exception),
            },
        );
    }
}

#[hook]
async fn websocket_closed(client: LavalinkClient, _session_id: String, event: &events::WebSocketClosed) {
    if let Some(data) = hook_data(&client) {
        data.emit(
            event.guild_id.0,
            PlayerEvent::Closed {
                reason: format!("{} ({})", event.reason, event.code),
            },
        );
    }
}
