use async_trait::async_trait;
use parking_lot::RwLock;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::audio::queue::TrackDescriptor;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to resolve `{query}`: {reason}")]
    Resolve { query: String, reason: String },

    #[error("failed to join voice channel: {0}")]
    Join(String),

    #[error("failed to move voice session: {0}")]
    Move(String),

    #[error("player request failed: {0}")]
    Player(String),
}

/// Identificador único de una sesión de voz, nunca reutilizado en el proceso.
pub type SessionId = u64;

/// Eventos del ciclo de vida del player de un guild.
///
/// `track` lleva el payload codificado del track al que se refiere el
/// evento, cuando el backend lo informa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Ended { track: Option<String> },
    Exception { track: Option<String>, error: String },
    Closed { reason: String },
}

/// Evento de player con su guild y la sesión que estaba abierta al emitirse.
///
/// `session` es `None` si el guild no tenía sesión en ese momento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEvent {
    pub guild_id: GuildId,
    pub session: Option<SessionId>,
    pub event: PlayerEvent,
}

/// Cambios de conectividad a nivel de nodo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Ready(String),
    Closed(String),
    Disconnected(String),
}

/// Disponibilidad de los nodos de audio configurados.
///
/// El backend está listo mientras al menos un nodo haya informado `Ready`
/// como último evento.
#[derive(Debug, Default)]
pub struct NodeStatus {
    nodes: RwLock<HashMap<String, bool>>,
}

impl NodeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, event: NodeEvent) {
        let mut nodes = self.nodes.write();
        match event {
            NodeEvent::Ready(name) => {
                info!("🎼 [Lavalink] Nodo {} listo", name);
                nodes.insert(name, true);
            }
            NodeEvent::Closed(name) => {
                warn!("🔌 [Lavalink] Nodo {} cerrado", name);
                nodes.insert(name, false);
            }
            NodeEvent::Disconnected(name) => {
                warn!("🔌 [Lavalink] Nodo {} desconectado", name);
                nodes.insert(name, false);
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.nodes.read().values().any(|ready| *ready)
    }

    /// Contrasta el estado con la conexión real del nodo `name`.
    ///
    /// Un nodo marcado listo cuyo websocket ya no corre pasa a desconectado.
    /// El regreso a listo solo lo marca el siguiente `Ready`, no `running`.
    pub fn reconcile(&self, name: &str, running: bool) -> bool {
        let marked_ready = self.nodes.read().get(name).copied().unwrap_or(false);
        if marked_ready && !running {
            self.apply(NodeEvent::Disconnected(name.to_string()));
        }
        marked_ready && running
    }
}

/// Contrato que el controlador de colas consume del backend de audio.
///
/// Los eventos de player no forman parte del trait: cada implementación los
/// envía como [`BackendEvent`] por el canal con el que fue construida.
#[async_trait]
pub trait AudioBackend: Send + Sync + 'static {
    /// Handle de la sesión de voz abierta de un guild.
    type Session: Clone + Send + Sync + 'static;

    /// Identidad de `session`, la misma que llevan sus [`BackendEvent`].
    fn session_id(session: &Self::Session) -> SessionId;

    fn is_ready(&self) -> bool;

    /// Dirección del nodo para mostrar en `diag`.
    fn endpoint(&self) -> String;

    async fn resolve(&self, guild_id: GuildId, query: &str) -> Result<Vec<TrackDescriptor>, BackendError>;

    async fn open_session(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Self::Session, BackendError>;

    async fn move_session(
        &self,
        guild_id: GuildId,
        session: &Self::Session,
        channel_id: ChannelId,
    ) -> Result<(), BackendError>;

    /// Best-effort e idempotente.
    async fn close_session(&self, guild_id: GuildId, session: &Self::Session);

    async fn start_playback(&self, session: &Self::Session, payload: &str) -> Result<(), BackendError>;

    /// Best-effort.
    async fn stop_playback(&self, session: &Self::Session);

    async fn set_paused(&self, session: &Self::Session, paused: bool) -> Result<(), BackendError>;
}

/// Convierte la entrada del usuario en un identificador para el backend.
///
/// Las URLs absolutas con host pasan tal cual; el resto se busca en
/// `provider`.
pub fn search_identifier(query: &str, provider: &str) -> String {
    let query = query.trim();
    match Url::parse(query) {
        Ok(url) if url.has_host() => query.to_string(),
        _ => format!("{provider}:{query}"),
    }
}
