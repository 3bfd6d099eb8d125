use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Track resuelto y listo para reproducir.
///
/// `payload` es el track codificado del backend y se le devuelve tal cual al
/// pedir la reproducción.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub title: String,
    pub payload: String,
}

impl TrackDescriptor {
    pub fn new(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            payload: payload.into(),
        }
    }
}

/// Estado de reproducción de un guild.
///
/// Un registro solo existe mientras hay una sesión de voz abierta, así que
/// `session` y `voice_channel_id` siempre están presentes.
#[derive(Debug)]
pub struct QueueRecord<S> {
    pub session: S,
    pub voice_channel_id: ChannelId,
    pub notify_channel_id: ChannelId,
    pending: VecDeque<TrackDescriptor>,
    current: Option<TrackDescriptor>,
    loop_current: bool,
    paused: bool,
}

impl<S> QueueRecord<S> {
    pub fn new(session: S, voice_channel_id: ChannelId, notify_channel_id: ChannelId) -> Self {
        Self {
            session,
            voice_channel_id,
            notify_channel_id,
            pending: VecDeque::new(),
            current: None,
            loop_current: false,
            paused: false,
        }
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&mut self, track: TrackDescriptor) {
        debug!("➕ Agregado a la cola: {}", track.title);
        self.pending.push_back(track);
    }

    /// Obtiene el siguiente track y lo deja como actual.
    ///
    /// Con loop activo el track terminado vuelve primero a la cabeza de la
    /// cola, así que sale de nuevo enseguida. Devuelve `None` con la cola
    /// agotada, y en ese caso `current` queda vacío.
    pub fn next_track(&mut self) -> Option<TrackDescriptor> {
        if let Some(finished) = self.current.take() {
            if self.loop_current {
                self.pending.push_front(finished);
            }
        }

        self.current = self.pending.pop_front();
        self.current.clone()
    }

    /// Descarta el track actual sin reencolarlo, aunque haya loop
    pub fn discard_current(&mut self) -> Option<TrackDescriptor> {
        self.current.take()
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.loop_current = !self.loop_current;
        self.loop_current
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn current(&self) -> Option<&TrackDescriptor> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_looping(&self) -> bool {
        self.loop_current
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Mapa guild → registro de cola para todo el proceso.
///
/// El acceso mutable es siempre vía closures: el lock del shard nunca cruza
/// un `.await`.
pub struct GuildQueueStore<S> {
    records: DashMap<GuildId, QueueRecord<S>>,
}

impl<S> GuildQueueStore<S> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Inserta un registro nuevo, reemplazando el anterior del guild
    pub fn create(&self, guild_id: GuildId, record: QueueRecord<S>) {
        info!("📋 Cola creada para guild {}", guild_id);
        self.records.insert(guild_id, record);
    }

    pub fn with<R>(&self, guild_id: GuildId, f: impl FnOnce(&mut QueueRecord<S>) -> R) -> Option<R> {
        self.records.get_mut(&guild_id).map(|mut record| f(record.value_mut()))
    }

    /// Dirige las notificaciones a `channel_id`. Devuelve si existe registro.
    pub fn touch(&self, guild_id: GuildId, channel_id: ChannelId) -> bool {
        self.with(guild_id, |record| record.notify_channel_id = channel_id)
            .is_some()
    }

    pub fn remove(&self, guild_id: GuildId) -> Option<QueueRecord<S>> {
        let removed = self.records.remove(&guild_id).map(|(_, record)| record);
        if removed.is_some() {
            info!("🗑️ Cola eliminada para guild {}", guild_id);
        }
        removed
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.records.contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<S> Default for GuildQueueStore<S> {
    fn default() -> Self {
        Self::new()
    }
}
