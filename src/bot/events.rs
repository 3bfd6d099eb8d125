use serenity::model::id::GuildId;
use tracing::{debug, error, info, warn};

use crate::{
    audio::backend::{AudioBackend, PlayerEvent, SessionId},
    bot::handlers::QueueController,
    ui::{
        embeds::Reply,
        notifier::{Notifier, ReplyTarget},
    },
};

impl<B: AudioBackend, N: Notifier> QueueController<B, N> {
    /// Reacciona a un evento del player de `guild_id`.
    ///
    /// Los eventos de otra sesión (una ya cerrada, aunque suene el mismo
    /// track) o de un track distinto del actual son obsoletos y se descartan.
    pub async fn handle_player_event(&self, guild_id: GuildId, session: Option<SessionId>, event: PlayerEvent) {
        match event {
            PlayerEvent::Ended { track } => {
                if self.is_stale(guild_id, session, track.as_deref()) {
                    debug!("Fin de track obsoleto ignorado en guild {}", guild_id);
                    return;
                }
                info!("🎵 Track terminó en guild {}", guild_id);
                self.advance(guild_id).await;
            }
            PlayerEvent::Exception { track, error } => {
                error!("❌ Error en track para guild {}: {}", guild_id, error);
                if self.is_stale(guild_id, session, track.as_deref()) {
                    return;
                }
                self.advance(guild_id).await;
            }
            PlayerEvent::Closed { reason } => {
                warn!("🔌 Player cerrado en guild {}: {}", guild_id, reason);
                if self.is_stale(guild_id, session, None) {
                    debug!("Cierre de una sesión anterior ignorado en guild {}", guild_id);
                    return;
                }
                if let Some(record) = self.store.remove(guild_id) {
                    self.backend.close_session(guild_id, &record.session).await;
                }
            }
        }
    }

    /// Reproduce el siguiente track de `guild_id`, o cierra la sesión si no
    /// queda nada.
    ///
    /// Un track que el backend rechaza se anuncia, se descarta (aunque haya
    /// loop) y se prueba el siguiente.
    pub async fn advance(&self, guild_id: GuildId) {
        loop {
            let Some((next, session, notify_channel_id)) = self.store.with(guild_id, |record| {
                (record.next_track(), record.session.clone(), record.notify_channel_id)
            }) else {
                return;
            };

            let Some(track) = next else {
                if let Some(record) = self.store.remove(guild_id) {
                    self.backend.close_session(guild_id, &record.session).await;
                }
                info!("📭 Cola vacía, saliendo del guild {}", guild_id);
                return;
            };

            let target = ReplyTarget::channel(notify_channel_id);

            match self.backend.start_playback(&session, &track.payload).await {
                Ok(()) => {
                    info!("▶️ Reproduciendo: {} en guild {}", track.title, guild_id);
                    self.notify(target, Reply::now_playing(&track)).await;
                    return;
                }
                Err(e) => {
                    error!("Error al reproducir '{}' en guild {}: {}", track.title, guild_id, e);
                    self.store.with(guild_id, |record| record.discard_current());
                    self.notify(
                        target,
                        Reply::text(format!("⚠️ Could not play **{}**, skipping.", track.title)),
                    )
                    .await;
                }
            }
        }
    }

    fn is_stale(&self, guild_id: GuildId, session: Option<SessionId>, track: Option<&str>) -> bool {
        self.store
            .with(guild_id, |record| {
                if session != Some(B::session_id(&record.session)) {
                    return true;
                }

                match (track, record.current()) {
                    (Some(track), Some(current)) => current.payload != track,
                    _ => false,
                }
            })
            .unwrap_or(false)
    }
}
