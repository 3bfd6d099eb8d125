use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        backend::AudioBackend,
        queue::{GuildQueueStore, QueueRecord},
    },
    bot::commands::Command,
    ui::{
        embeds::Reply,
        notifier::{Notifier, ReplyTarget},
    },
};

/// Estado del gateway capturado para un comando entrante.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: Option<MessageId>,
    /// Canal de voz del miembro que invoca
    pub voice_channel_id: Option<ChannelId>,
    /// Permisos de voz que le faltan al bot en `voice_channel_id`
    pub missing_permissions: Vec<&'static str>,
}

impl CommandContext {
    pub fn new(guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            guild_id,
            channel_id,
            message_id: None,
            voice_channel_id: None,
            missing_permissions: Vec::new(),
        }
    }

    fn reply_target(&self) -> ReplyTarget {
        ReplyTarget {
            channel_id: self.channel_id,
            reference: self.message_id,
        }
    }
}

/// Datos de solo lectura que reporta `diag`.
#[derive(Debug, Clone)]
pub struct DiagInfo {
    pub prefix: String,
    pub scopes: Vec<String>,
}

/// Fallos que un comando informa al canal que lo invocó.
///
/// El texto de `Display` es la respuesta.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Join a voice channel first.")]
    NotInVoice,

    #[error("I'm missing the following permission(s) in your voice channel: {0}.")]
    MissingPermissions(String),

    #[error("The audio node is not ready yet, try again in a moment.")]
    BackendNotReady,

    #[error("Usage: `{0}play <query|url>`")]
    Usage(String),

    #[error("Search failed, try again later.")]
    ResolveFailed,

    #[error("No results found.")]
    NoResults,

    #[error("Could not join your voice channel.")]
    JoinFailed,

    #[error("Could not move to your voice channel.")]
    MoveFailed,

    #[error("Nothing to stop.")]
    NothingToStop,

    #[error("Nothing is playing.")]
    NothingPlaying,

    #[error("Nothing to skip.")]
    NothingToSkip,

    #[error("⚠️ Error processing command.")]
    Unexpected(#[from] anyhow::Error),
}

/// Maneja el [`QueueRecord`] de cada guild a partir de comandos y eventos.
///
/// Supone que las llamadas de un mismo guild nunca se solapan; el
/// dispatcher lo garantiza.
pub struct QueueController<B: AudioBackend, N: Notifier> {
    pub(super) backend: Arc<B>,
    pub(super) notifier: Arc<N>,
    pub(super) store: Arc<GuildQueueStore<B::Session>>,
    diag: DiagInfo,
}

impl<B: AudioBackend, N: Notifier> QueueController<B, N> {
    pub fn new(
        backend: Arc<B>,
        notifier: Arc<N>,
        store: Arc<GuildQueueStore<B::Session>>,
        diag: DiagInfo,
    ) -> Self {
        Self {
            backend,
            notifier,
            store,
            diag,
        }
    }

    pub fn store(&self) -> &GuildQueueStore<B::Session> {
        &self.store
    }

    /// Ejecuta un comando completo. Nunca falla: los errores se responden
    pub async fn handle_command(&self, ctx: &CommandContext, command: Command) {
        debug!("📝 Comando {} en guild {}", command.name(), ctx.guild_id);

        self.store.touch(ctx.guild_id, ctx.channel_id);

        let result = match command {
            Command::Play(query) => self.play(ctx, &query).await,
            Command::Stop => self.stop(ctx).await,
            Command::Pause => self.pause(ctx).await,
            Command::Loop => self.toggle_loop(ctx).await,
            Command::Skip => self.skip(ctx).await,
            Command::Diag => self.diag(ctx).await,
        };

        if let Err(e) = result {
            if let CommandError::Unexpected(source) = &e {
                error!("Error procesando comando en guild {}: {:?}", ctx.guild_id, source);
            }
            self.notify(ctx.reply_target(), Reply::text(e.to_string())).await;
        }
    }

    async fn play(&self, ctx: &CommandContext, query: &str) -> Result<(), CommandError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CommandError::Usage(self.diag.prefix.clone()));
        }

        let voice_channel_id = ctx.voice_channel_id.ok_or(CommandError::NotInVoice)?;

        if !ctx.missing_permissions.is_empty() {
            return Err(CommandError::MissingPermissions(ctx.missing_permissions.join(", ")));
        }

        if !self.backend.is_ready() {
            return Err(CommandError::BackendNotReady);
        }

        let tracks = self
            .backend
            .resolve(ctx.guild_id, query)
            .await
            .map_err(|e| {
                error!("Error al buscar '{}': {}", query, e);
                CommandError::ResolveFailed
            })?;

        // Las playlists no se expanden: solo el primer resultado
        let track = tracks.into_iter().next().ok_or(CommandError::NoResults)?;

        let session = self
            .store
            .with(ctx.guild_id, |record| (record.session.clone(), record.voice_channel_id));

        match session {
            None => {
                let session = self
                    .backend
                    .open_session(ctx.guild_id, voice_channel_id)
                    .await
                    .map_err(|e| {
                        error!("Error al unirse al canal {}: {}", voice_channel_id, e);
                        CommandError::JoinFailed
                    })?;

                self.store.create(
                    ctx.guild_id,
                    QueueRecord::new(session, voice_channel_id, ctx.channel_id),
                );
            }
            Some((session, joined)) if joined != voice_channel_id => {
                self.backend
                    .move_session(ctx.guild_id, &session, voice_channel_id)
                    .await
                    .map_err(|e| {
                        error!("Error al moverse al canal {}: {}", voice_channel_id, e);
                        CommandError::MoveFailed
                    })?;

                self.store.with(ctx.guild_id, |record| {
                    record.voice_channel_id = voice_channel_id;
                });
            }
            Some(_) => {}
        }

        let idle = self
            .store
            .with(ctx.guild_id, |record| {
                record.enqueue(track.clone());
                record.current().is_none()
            })
            .unwrap_or(false);

        info!("🎵 En cola '{}' en guild {}", track.title, ctx.guild_id);
        let replied = self.reply(ctx, Reply::queued(&track)).await;

        // El track ya está en cola: avanzar aunque la respuesta falle
        if idle {
            self.advance(ctx.guild_id).await;
        }

        replied
    }

    async fn stop(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let record = self
            .store
            .remove(ctx.guild_id)
            .ok_or(CommandError::NothingToStop)?;

        self.backend.stop_playback(&record.session).await;
        self.backend.close_session(ctx.guild_id, &record.session).await;

        info!("⏹️ Reproducción detenida en guild {}", ctx.guild_id);
        self.reply(ctx, Reply::text("⏹️ Stopped and left.")).await
    }

    async fn pause(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let (session, paused) = self
            .store
            .with(ctx.guild_id, |record| {
                record
                    .current()
                    .map(|_| (record.session.clone(), record.is_paused()))
            })
            .flatten()
            .ok_or(CommandError::NothingPlaying)?;

        self.backend
            .set_paused(&session, !paused)
            .await
            .map_err(anyhow::Error::from)?;

        self.store
            .with(ctx.guild_id, |record| record.set_paused(!paused));

        let reply = if paused { "▶️ Resumed." } else { "⏸️ Paused." };
        self.reply(ctx, Reply::text(reply)).await
    }

    async fn toggle_loop(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let looping = self
            .store
            .with(ctx.guild_id, |record| {
                record.current().is_some().then(|| record.toggle_loop())
            })
            .flatten()
            .ok_or(CommandError::NothingPlaying)?;

        let reply = if looping {
            "🔁 Loop enabled (current track)."
        } else {
            "➡️ Loop disabled."
        };
        self.reply(ctx, Reply::text(reply)).await
    }

    async fn skip(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let session = self
            .store
            .with(ctx.guild_id, |record| {
                record.current().map(|_| record.session.clone())
            })
            .flatten()
            .ok_or(CommandError::NothingToSkip)?;

        // El evento de fin de track se encarga de avanzar la cola
        self.backend.stop_playback(&session).await;

        self.reply(ctx, Reply::text("⏭️ Skipped.")).await
    }

    async fn diag(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let description = format!(
            "**Backend ready:** {}\n**Node:** `{}`\n**Prefix:** `{}`\n**Scopes:** {}",
            if self.backend.is_ready() { "yes" } else { "no" },
            self.backend.endpoint(),
            self.diag.prefix,
            self.diag.scopes.join(", "),
        );

        self.reply(ctx, Reply::card("🩺 Diagnostics", description)).await
    }

    async fn reply(&self, ctx: &CommandContext, reply: Reply) -> Result<(), CommandError> {
        self.notifier.send(ctx.reply_target(), reply).await?;
        Ok(())
    }

    /// Envío no crítico: los fallos se loguean y se descartan
    pub(super) async fn notify(&self, target: ReplyTarget, reply: Reply) {
        if let Err(e) = self.notifier.send(target, reply).await {
            warn!("No se pudo enviar mensaje a {}: {:?}", target.channel_id, e);
        }
    }
}
