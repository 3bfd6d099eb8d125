//! # Bot Module
//!
//! Discord-facing side of the bot.
//!
//! - [`commands`]: prefix command parsing
//! - [`handlers`]: the queue controller's command handlers
//! - [`events`]: queue advancement and player lifecycle events
//! - [`dispatcher`]: per-guild sequencing of commands and events
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`]. For every prefixed
//! message it captures the gateway state a command needs (the member's voice
//! channel, the bot's voice permissions) into a [`CommandContext`] and hands
//! it to the guild's lane.

use serenity::{
    all::{ActivityData, ChannelId, Context, EventHandler, GatewayIntents, GuildId, Message, Permissions, Ready, UserId},
    async_trait,
    prelude::TypeMapKey,
};
use std::sync::Arc;
use tracing::{info, warn};

pub mod commands;
pub mod dispatcher;
pub mod events;
pub mod handlers;

#[cfg(test)]
pub(crate) mod testing;

use crate::{
    audio::lavalink_client::LavalinkBackend,
    bot::{
        commands::{parse_command, Command},
        dispatcher::{GuildDispatcher, GuildMessage},
        handlers::CommandContext,
    },
    config::Config,
    ui::notifier::DiscordNotifier,
};

/// Intents del gateway y los nombres que reporta `diag`.
pub const INTENT_SCOPES: [(GatewayIntents, &str); 4] = [
    (GatewayIntents::GUILDS, "Guilds"),
    (GatewayIntents::GUILD_MESSAGES, "GuildMessages"),
    (GatewayIntents::MESSAGE_CONTENT, "MessageContent"),
    (GatewayIntents::GUILD_VOICE_STATES, "GuildVoiceStates"),
];

pub fn intents() -> GatewayIntents {
    INTENT_SCOPES
        .iter()
        .fold(GatewayIntents::empty(), |acc, (intent, _)| acc | *intent)
}

pub fn scope_names() -> Vec<String> {
    INTENT_SCOPES.iter().map(|(_, name)| name.to_string()).collect()
}

/// Permisos de voz necesarios, con el nombre que ve el usuario.
const VOICE_PERMISSIONS: [(Permissions, &str); 2] = [
    (Permissions::CONNECT, "Connect"),
    (Permissions::SPEAK, "Speak"),
];

pub fn missing_voice_permissions(granted: Permissions) -> Vec<&'static str> {
    VOICE_PERMISSIONS
        .iter()
        .filter(|(permission, _)| !granted.contains(*permission))
        .map(|(_, name)| *name)
        .collect()
}

pub type LiveDispatcher = GuildDispatcher<LavalinkBackend, DiscordNotifier>;

/// Slot del dispatcher, disponible una vez iniciado Lavalink.
pub struct DispatcherKey;

impl TypeMapKey for DispatcherKey {
    type Value = Arc<LiveDispatcher>;
}

pub struct MusicBot {
    config: Arc<Config>,
}

impl MusicBot {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    async fn command_context(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
        author_id: UserId,
        command: &Command,
    ) -> CommandContext {
        let mut command_ctx = CommandContext::new(guild_id, channel_id);

        // Solo play necesita canal de voz y permisos
        if matches!(command, Command::Play(_)) {
            let voice_channel_id = ctx.cache.guild(guild_id).and_then(|guild| {
                guild
                    .voice_states
                    .get(&author_id)
                    .and_then(|state| state.channel_id)
            });

            if let Some(voice_channel_id) = voice_channel_id {
                command_ctx.missing_permissions =
                    bot_missing_permissions(ctx, guild_id, voice_channel_id).await;
            }
            command_ctx.voice_channel_id = voice_channel_id;
        }

        command_ctx
    }
}

/// Verifica Connect/Speak del bot en `channel_id`. Si no se puede leer el
/// estado del guild no se reporta nada y decide el intento de unirse.
async fn bot_missing_permissions(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> Vec<&'static str> {
    let bot_id = ctx.cache.current_user().id;

    let member = match guild_id.member(ctx, bot_id).await {
        Ok(member) => member,
        Err(e) => {
            warn!("No se pudo obtener el miembro del bot en guild {}: {:?}", guild_id, e);
            return Vec::new();
        }
    };

    let granted = {
        let Some(guild) = ctx.cache.guild(guild_id) else {
            return Vec::new();
        };
        let Some(channel) = guild.channels.get(&channel_id) else {
            return Vec::new();
        };
        guild.user_permissions_in(channel, &member)
    };

    missing_voice_permissions(granted)
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 Logged in as {}", ready.user.tag());
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::watching("TUI Music")));
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let Some(command) = parse_command(&msg.content, &self.config.prefix) else {
            return;
        };

        let dispatcher = {
            let data_read = ctx.data.read().await;
            data_read.get::<DispatcherKey>().cloned()
        };
        let Some(dispatcher) = dispatcher else {
            warn!("Comando recibido antes de inicializar Lavalink, ignorado");
            return;
        };

        let mut command_ctx = self
            .command_context(&ctx, guild_id, msg.channel_id, msg.author.id, &command)
            .await;
        command_ctx.message_id = Some(msg.id);

        dispatcher.dispatch(guild_id, GuildMessage::Command(command_ctx, command));
    }
}
