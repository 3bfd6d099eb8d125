use anyhow::Result;
use async_trait::async_trait;
use serenity::{
    http::Http,
    model::id::{ChannelId, MessageId},
};
use std::sync::Arc;

use crate::ui::embeds::Reply;

/// Destino de un mensaje saliente. Con `reference` se envía como respuesta
/// al mensaje que invocó el comando.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTarget {
    pub channel_id: ChannelId,
    pub reference: Option<MessageId>,
}

impl ReplyTarget {
    pub fn channel(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            reference: None,
        }
    }
}

/// Lado saliente del chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, target: ReplyTarget, reply: Reply) -> Result<()>;
}

/// Envía por la API REST de Discord.
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, target: ReplyTarget, reply: Reply) -> Result<()> {
        let mut message = reply.into_message();
        if let Some(reference) = target.reference {
            message = message.reference_message((target.channel_id, reference));
        }

        target.channel_id.send_message(&self.http, message).await?;
        Ok(())
    }
}
