use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter, CreateMessage},
};

use crate::audio::queue::TrackDescriptor;

/// Paleta de colores del bot
pub mod colors {
    use serenity::all::Colour;

    /// Color de acento de todas las tarjetas
    pub const ACCENT: Colour = Colour::from_rgb(138, 43, 226);
}

const STANDARD_FOOTER: &str = "🎵 TUI Music";

/// Mensaje saliente: texto plano o tarjeta con título.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Card { title: String, description: String },
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn card(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Card {
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn queued(track: &TrackDescriptor) -> Self {
        Self::text(format!("🎵 Queued: **{}**", track.title))
    }

    pub fn now_playing(track: &TrackDescriptor) -> Self {
        Self::text(format!("▶️ Now playing: **{}**", track.title))
    }

    /// Cuerpo visible: el texto, o la descripción de la tarjeta
    pub fn body(&self) -> &str {
        match self {
            Self::Text(content) => content,
            Self::Card { description, .. } => description,
        }
    }

    pub fn into_message(self) -> CreateMessage {
        match self {
            Self::Text(content) => CreateMessage::new().content(content),
            Self::Card { title, description } => {
                CreateMessage::new().embed(create_note_card(&title, &description))
            }
        }
    }
}

pub fn create_note_card(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::ACCENT)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}
