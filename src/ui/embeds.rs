use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::audio::queue::TrackEntry;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Cadencia";

/// Crea el embed de "Reproduciendo ahora"
pub fn now_playing_embed(track: &TrackEntry) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by), true)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea el embed de la cola de reproducción
pub fn queue_embed(head: &[TrackEntry], total: usize) -> CreateEmbed {
    if total == 0 {
        return CreateEmbed::default()
            .title("📭 Cola vacía")
            .description("Usa `/play` para agregar canciones")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    let lines: Vec<String> = head
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!("`{}.` **{}** — <@{}>", i + 1, entry.title, entry.requested_by)
        })
        .collect();

    let mut description = lines.join("\n");
    if total > head.len() {
        description.push_str(&format!("\n… y {} más", total - head.len()));
    }

    CreateEmbed::default()
        .title("📋 Cola de reproducción")
        .description(description)
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(format!(
            "{STANDARD_FOOTER} • {total} en cola"
        )))
}
