use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info};

use crate::{
    audio::{
        player::{Announcer, PlayerEvent},
        voice::SongbirdSession,
    },
    bot::CadenciaBot,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CadenciaBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await?,
        _ => {
            respond(ctx, &command, "❌ Comando no reconocido").await?;
        }
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &CadenciaBot,
    guild_id: GuildId,
) -> Result<()> {
    let locator = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Precondición: el usuario debe estar en un canal de voz. Se rechaza
    // antes de tocar la cola.
    let Some(voice_channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        respond(ctx, command, "❌ Únete a un canal de voz primero").await?;
        return Ok(());
    };

    // Responder en diferido: resolver puede tardar varios segundos
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let call = match bot.join_voice_channel(ctx, guild_id, voice_channel).await {
        Ok(call) => call,
        Err(e) => {
            error!("Error al conectar al canal de voz: {:?}", e);
            edit(ctx, command, "❌ No me pude conectar al canal de voz").await?;
            return Ok(());
        }
    };

    bot.player.queues().ensure(guild_id);
    let session = SongbirdSession::new(call, bot.config.default_volume);
    let announcer = Announcer {
        http: ctx.http.clone(),
        channel_id: command.channel_id,
    };
    let player_tx = bot.player.ensure_worker(guild_id, session, Some(announcer));

    let entries = bot.resolver.resolve(&locator, command.user.id).await;
    if entries.is_empty() {
        edit(
            ctx,
            command,
            &format!("❌ No se encontró nada reproducible para **{locator}**"),
        )
        .await?;
        return Ok(());
    }

    let first_title = entries[0].title.clone();
    let accepted = bot.player.queues().enqueue(guild_id, entries);

    let status = match accepted {
        0 => "❌ La cola está llena".to_string(),
        1 => format!("🎵 Agregado a la cola: **{first_title}**"),
        n => format!("🎶 Agregadas {n} canciones a la cola"),
    };
    edit(ctx, command, &status).await?;

    if accepted > 0 {
        let _ = player_tx.send(PlayerEvent::Play);
    }

    Ok(())
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &CadenciaBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = if bot.player.send(guild_id, PlayerEvent::Skip) {
        "⏭️ Saltando a la siguiente canción"
    } else {
        "❌ No hay nada reproduciéndose"
    };
    respond(ctx, command, text).await
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &CadenciaBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = if bot.player.send(guild_id, PlayerEvent::Pause) {
        "⏸️ Pausado"
    } else {
        "❌ No hay nada reproduciéndose"
    };
    respond(ctx, command, text).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &CadenciaBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = if bot.player.send(guild_id, PlayerEvent::Resume) {
        "▶️ Reanudado"
    } else {
        "❌ No hay nada reproduciéndose"
    };
    respond(ctx, command, text).await
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &CadenciaBot,
    guild_id: GuildId,
) -> Result<()> {
    let total = bot.player.queues().len(guild_id);
    let head = bot.player.queues().peek(guild_id, 10);
    respond_embed(ctx, command, embeds::queue_embed(&head, total)).await
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &CadenciaBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = if bot.disconnect_guild(guild_id) {
        "👋 Desconectado del canal de voz"
    } else {
        "❌ No estoy en un canal de voz"
    };
    respond(ctx, command, text).await
}

/// Canal de voz en el que está el usuario, según la caché de la guild.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    ctx.cache
        .guild(guild_id)
        .and_then(|guild| guild.voice_states.get(&user_id).and_then(|vs| vs.channel_id))
}

async fn respond(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(text),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;
    Ok(())
}

async fn edit(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(text))
        .await?;
    Ok(())
}
