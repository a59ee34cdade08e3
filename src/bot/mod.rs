//! # Bot Module
//!
//! Main Discord event handler for Cadencia.
//!
//! The bot is built around the [`CadenciaBot`] struct which implements
//! Serenity's [`EventHandler`] trait. It wires together:
//!
//! - The per-guild playback controller ([`Player`])
//! - Locator resolution ([`Resolver`]: Spotify metadata + yt-dlp search)
//! - Voice connections per guild (songbird `Call` handles)
//!
//! Everything here is thin glue: command parsing and voice-channel
//! bookkeeping. The queue and continuation logic live in `crate::audio`.

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{
        player::{Player, PlayerEvent},
        queue::QueueStore,
    },
    config::Config,
    sources::{Resolver, SpotifyClient, YtDlpSearch},
};

/// Handler principal del bot.
pub struct CadenciaBot {
    /// Configuración cargada desde variables de entorno
    pub config: Arc<Config>,
    /// Controlador de reproducción por guild
    pub player: Arc<Player>,
    /// Resolución de locators (links de Spotify, texto libre)
    pub resolver: Arc<Resolver>,
    /// Conexiones de voz activas por guild
    voice_handlers: DashMap<GuildId, Arc<tokio::sync::Mutex<songbird::Call>>>,
}

impl CadenciaBot {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let queues = Arc::new(QueueStore::new(config.max_queue_size));
        let player = Arc::new(Player::new(Arc::clone(&queues), config.idle_grace()));

        let spotify = SpotifyClient::new(
            config.spotify_client_id.clone(),
            config.spotify_client_secret.clone(),
        );
        let resolver = Arc::new(Resolver::new(
            Arc::new(spotify),
            Arc::new(YtDlpSearch::new()),
            config.max_playlist_size,
        ));

        Self {
            config,
            player,
            resolver,
            voice_handlers: DashMap::new(),
        }
    }

    /// Registra los comandos slash, globales o por guild según configuración.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Conecta el bot al canal de voz y devuelve el handler de la llamada.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<tokio::sync::Mutex<songbird::Call>>> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let handler = manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| anyhow::anyhow!("Error al conectar al canal de voz: {e:?}"))?;

        self.voice_handlers.insert(guild_id, handler.clone());
        info!("🔊 Conectado al canal de voz en guild {}", guild_id);

        Ok(handler)
    }

    /// Desconecta la guild: su worker libera la sesión de voz.
    ///
    /// Devuelve `false` si no había conexión activa.
    pub fn disconnect_guild(&self, guild_id: GuildId) -> bool {
        if self.voice_handlers.remove(&guild_id).is_none() {
            return false;
        }
        self.player.send(guild_id, PlayerEvent::Leave)
    }
}

#[async_trait]
impl EventHandler for CadenciaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Limpieza cuando el bot es desconectado del canal por terceros
    /// (expulsado, canal borrado): el worker de la guild debe enterarse
    /// para no quedar en un estado de reproducción fantasma.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                if self.voice_handlers.remove(&guild_id).is_some() {
                    info!("🔌 Bot desconectado externamente en guild {}", guild_id);
                    self.player.send(guild_id, PlayerEvent::Leave);
                }
            }
        }
    }
}
