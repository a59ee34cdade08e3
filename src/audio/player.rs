use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        queue::{QueueStore, TrackEntry},
        voice::VoiceSession,
    },
    ui::embeds,
};

/// Eventos que mueven la máquina de estados de reproducción de una guild.
///
/// El callback de fin de pista llega desde el contexto del driver de audio;
/// convertirlo en un evento de este canal lo reincorpora al flujo de control
/// serializado de la guild.
#[derive(Debug)]
pub enum PlayerEvent {
    /// Un usuario pidió reproducir; arranca solo si no hay nada sonando.
    Play,
    /// La sesión de voz reporta que el stream terminó, con error opcional.
    Finished(Option<String>),
    Skip,
    Pause,
    Resume,
    Leave,
}

/// Estado de reproducción de una guild. `start_next` es la única función
/// de transición.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PlaybackState {
    /// Sin pista activa (con o sin sesión de voz).
    Idle,
    /// Hay una pista transmitiéndose.
    Playing,
    /// Cola vacía; esperando la gracia antes de liberar la sesión.
    Draining,
}

/// Dónde publicar los anuncios de "Reproduciendo ahora".
#[derive(Clone)]
pub struct Announcer {
    pub http: Arc<serenity::http::Http>,
    pub channel_id: ChannelId,
}

/// Controlador de reproducción: un worker por guild, cada uno consumiendo
/// su propio canal de eventos. Un único consumidor por canal garantiza que
/// dos `start_next` de la misma guild jamás corran en paralelo; las guilds
/// entre sí son completamente independientes.
pub struct Player {
    queues: Arc<QueueStore>,
    workers: DashMap<GuildId, UnboundedSender<PlayerEvent>>,
    grace: Duration,
}

impl Player {
    pub fn new(queues: Arc<QueueStore>, grace: Duration) -> Self {
        Self {
            queues,
            workers: DashMap::new(),
            grace,
        }
    }

    pub fn queues(&self) -> &QueueStore {
        &self.queues
    }

    /// Devuelve el emisor de eventos de la guild, creando su worker si aún
    /// no existe.
    pub fn ensure_worker<S>(
        &self,
        guild_id: GuildId,
        session: S,
        announcer: Option<Announcer>,
    ) -> UnboundedSender<PlayerEvent>
    where
        S: VoiceSession + 'static,
    {
        self.workers
            .entry(guild_id)
            .or_insert_with(|| {
                spawn_worker(guild_id, Arc::clone(&self.queues), session, announcer, self.grace)
            })
            .clone()
    }

    /// Envía un evento al worker de la guild. `false` si la guild nunca
    /// reprodujo nada (no hay worker).
    pub fn send(&self, guild_id: GuildId, event: PlayerEvent) -> bool {
        match self.workers.get(&guild_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

struct GuildWorker<S: VoiceSession> {
    guild_id: GuildId,
    queues: Arc<QueueStore>,
    session: S,
    state: PlaybackState,
    tx: UnboundedSender<PlayerEvent>,
    announcer: Option<Announcer>,
    grace: Duration,
}

fn spawn_worker<S>(
    guild_id: GuildId,
    queues: Arc<QueueStore>,
    session: S,
    announcer: Option<Announcer>,
    grace: Duration,
) -> UnboundedSender<PlayerEvent>
where
    S: VoiceSession + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut worker = GuildWorker {
        guild_id,
        queues,
        session,
        state: PlaybackState::Idle,
        tx: tx.clone(),
        announcer,
        grace,
    };

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            worker.handle(event).await;
        }
        debug!("Worker de guild {} finalizado", worker.guild_id);
    });

    tx
}

impl<S: VoiceSession> GuildWorker<S> {
    async fn handle(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Play => {
                if self.state == PlaybackState::Idle {
                    self.start_next().await;
                }
            }
            PlayerEvent::Finished(error) => {
                if let Some(error) = &error {
                    warn!("⚠️ Error de reproducción en guild {}: {}", self.guild_id, error);
                }
                // Una señal de fin tardía (p. ej. tras /leave) no debe
                // rearrancar nada.
                if self.state == PlaybackState::Playing {
                    self.start_next().await;
                }
            }
            PlayerEvent::Skip => {
                if self.state == PlaybackState::Playing {
                    info!("⏭️ Skip en guild {}", self.guild_id);
                    // el avance lo dispara la señal de fin resultante,
                    // nunca el skip en sí
                    self.session.stop().await;
                }
            }
            PlayerEvent::Pause => {
                if self.session.is_playing().await {
                    self.session.pause().await;
                    info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
                }
            }
            PlayerEvent::Resume => {
                if self.session.is_paused().await {
                    self.session.resume().await;
                    info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
                }
            }
            PlayerEvent::Leave => {
                self.session.disconnect().await;
                self.state = PlaybackState::Idle;
                info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
            }
        }
    }

    /// Única transición: saca la cabeza de la cola y la arranca. Si la cola
    /// está vacía, drena: espera la gracia, revisa de nuevo y recién
    /// entonces libera la sesión — una sola vez.
    async fn start_next(&mut self) {
        loop {
            let Some(entry) = self.queues.pop_front(self.guild_id) else {
                self.state = PlaybackState::Draining;
                tokio::time::sleep(self.grace).await;

                if self.queues.len(self.guild_id) == 0 {
                    self.session.disconnect().await;
                    self.state = PlaybackState::Idle;
                    info!("💤 Cola vacía en guild {}, sesión de voz liberada", self.guild_id);
                    return;
                }
                // llegó algo durante la espera de gracia
                continue;
            };

            match self.session.play(&entry.stream_url, self.tx.clone()).await {
                Ok(()) => {
                    self.state = PlaybackState::Playing;
                    info!("🎵 Reproduciendo: {} en guild {}", entry.title, self.guild_id);
                    self.announce(&entry).await;
                    return;
                }
                Err(e) => {
                    // un stream que no arranca equivale a un error de
                    // reproducción: se registra y se prueba el siguiente
                    warn!("⚠️ No se pudo iniciar '{}': {}", entry.title, e);
                    continue;
                }
            }
        }
    }

    async fn announce(&self, entry: &TrackEntry) {
        let Some(announcer) = &self.announcer else {
            return;
        };

        let message =
            serenity::builder::CreateMessage::new().embed(embeds::now_playing_embed(entry));
        if let Err(e) = announcer.channel_id.send_message(&announcer.http, message).await {
            warn!("No se pudo enviar el anuncio de reproducción: {:?}", e);
        }
    }
}
