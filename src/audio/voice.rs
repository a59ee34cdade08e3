use async_trait::async_trait;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tracing::{debug, error};

use crate::audio::player::PlayerEvent;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("no se pudo registrar el evento de fin de pista: {0}")]
    Events(String),
}

/// La sesión de voz de una guild, vista desde el controlador de
/// reproducción. El worker de la guild es su único dueño: ningún otro
/// componente invoca start/stop sobre ella.
#[async_trait]
pub trait VoiceSession: Send + Sync {
    /// Comienza a transmitir `stream_url`. Al terminar la pista — fin
    /// natural, stop o error — la sesión envía `PlayerEvent::Finished`
    /// por `on_end`, exactamente una vez.
    async fn play(
        &self,
        stream_url: &str,
        on_end: UnboundedSender<PlayerEvent>,
    ) -> Result<(), VoiceError>;

    /// Detiene la pista activa (dispara la señal de fin).
    async fn stop(&self);

    async fn pause(&self);
    async fn resume(&self);
    async fn is_playing(&self) -> bool;
    async fn is_paused(&self) -> bool;

    /// Libera el canal de voz.
    async fn disconnect(&self);
}

/// Implementación sobre songbird: un `Call` compartido más el handle de la
/// pista en curso.
pub struct SongbirdSession {
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    volume: f32,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdSession {
    pub fn new(call: Arc<Mutex<Call>>, volume: f32) -> Self {
        Self {
            call,
            http: reqwest::Client::new(),
            volume,
            current: Mutex::new(None),
        }
    }

    async fn current_mode(&self) -> Option<PlayMode> {
        let guard = self.current.lock().await;
        let handle = guard.as_ref()?;
        handle.get_info().await.ok().map(|info| info.playing)
    }
}

#[async_trait]
impl VoiceSession for SongbirdSession {
    async fn play(
        &self,
        stream_url: &str,
        on_end: UnboundedSender<PlayerEvent>,
    ) -> Result<(), VoiceError> {
        let input = Input::from(HttpRequest::new(self.http.clone(), stream_url.to_string()));

        let mut call = self.call.lock().await;
        let handle = call.play_input(input);
        let _ = handle.set_volume(self.volume);

        handle
            .add_event(Event::Track(TrackEvent::End), TrackEndNotifier { on_end })
            .map_err(|e| VoiceError::Events(e.to_string()))?;

        *self.current.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(handle) = self.current.lock().await.as_ref() {
            let _ = handle.stop();
        }
    }

    async fn pause(&self) {
        if let Some(handle) = self.current.lock().await.as_ref() {
            let _ = handle.pause();
        }
    }

    async fn resume(&self) {
        if let Some(handle) = self.current.lock().await.as_ref() {
            let _ = handle.play();
        }
    }

    async fn is_playing(&self) -> bool {
        matches!(self.current_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.current_mode().await, Some(PlayMode::Pause))
    }

    async fn disconnect(&self) {
        *self.current.lock().await = None;

        let mut call = self.call.lock().await;
        if call.current_channel().is_none() {
            // ya desconectado (p. ej. expulsado del canal)
            return;
        }
        if let Err(e) = call.leave().await {
            error!("Error al salir del canal de voz: {:?}", e);
        }
    }
}

/// Reenvía el fin de pista — con su error, si lo hubo — al worker de la
/// guild. Corre en el contexto del driver de songbird; la mutación de
/// estado ocurre recién cuando el worker consume el evento.
struct TrackEndNotifier {
    on_end: UnboundedSender<PlayerEvent>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = if let EventContext::Track(track_list) = ctx {
            track_list.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{e:?}")),
                _ => None,
            })
        } else {
            None
        };

        debug!("Pista terminada, notificando al controlador");
        let _ = self.on_end.send(PlayerEvent::Finished(error));
        None
    }
}
