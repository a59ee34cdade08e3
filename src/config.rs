use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Spotify (client-credentials)
    pub spotify_client_id: String,
    pub spotify_client_secret: String,

    // Audio
    pub default_volume: f32,

    // Límites
    pub max_queue_size: usize,
    pub max_playlist_size: usize,

    // Segundos de gracia antes de liberar una sesión de voz ociosa
    pub idle_grace_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Spotify
            spotify_client_id: std::env::var("SPOTIFY_CLIENT_ID")?,
            spotify_client_secret: std::env::var("SPOTIFY_CLIENT_SECRET")?,

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,

            // Límites
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            idle_grace_secs: std::env::var("IDLE_GRACE_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Gracia antes de liberar la sesión de voz con la cola vacía.
    pub fn idle_grace(&self) -> Duration {
        Duration::from_secs(self.idle_grace_secs)
    }

    /// Chequeos de sanidad sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0.0 y 2.0, se recibió: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("MAX_QUEUE_SIZE debe ser mayor que 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("MAX_PLAYLIST_SIZE debe ser mayor que 0");
        }

        if self.idle_grace_secs == 0 || self.idle_grace_secs > 300 {
            anyhow::bail!(
                "IDLE_GRACE_SECS debe estar entre 1 y 300, se recibió: {}",
                self.idle_grace_secs
            );
        }

        Ok(())
    }
}

/// Valores por defecto, usados cuando las variables de entorno opcionales
/// no están definidas.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults - deben proveerse)
            discord_token: String::new(),
            guild_id: None,

            // Spotify (sin defaults - deben proveerse)
            spotify_client_id: String::new(),
            spotify_client_secret: String::new(),

            default_volume: 0.5,
            max_queue_size: 1000,
            max_playlist_size: 100,
            idle_grace_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.default_volume = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_queue_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.idle_grace_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_idle_grace_duration() {
        let config = Config {
            idle_grace_secs: 7,
            ..Config::default()
        };
        assert_eq!(config.idle_grace(), Duration::from_secs(7));
    }
}
