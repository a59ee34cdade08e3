use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::debug;

use super::{SearchBackend, SourceError};

/// Campos de `yt-dlp --dump-json` que nos interesan.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    url: Option<String>,
    title: Option<String>,
}

/// Backend de búsqueda sobre yt-dlp: convierte una query de texto libre
/// (o una URL directa) en la URL del stream de audio.
pub struct YtDlpSearch {
    // Limitar requests concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

impl YtDlpSearch {
    pub fn new() -> Self {
        Self {
            rate_limiter: Semaphore::new(3),
        }
    }

    /// ¿La query ya es una URL? Entonces se pasa tal cual a yt-dlp.
    pub fn is_direct_url(query: &str) -> bool {
        let url_regex = Regex::new(r"^https?://").unwrap();
        url_regex.is_match(query)
    }

    /// Argumento final para yt-dlp: URL directa o búsqueda `ytsearch1:`.
    fn search_target(query: &str) -> String {
        if Self::is_direct_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        }
    }

    /// Verifica que yt-dlp exista y se pueda ejecutar. Usado por el
    /// health check del binario.
    pub async fn verify_available() -> Result<String, SourceError> {
        let output = Command::new("yt-dlp").arg("--version").output().await?;

        if !output.status.success() {
            return Err(SourceError::Backend(
                "yt-dlp no está disponible o no puede ejecutarse".into(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for YtDlpSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for YtDlpSearch {
    async fn resolve(&self, query: &str) -> Result<Option<String>, SourceError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| SourceError::Backend(e.to_string()))?;

        let target = Self::search_target(query);
        debug!("🔍 Resolviendo con yt-dlp: {}", target);

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "-f",
                "bestaudio/best",
                "--no-warnings",
                &target,
            ])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Backend(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            if let Ok(info) = serde_json::from_str::<YtDlpInfo>(line) {
                if let Some(stream_url) = info.url {
                    debug!(
                        "✅ Stream encontrado: {}",
                        info.title.as_deref().unwrap_or("(sin título)")
                    );
                    return Ok(Some(stream_url));
                }
            }
        }

        Ok(None)
    }
}
