pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serenity::model::id::UserId;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::audio::queue::TrackEntry;

pub use spotify::SpotifyClient;
pub use youtube::YtDlpSearch;

/// Resoluciones de miembros de una colección en vuelo a la vez.
const RESOLVE_CONCURRENCY: usize = 4;

/// Fallos de los colaboradores externos (proveedor de metadata y backend
/// de búsqueda). Siempre se capturan a nivel de ítem: un miembro de una
/// playlist que falla nunca aborta a sus hermanos.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("petición HTTP falló: {0}")]
    Http(#[from] reqwest::Error),
    #[error("respuesta inesperada del proveedor: {0}")]
    Parse(String),
    #[error("yt-dlp falló: {0}")]
    Backend(String),
    #[error("E/S: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata mínima de un track según el proveedor.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
}

impl TrackInfo {
    /// Query de búsqueda con el formato `"<artista> - <título> audio"`.
    pub fn search_query(&self) -> String {
        format!("{} - {} audio", self.artist, self.title)
    }
}

/// Proveedor de metadata: distingue links de track y de colección.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Título y artista principal de un link de track.
    async fn track(&self, locator: &str) -> Result<TrackInfo, SourceError>;

    /// Miembros de una playlist o álbum, en el orden del proveedor.
    async fn collection(&self, locator: &str) -> Result<Vec<TrackInfo>, SourceError>;
}

/// Backend de búsqueda: query de texto libre a URL de stream, best-effort.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// `Ok(None)` significa "sin resultados", no es un error.
    async fn resolve(&self, query: &str) -> Result<Option<String>, SourceError>;
}

/// Convierte el locator que escribió el usuario (texto libre, link de track
/// o link de playlist/álbum) en cero o más entradas reproducibles.
///
/// Nunca devuelve error: "no se encontró" son cero resultados.
pub struct Resolver {
    metadata: Arc<dyn MetadataProvider>,
    search: Arc<dyn SearchBackend>,
    max_collection: usize,
}

impl Resolver {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        search: Arc<dyn SearchBackend>,
        max_collection: usize,
    ) -> Self {
        Self {
            metadata,
            search,
            max_collection,
        }
    }

    /// Resuelve un locator. Precedencia: link de track, link de colección,
    /// texto libre (el primer patrón que coincida gana).
    pub async fn resolve(&self, locator: &str, requested_by: UserId) -> Vec<TrackEntry> {
        if spotify::is_track_url(locator) {
            self.resolve_track_link(locator, requested_by).await
        } else if spotify::is_collection_url(locator) {
            self.resolve_collection(locator, requested_by).await
        } else {
            // texto libre o URL genérica: el texto del usuario es el título
            self.search_one(locator, locator.to_string(), requested_by)
                .await
                .into_iter()
                .collect()
        }
    }

    async fn resolve_track_link(&self, locator: &str, requested_by: UserId) -> Vec<TrackEntry> {
        let info = match self.metadata.track(locator).await {
            Ok(info) => info,
            Err(e) => {
                warn!("⚠️ No se pudo obtener metadata de {}: {}", locator, e);
                return Vec::new();
            }
        };

        self.search_one(&info.search_query(), info.title, requested_by)
            .await
            .into_iter()
            .collect()
    }

    async fn resolve_collection(&self, locator: &str, requested_by: UserId) -> Vec<TrackEntry> {
        let members = match self.metadata.collection(locator).await {
            Ok(members) => members,
            Err(e) => {
                warn!("⚠️ No se pudo listar la colección {}: {}", locator, e);
                return Vec::new();
            }
        };

        let total = members.len();
        let entries: Vec<TrackEntry> = stream::iter(members.into_iter().take(self.max_collection))
            .map(|info| {
                let query = info.search_query();
                async move { self.search_one(&query, info.title, requested_by).await }
            })
            .buffered(RESOLVE_CONCURRENCY)
            .filter_map(|entry| async move { entry })
            .collect()
            .await;

        info!(
            "🎶 Colección resuelta: {}/{} miembros reproducibles",
            entries.len(),
            total
        );
        entries
    }

    /// Una búsqueda individual. Cualquier fallo queda en `None` y un log.
    async fn search_one(
        &self,
        query: &str,
        title: String,
        requested_by: UserId,
    ) -> Option<TrackEntry> {
        match self.search.resolve(query).await {
            Ok(Some(stream_url)) => Some(TrackEntry::new(title, stream_url, requested_by)),
            Ok(None) => {
                info!("🔍 Sin resultados para: {}", query);
                None
            }
            Err(e) => {
                warn!("⚠️ Falló la búsqueda de '{}': {}", query, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user() -> UserId {
        UserId::new(7)
    }

    fn resolver(
        metadata: MockMetadataProvider,
        search: MockSearchBackend,
    ) -> Resolver {
        Resolver::new(Arc::new(metadata), Arc::new(search), 100)
    }

    #[tokio::test]
    async fn test_track_link_builds_artist_title_query() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_track().returning(|_| {
            Ok(TrackInfo {
                title: "Song A".into(),
                artist: "Artist X".into(),
            })
        });

        let mut search = MockSearchBackend::new();
        search
            .expect_resolve()
            .withf(|q: &str| q == "Artist X - Song A audio")
            .returning(|_| Ok(Some("https://cdn.example/song-a".into())));

        let entries = resolver(metadata, search)
            .resolve("https://open.spotify.com/track/123", user())
            .await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Song A");
        assert_eq!(entries[0].stream_url, "https://cdn.example/song-a");
    }

    #[tokio::test]
    async fn test_free_text_keeps_user_text_as_title() {
        let metadata = MockMetadataProvider::new();
        let mut search = MockSearchBackend::new();
        search
            .expect_resolve()
            .withf(|q: &str| q == "lofi beats")
            .returning(|_| Ok(Some("https://cdn.example/lofi".into())));

        let entries = resolver(metadata, search).resolve("lofi beats", user()).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "lofi beats");
    }

    #[tokio::test]
    async fn test_collection_skips_failures_preserving_order() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_collection().returning(|_| {
            Ok(vec![
                TrackInfo { title: "uno".into(), artist: "A".into() },
                TrackInfo { title: "dos".into(), artist: "B".into() },
                TrackInfo { title: "tres".into(), artist: "C".into() },
                TrackInfo { title: "cuatro".into(), artist: "D".into() },
            ])
        });

        let mut search = MockSearchBackend::new();
        search.expect_resolve().returning(|query: &str| {
            if query.starts_with("B") {
                // un miembro que falla no aborta a los demás
                Err(SourceError::Backend("timeout".into()))
            } else if query.starts_with("C") {
                Ok(None)
            } else {
                Ok(Some(format!("https://cdn.example/{}", &query[..1])))
            }
        });

        let entries = resolver(metadata, search)
            .resolve("https://open.spotify.com/playlist/abc", user())
            .await;

        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["uno", "cuatro"]);
    }

    #[tokio::test]
    async fn test_metadata_error_yields_zero_entries() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_track()
            .returning(|_| Err(SourceError::Parse("404".into())));

        let search = MockSearchBackend::new();

        let entries = resolver(metadata, search)
            .resolve("https://open.spotify.com/track/zzz", user())
            .await;

        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_search_miss_yields_zero_entries() {
        let metadata = MockMetadataProvider::new();
        let mut search = MockSearchBackend::new();
        search.expect_resolve().returning(|_| Ok(None));

        let entries = resolver(metadata, search)
            .resolve("canción inexistente", user())
            .await;

        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_collection_cap() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_collection().returning(|_| {
            Ok((0..10)
                .map(|i| TrackInfo { title: format!("t{i}"), artist: "A".into() })
                .collect())
        });

        let mut search = MockSearchBackend::new();
        search
            .expect_resolve()
            .returning(|_| Ok(Some("https://cdn.example/x".into())));

        let resolver = Resolver::new(Arc::new(metadata), Arc::new(search), 3);
        let entries = resolver
            .resolve("https://open.spotify.com/album/abc", user())
            .await;

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "t0");
        assert_eq!(entries[2].title, "t2");
    }
}
