use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64_ENGINE, Engine};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use super::{MetadataProvider, SourceError, TrackInfo};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// ¿El locator es un link de track de Spotify?
pub fn is_track_url(locator: &str) -> bool {
    locator.contains("spotify.com/track/") || locator.contains("spotify:track:")
}

/// ¿El locator es un link de playlist o de álbum?
pub fn is_collection_url(locator: &str) -> bool {
    ["playlist", "album"].iter().any(|kind| {
        locator.contains(&format!("spotify.com/{kind}/"))
            || locator.contains(&format!("spotify:{kind}:"))
    })
}

/// Extrae el id de recurso de un link `open.spotify.com/<kind>/<id>` o de
/// una URI `spotify:<kind>:<id>`.
pub fn resource_id(locator: &str, kind: &str) -> Option<String> {
    let uri_prefix = format!("spotify:{kind}:");
    if let Some(pos) = locator.find(&uri_prefix) {
        return locator[pos + uri_prefix.len()..]
            .split(&['?', '&'][..])
            .next()
            .filter(|id| !id.is_empty())
            .map(str::to_string);
    }

    let parsed = Url::parse(locator).ok()?;
    let mut segments = parsed.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == kind {
            return segments.next().filter(|id| !id.is_empty()).map(str::to_string);
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    name: String,
    artists: Vec<ArtistObject>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    // los tracks eliminados del catálogo llegan como null
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct AlbumPage {
    items: Vec<TrackObject>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Cliente de la Web API de Spotify (flujo client-credentials).
///
/// El token se renueva bajo demanda y se cachea hasta poco antes de vencer.
pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            token: Mutex::new(None),
        }
    }

    async fn token(&self) -> Result<String, SourceError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.value.clone());
            }
        }

        debug!("🔑 Renovando token de Spotify");
        let auth = B64_ENGINE.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {auth}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()?;

        let token: TokenResponse = response.json().await?;
        let value = token.access_token.clone();
        *guard = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in.saturating_sub(60)),
        });

        Ok(value)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let token = self.token().await?;
        let response = self
            .http
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    fn info_from(track: TrackObject) -> TrackInfo {
        TrackInfo {
            title: track.name,
            artist: track
                .artists
                .into_iter()
                .next()
                .map(|artist| artist.name)
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl MetadataProvider for SpotifyClient {
    async fn track(&self, locator: &str) -> Result<TrackInfo, SourceError> {
        let id = resource_id(locator, "track")
            .ok_or_else(|| SourceError::Parse(format!("link de track inválido: {locator}")))?;

        let track: TrackObject = self.get_json(&format!("/tracks/{id}")).await?;
        Ok(Self::info_from(track))
    }

    async fn collection(&self, locator: &str) -> Result<Vec<TrackInfo>, SourceError> {
        if let Some(id) = resource_id(locator, "playlist") {
            let page: PlaylistPage = self
                .get_json(&format!("/playlists/{id}/tracks?limit=100"))
                .await?;
            return Ok(page
                .items
                .into_iter()
                .filter_map(|item| item.track)
                .map(Self::info_from)
                .collect());
        }

        if let Some(id) = resource_id(locator, "album") {
            let page: AlbumPage = self.get_json(&format!("/albums/{id}/tracks?limit=50")).await?;
            return Ok(page.items.into_iter().map(Self::info_from).collect());
        }

        Err(SourceError::Parse(format!(
            "link de colección inválido: {locator}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_shape_detection() {
        assert!(is_track_url("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"));
        assert!(is_track_url("spotify:track:4uLU6hMCjMI75M1A2tKUQC"));
        assert!(!is_track_url("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"));

        assert!(is_collection_url("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"));
        assert!(is_collection_url("https://open.spotify.com/album/6dVIqQ8qmQ5GBnJ9shOYGE"));
        assert!(is_collection_url("spotify:album:6dVIqQ8qmQ5GBnJ9shOYGE"));
        assert!(!is_collection_url("lofi beats"));
        assert!(!is_collection_url("https://example.com/album/other-service"));
    }

    #[test]
    fn test_resource_id_from_url() {
        assert_eq!(
            resource_id("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC", "track"),
            Some("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
        assert_eq!(
            resource_id(
                "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc123",
                "track"
            ),
            Some("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
        // los links regionales llevan un segmento extra
        assert_eq!(
            resource_id(
                "https://open.spotify.com/intl-es/track/4uLU6hMCjMI75M1A2tKUQC",
                "track"
            ),
            Some("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
    }

    #[test]
    fn test_resource_id_from_uri() {
        assert_eq!(
            resource_id("spotify:track:4uLU6hMCjMI75M1A2tKUQC", "track"),
            Some("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
        assert_eq!(
            resource_id("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M", "playlist"),
            Some("37i9dQZF1DXcBWIGoYBM5M".to_string())
        );
    }

    #[test]
    fn test_resource_id_rejects_wrong_kind() {
        assert_eq!(
            resource_id("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M", "track"),
            None
        );
        assert_eq!(resource_id("no es un link", "track"), None);
        assert_eq!(resource_id("https://open.spotify.com/track/", "track"), None);
    }
}
