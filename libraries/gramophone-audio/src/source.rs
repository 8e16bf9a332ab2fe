//! Opening media items as decoders
//!
//! Local files are decoded straight from disk. Progressive streams are
//! downloaded whole before decoding. Segmented (HLS) streams are resolved to
//! their media playlist and the segments are fetched in order and joined,
//! which suits the packed audio (MP3, ADTS AAC) such playlists carry.

use crate::decoder::TrackDecoder;
use crate::error::{AudioError, Result};
use gramophone_playback::engine::{MediaItem, SourceKind};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

const STREAM_INF: &str = "#EXT-X-STREAM-INF";

/// Turns media items into decoders at one output rate
#[derive(Debug, Clone)]
pub struct SourceLoader {
    http: Client,
    output_rate: u32,
}

impl SourceLoader {
    pub fn new(output_rate: u32) -> Self {
        Self::with_client(Client::new(), output_rate)
    }

    pub fn with_client(http: Client, output_rate: u32) -> Self {
        Self { http, output_rate }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Open `item` and read its container headers
    pub async fn open(&self, item: &MediaItem) -> Result<TrackDecoder> {
        debug!(uri = %item.uri, kind = ?item.kind, "Opening source");
        match item.kind {
            SourceKind::File => {
                let path = local_path(&item.uri)?;
                let rate = self.output_rate;
                blocking(move || TrackDecoder::open_file(&path, rate)).await
            }
            SourceKind::Progressive => {
                let bytes = self.fetch(&item.uri).await?;
                self.decode_bytes(bytes, extension_of(&item.uri)).await
            }
            SourceKind::Segmented => {
                let segments = self.segments(&item.uri).await?;
                let hint = segments.first().and_then(|url| extension_of(url.as_str()));

                let mut bytes = Vec::new();
                for segment in &segments {
                    bytes.extend_from_slice(&self.fetch(segment.as_str()).await?);
                }
                debug!(uri = %item.uri, segments = segments.len(), bytes = bytes.len(), "Fetched segments");
                self.decode_bytes(bytes, hint).await
            }
        }
    }

    async fn decode_bytes(&self, bytes: Vec<u8>, extension: Option<String>) -> Result<TrackDecoder> {
        let rate = self.output_rate;
        blocking(move || TrackDecoder::from_bytes(bytes, extension.as_deref(), rate)).await
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Media segment URLs of a playlist, following a master playlist once
    async fn segments(&self, uri: &str) -> Result<Vec<Url>> {
        let base = Url::parse(uri).map_err(|e| AudioError::Open(format!("{uri}: {e}")))?;
        let playlist = self.fetch_text(uri).await?;

        if !playlist.contains(STREAM_INF) {
            return segment_urls(&base, &playlist);
        }

        let variant = segment_urls(&base, &playlist)?
            .into_iter()
            .next()
            .ok_or_else(|| AudioError::Open(format!("{uri}: master playlist has no variants")))?;
        debug!(%variant, "Following variant playlist");
        let media = self.fetch_text(variant.as_str()).await?;
        if media.contains(STREAM_INF) {
            return Err(AudioError::Unsupported(format!("{variant}: nested master playlist")));
        }
        segment_urls(&variant, &media)
    }
}

/// URI lines of an m3u8 playlist, resolved against `base`
pub fn segment_urls(base: &Url, playlist: &str) -> Result<Vec<Url>> {
    let urls = playlist
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            base.join(line)
                .map_err(|e| AudioError::Open(format!("{line}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    if urls.is_empty() {
        return Err(AudioError::Open(format!("{base}: playlist lists no media")));
    }
    Ok(urls)
}

fn local_path(uri: &str) -> Result<PathBuf> {
    if uri.is_empty() {
        return Err(AudioError::Open("empty path".into()));
    }
    if uri.starts_with("file://") {
        return Url::parse(uri)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| AudioError::Open(format!("{uri}: not a local file URL")));
    }
    Ok(PathBuf::from(uri))
}

fn extension_of(uri: &str) -> Option<String> {
    let path = match Url::parse(uri) {
        Ok(url) => url.path().to_string(),
        Err(_) => uri.to_string(),
    };
    Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AudioError::Open(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://media.example.com/hls/42/main.m3u8").unwrap()
    }

    #[test]
    fn relative_segments_resolve_against_the_playlist() {
        let playlist = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg0.mp3\n#EXTINF:6.0,\n/other/seg1.mp3\n#EXT-X-ENDLIST\n";
        let urls = segment_urls(&base(), playlist).unwrap();

        assert_eq!(
            urls.iter().map(Url::as_str).collect::<Vec<_>>(),
            [
                "https://media.example.com/hls/42/seg0.mp3",
                "https://media.example.com/other/seg1.mp3",
            ]
        );
    }

    #[test]
    fn absolute_segments_are_kept() {
        let playlist = "#EXTM3U\nhttps://cdn.example.com/a.aac\n";
        let urls = segment_urls(&base(), playlist).unwrap();
        assert_eq!(urls[0].as_str(), "https://cdn.example.com/a.aac");
    }

    #[test]
    fn playlist_without_media_is_rejected() {
        assert!(segment_urls(&base(), "#EXTM3U\n#EXT-X-ENDLIST\n").is_err());
    }

    #[test]
    fn extension_ignores_the_query() {
        assert_eq!(
            extension_of("https://host/Audio/1/stream.FLAC?api_key=x").as_deref(),
            Some("flac")
        );
        assert_eq!(extension_of("/music/a.mp3").as_deref(), Some("mp3"));
        assert_eq!(extension_of("https://host/Audio/1/universal"), None);
    }

    #[test]
    fn file_urls_become_paths() {
        assert_eq!(
            local_path("file:///music/a.mp3").unwrap(),
            PathBuf::from("/music/a.mp3")
        );
        assert_eq!(local_path("/music/a.mp3").unwrap(), PathBuf::from("/music/a.mp3"));
        assert!(local_path("").is_err());
    }
}
