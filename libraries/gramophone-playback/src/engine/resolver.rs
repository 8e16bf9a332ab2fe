//! Source resolution: deciding how a URI is loaded

use super::{EngineNotifier, MessageKind, SlotRole, SourceKind};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of asking a resolver about a URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Known right away
    Ready(SourceKind),

    /// Resolution continues in the background and completes through the ticket
    Pending,
}

/// Handle for completing a background resolution
///
/// Completion is posted back to the engine, which discards it if the slot
/// has been replaced in the meantime.
#[derive(Debug)]
pub struct ResolveTicket {
    pub(crate) notifier: EngineNotifier,
    pub(crate) generation: u64,
    pub(crate) role: SlotRole,
    pub(crate) uri: String,
}

impl ResolveTicket {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn complete(self, result: Result<SourceKind, String>) {
        if !self.notifier.is_alive() {
            return;
        }
        self.notifier.post(MessageKind::Resolved {
            generation: self.generation,
            role: self.role,
            uri: self.uri,
            result,
        });
    }
}

/// Strategy for turning a URI into a [`SourceKind`]
pub trait SourceResolver: Send {
    fn resolve(&self, ticket: ResolveTicket) -> Resolution;
}

/// Treats every URI as a local file
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResolver;

impl SourceResolver for FileResolver {
    fn resolve(&self, _ticket: ResolveTicket) -> Resolution {
        Resolution::Ready(SourceKind::File)
    }
}

/// Sniffs HTTP sources with a HEAD request
///
/// Non-HTTP URIs resolve immediately as files.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    http: Client,
}

impl HttpResolver {
    pub fn new() -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("Gramophone/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

impl SourceResolver for HttpResolver {
    fn resolve(&self, ticket: ResolveTicket) -> Resolution {
        if !(ticket.uri.starts_with("http://") || ticket.uri.starts_with("https://")) {
            return Resolution::Ready(SourceKind::File);
        }

        let http = self.http.clone();
        tokio::spawn(async move {
            let result = sniff(&http, ticket.uri()).await;
            if let Err(reason) = &result {
                warn!(url = %ticket.uri(), %reason, "Content type sniff failed");
            }
            ticket.complete(result);
        });
        Resolution::Pending
    }
}

async fn sniff(http: &Client, url: &str) -> Result<SourceKind, String> {
    debug!(url = %url, "Probing stream content type");

    let response = http.head(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HEAD returned {status}"));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .ok_or_else(|| "missing Content-Type header".to_string())?
        .to_str()
        .map_err(|e| e.to_string())?;

    let kind = classify_content_type(content_type);
    debug!(url = %url, content_type, ?kind, "Sniffed stream");
    Ok(kind)
}

/// Map a Content-Type header to a loader
pub fn classify_content_type(content_type: &str) -> SourceKind {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "application/x-mpegurl" | "application/vnd.apple.mpegurl" | "audio/mpegurl" => {
            SourceKind::Segmented
        }
        _ => SourceKind::Progressive,
    }
}
