use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use url::Url;

use crate::config::Config;

/// Events buffered between a fetch task and its consumer. Backpressure
/// beyond this suspends the fetch rather than growing memory.
const CHANNEL_CAPACITY: usize = 32;
/// Read size for `file://` sources.
const FILE_CHUNK_SIZE: usize = 8 * 1024;

/// Progress of a fetch, attached to every [`FetchEvent`].
///
/// Exactly one terminal status ends each fetch, after all of its chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// More chunks will follow.
    InProgress,
    /// The transfer finished and the document is complete.
    Success,
    /// The source URL could not be used (unparseable or unsupported scheme).
    InvalidSource,
    /// Connection, protocol or HTTP status failure.
    TransferError,
    /// The document exceeded the configured size limit.
    ResourceExhausted,
    /// Reading a local source failed.
    IoError,
}

impl FetchStatus {
    /// Map a raw transfer return code: negative means still running, zero
    /// is success, 1 to 4 are the failure kinds. Any other code is treated
    /// as a transfer error.
    pub fn from_code(code: i32) -> Self {
        match code {
            c if c < 0 => Self::InProgress,
            0 => Self::Success,
            1 => Self::InvalidSource,
            2 => Self::TransferError,
            3 => Self::ResourceExhausted,
            4 => Self::IoError,
            _ => Self::TransferError,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::InProgress
    }

    /// The error a failure status stands for, attributed to `feed`.
    /// `None` for `InProgress` and `Success`.
    pub fn into_error(self, feed: &str) -> Option<FetchError> {
        let feed = feed.to_string();
        match self {
            Self::InProgress | Self::Success => None,
            Self::InvalidSource => Some(FetchError::InvalidSource { feed }),
            Self::TransferError => Some(FetchError::Transfer { feed }),
            Self::ResourceExhausted => Some(FetchError::ResourceExhausted { feed }),
            Self::IoError => Some(FetchError::Io { feed }),
        }
    }
}

/// Feed-scoped failures of a poll cycle.
///
/// The display text is what gets printed to the operator, so it names the
/// feed and stays free of internal detail.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL for feed '{feed}'.")]
    InvalidSource { feed: String },
    #[error("Transfer error while fetching feed '{feed}'.")]
    Transfer { feed: String },
    #[error("Out of memory while fetching feed '{feed}'.")]
    ResourceExhausted { feed: String },
    #[error("Error with a file while fetching feed '{feed}'.")]
    Io { feed: String },
    /// A configured feed has no source URL yet.
    #[error("Feed '{feed}' has no URL set.")]
    MissingUrl { feed: String },
    /// Reading or writing the watermark failed after a successful fetch.
    #[error("Could not record progress for feed '{feed}'.")]
    Storage { feed: String, reason: String },
}

impl FetchError {
    pub fn feed(&self) -> &str {
        match self {
            Self::InvalidSource { feed }
            | Self::Transfer { feed }
            | Self::ResourceExhausted { feed }
            | Self::Io { feed }
            | Self::MissingUrl { feed }
            | Self::Storage { feed, .. } => feed,
        }
    }
}

/// One delivery from an in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEvent {
    pub chunk: Vec<u8>,
    pub status: FetchStatus,
}

impl FetchEvent {
    pub fn chunk(chunk: impl Into<Vec<u8>>) -> Self {
        Self {
            chunk: chunk.into(),
            status: FetchStatus::InProgress,
        }
    }

    pub fn done(status: FetchStatus) -> Self {
        Self {
            chunk: Vec::new(),
            status,
        }
    }
}

/// Launches non-blocking fetches.
///
/// The returned channel yields zero or more `InProgress` chunks in order
/// followed by exactly one terminal event. The fetch runs in the
/// background; the caller only suspends while waiting for the next event.
pub trait Fetcher: Send + Sync + 'static {
    fn start_fetch(&self, url: &str) -> mpsc::Receiver<FetchEvent>;
}

/// [`Fetcher`] for `http`, `https` and `file` URLs.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_size: usize,
}

impl HttpFetcher {
    /// Build a fetcher with timeouts, user agent and size limit from `config`.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        let client = builder.build()?;
        Ok(Self::with_client(client, config.max_feed_size))
    }

    pub fn with_client(client: reqwest::Client, max_size: usize) -> Self {
        Self { client, max_size }
    }
}

impl Fetcher for HttpFetcher {
    fn start_fetch(&self, url: &str) -> mpsc::Receiver<FetchEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let client = self.client.clone();
        let limit = self.max_size;
        let raw = url.to_string();

        tokio::spawn(async move {
            let status = match Source::parse(&raw) {
                Some(Source::Http(url)) => stream_http(&client, url, limit, &tx).await,
                Some(Source::File(path)) => stream_file(path, limit, &tx).await,
                None => {
                    tracing::debug!(url = %raw, "Unsupported or unparseable source URL");
                    FetchStatus::InvalidSource
                }
            };
            // The consumer may already be gone; nothing left to tell it.
            let _ = tx.send(FetchEvent::done(status)).await;
        });

        rx
    }
}

enum Source {
    Http(Url),
    File(PathBuf),
}

impl Source {
    fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw.trim()).ok()?;
        match url.scheme() {
            "http" | "https" => Some(Self::Http(url)),
            "file" => url.to_file_path().ok().map(Self::File),
            _ => None,
        }
    }
}

async fn stream_http(
    client: &reqwest::Client,
    url: Url,
    limit: usize,
    tx: &mpsc::Sender<FetchEvent>,
) -> FetchStatus {
    let response = match client.get(url.clone()).send().await {
        Ok(r) => r,
        Err(e) if e.is_builder() => {
            tracing::debug!(url = %url, error = %e, "Request could not be built");
            return FetchStatus::InvalidSource;
        }
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Request failed");
            return FetchStatus::TransferError;
        }
    };

    if !response.status().is_success() {
        tracing::debug!(url = %url, status = %response.status(), "Non-success HTTP status");
        return FetchStatus::TransferError;
    }

    // Fast path: the declared length already exceeds the limit
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return FetchStatus::ResourceExhausted;
        }
    }

    let mut received: usize = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(url = %url, received = received, error = %e, "Body stream failed");
                return FetchStatus::TransferError;
            }
        };
        received = received.saturating_add(chunk.len());
        if received > limit {
            return FetchStatus::ResourceExhausted;
        }
        if tx.send(FetchEvent::chunk(chunk.to_vec())).await.is_err() {
            return FetchStatus::TransferError;
        }
    }

    FetchStatus::Success
}

async fn stream_file(path: PathBuf, limit: usize, tx: &mpsc::Sender<FetchEvent>) -> FetchStatus {
    let mut file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Could not open feed file");
            return FetchStatus::IoError;
        }
    };

    let mut received: usize = 0;
    let mut buf = vec![0u8; FILE_CHUNK_SIZE];

    loop {
        let n = match file.read(&mut buf).await {
            Ok(0) => return FetchStatus::Success,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Reading feed file failed");
                return FetchStatus::IoError;
            }
        };
        received = received.saturating_add(n);
        if received > limit {
            return FetchStatus::ResourceExhausted;
        }
        if tx.send(FetchEvent::chunk(&buf[..n])).await.is_err() {
            return FetchStatus::TransferError;
        }
    }
}
