use std::fmt;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;

use crate::persist::StagedFile;

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Upper bound on a single download; `None` accepts any size.
    pub max_bytes: Option<u64>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            max_bytes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransferError {
    pub kind: FailureKind,
    pub message: String,
}

impl TransferError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
    Persist,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Persist => write!(f, "could not write file"),
        }
    }
}

/// Moves the bytes behind a remote URL to a local path.
#[async_trait::async_trait]
pub trait Transfer: Send + Sync {
    /// Returns the number of bytes written to `target`.
    async fn transfer(&self, source: &str, target: &Path) -> Result<u64, TransferError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransfer {
    settings: TransferSettings,
    client: reqwest::Client,
}

impl ReqwestTransfer {
    pub fn new(settings: TransferSettings) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| TransferError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn check_size(&self, len: u64) -> Result<(), TransferError> {
        match self.settings.max_bytes {
            Some(max_bytes) if len > max_bytes => Err(TransferError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(len),
                },
                "response too large",
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Transfer for ReqwestTransfer {
    async fn transfer(&self, source: &str, target: &Path) -> Result<u64, TransferError> {
        let parsed = reqwest::Url::parse(source)
            .map_err(|err| TransferError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        if let Some(content_len) = response.content_length() {
            self.check_size(content_len)?;
        }

        let mut staged = StagedFile::new(target.to_path_buf()).map_err(persist_error)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            self.check_size(staged.written() + chunk.len() as u64)?;
            staged.write_chunk(&chunk).map_err(persist_error)?;
        }

        let written = staged.written();
        tokio::task::spawn_blocking(move || staged.commit())
            .await
            .map_err(|err| TransferError::new(FailureKind::Persist, err.to_string()))?
            .map_err(persist_error)?;
        Ok(written)
    }
}

fn persist_error(err: crate::PersistError) -> TransferError {
    TransferError::new(FailureKind::Persist, err.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> TransferError {
    if err.is_timeout() {
        return TransferError::new(FailureKind::Timeout, err.to_string());
    }
    TransferError::new(FailureKind::Network, err.to_string())
}
