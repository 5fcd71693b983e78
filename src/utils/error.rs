use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkshopError {
    #[error("Malformed address '{address}': {reason}")]
    MalformedAddress { address: String, reason: String },

    #[error("Version unavailable for {addr}: {reason}")]
    VersionUnavailable { addr: String, reason: String },

    #[error("Fetch failed for {key} after {attempts} attempt(s): {source}")]
    FetchFailed {
        key: String,
        attempts: u32,
        #[source]
        source: Arc<RemoteError>,
    },

    #[error("Requirement not found: {0}")]
    RequirementNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

/// 遠端主機回傳的錯誤，決定是否值得重試
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Authentication rejected by {url}")]
    Unauthorized { url: String },

    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive for {key} contained no files")]
    EmptyArchive { key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Resolution,
    Network,
    Storage,
    Configuration,
}

impl RemoteError {
    /// 暫時性錯誤（逾時、連線失敗、5xx、429）才會重試
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RemoteError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl WorkshopError {
    pub fn malformed(address: &str, reason: impl Into<String>) -> Self {
        WorkshopError::MalformedAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            WorkshopError::MalformedAddress { .. } | WorkshopError::RequirementNotFound(_) => {
                ErrorCategory::Input
            }
            WorkshopError::VersionUnavailable { .. } => ErrorCategory::Resolution,
            WorkshopError::FetchFailed { .. } => ErrorCategory::Network,
            WorkshopError::IoError(_) | WorkshopError::SerializationError(_) => {
                ErrorCategory::Storage
            }
            WorkshopError::ConfigError { .. } | WorkshopError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            WorkshopError::MalformedAddress { .. } => {
                "Use the form domain/owner/repo[/path][@version]"
            }
            WorkshopError::VersionUnavailable { .. } => {
                "Check network access or pass an explicit version or revision"
            }
            WorkshopError::FetchFailed { source, .. } => match source.as_ref() {
                RemoteError::Unauthorized { .. } => "Set remote.token in workshop.toml",
                RemoteError::NotFound { .. } => "Check that the revision exists on the remote",
                _ => "Retry later or run with --no-fetch to only record the requirement",
            },
            WorkshopError::RequirementNotFound(_) => {
                "Run `workshop list` to see declared requirements"
            }
            WorkshopError::IoError(_) | WorkshopError::SerializationError(_) => {
                "Check permissions and contents of the workspace root"
            }
            WorkshopError::ConfigError { .. } | WorkshopError::InvalidConfigValueError { .. } => {
                "Fix workshop.toml and try again"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkshopError>;
