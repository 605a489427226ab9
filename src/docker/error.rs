// ABOUTME: Error types for the resilient Docker client.
// ABOUTME: Transport/bootstrap/discovery leaf errors plus the per-operation ClientError.

use snafu::Snafu;
use std::time::Duration;

use super::discovery::DiscoveryError;
use super::inspect::InspectShapeError;
use super::storage::StorageStatsError;
use crate::types::ContainerId;

/// Errors reported by a daemon transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("daemon returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("daemon unreachable: {0}")]
    Connection(String),

    #[error("invalid daemon response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound(_))
    }
}

/// Bootstrap failures reported by the init gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    /// The attempt run on behalf of this caller failed.
    #[error("docker bootstrap attempt {attempt} failed: {reason}")]
    Failed { attempt: u32, reason: String },

    /// A previous attempt failed and the retry window is still closed.
    #[error("docker unavailable, next bootstrap attempt in {remaining:?}: {last_error}")]
    RetryLater {
        remaining: Duration,
        last_error: String,
    },

    /// The retry policy ran out of attempts.
    #[error("docker bootstrap gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Error returned by every public client operation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientError {
    #[snafu(display("docker client not ready: {source}"))]
    Init { source: InitError },

    #[snafu(display("{operation} on {target} timed out after {timeout:?}"))]
    Timeout {
        operation: &'static str,
        target: String,
        timeout: Duration,
    },

    #[snafu(display("{operation} on {target} cancelled"))]
    Cancelled {
        operation: &'static str,
        target: String,
    },

    #[snafu(display("docker container {id} not found"))]
    ContainerNotFound { id: ContainerId },

    #[snafu(display("invalid inspect data for container {id}: {source}"))]
    InvalidInspectData {
        id: ContainerId,
        source: InspectShapeError,
    },

    #[snafu(display("{operation} on {target} failed: {source}"))]
    Daemon {
        operation: &'static str,
        target: String,
        source: TransportError,
    },

    #[snafu(display("cannot determine agent container: {source}"))]
    Discovery { source: DiscoveryError },

    #[snafu(display("storage stats unavailable: {source}"))]
    StorageStats { source: StorageStatsError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// The daemon connection could not be established.
    Init,
    /// A daemon call exceeded the query timeout.
    Timeout,
    /// The caller cancelled the operation.
    Cancelled,
    /// The queried object does not exist.
    NotFound,
    /// The daemon returned a structurally incomplete record.
    InvalidInspectData,
    /// Any other daemon or transport failure.
    Transport,
    /// The agent's own container could not be identified.
    Discovery,
    /// The storage driver reports no usable space figures.
    StorageStatsUnavailable,
}

impl ClientError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ClientErrorKind {
        match self {
            ClientError::Init { .. } => ClientErrorKind::Init,
            ClientError::Timeout { .. } => ClientErrorKind::Timeout,
            ClientError::Cancelled { .. } => ClientErrorKind::Cancelled,
            ClientError::ContainerNotFound { .. } => ClientErrorKind::NotFound,
            ClientError::InvalidInspectData { .. } => ClientErrorKind::InvalidInspectData,
            ClientError::Daemon { source, .. } if source.is_not_found() => {
                ClientErrorKind::NotFound
            }
            ClientError::Daemon { .. } => ClientErrorKind::Transport,
            ClientError::Discovery { .. } => ClientErrorKind::Discovery,
            ClientError::StorageStats { .. } => ClientErrorKind::StorageStatsUnavailable,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ClientErrorKind::NotFound
    }
}
