// SPDX-License-Identifier: GPL-3.0-only
/// Failures reported across the platform boundary.
///
/// None of these are fatal to the application. Callers log them and fall back
/// to running without the affected feature.
#[derive(thiserror::Error, Debug)]
pub enum PlatformError {
    #[error("Worker registration rejected: {0}")]
    RegistrationRejected(String),

    #[error("No active worker registration")]
    NoRegistration,

    #[error("No waiting worker to message")]
    NoWaitingWorker,

    #[error("Invalid worker manifest: {0}")]
    InvalidManifest(String),

    #[error("Sync tag rejected: {0}")]
    SyncRejected(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
