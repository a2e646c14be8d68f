use std::path::PathBuf;

/// Every way an upload invocation can fail.
///
/// Each variant renders as a single line so the CLI can surface it verbatim.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("required external tool `{0}` was not found on PATH")]
    MissingExternalTool(String),

    #[error("tracked-only selection requested but {} is not inside a git work tree", .0.display())]
    NoVcsDetected(PathBuf),

    #[error("file selection failed: {0}")]
    SelectionFailed(String),

    #[error("archive build failed: {0}")]
    ArchiveBuildFailed(String),

    #[error("API request failed: {0}")]
    ApiRequestFailed(String),

    #[error("malformed API response: {0}")]
    MalformedResponse(String),

    #[error("archive upload failed: {0}")]
    UploadFailed(String),

    #[error("no run found for configuration version {configuration_version_id} after {attempts} attempts")]
    RunResolutionTimeout {
        configuration_version_id: String,
        attempts: u32,
    },

    #[error("run status polling failed: {0}")]
    PollingFailed(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl UploadError {
    pub fn archive(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        UploadError::ArchiveBuildFailed(format!("{context}: {err}"))
    }

    pub fn selection(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        UploadError::SelectionFailed(format!("{context}: {err}"))
    }
}

pub type UploadResult<T> = Result<T, UploadError>;
