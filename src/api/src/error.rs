//! Error types for the fetch → parse → respond pipeline.

use thiserror::Error;

/// Why a chat message could not be turned into a race query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidCommand {
    #[error("入力の形式が正しくありません")]
    Shape,

    #[error("場名「{0}」は対応していません")]
    UnknownVenue(String),

    #[error("レース番号「{0}」は1〜12で指定してください")]
    RaceNumber(String),

    #[error("日付「{0}」はYYYYMMDD形式の実在する日付で指定してください")]
    Date(String),
}

/// Failure to retrieve the upstream page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream returned status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request timed out for {url}")]
    Timeout { url: String },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("empty body from {url}")]
    EmptyBody { url: String },
}

impl FetchError {
    /// Canonical URL of the failed request
    pub fn url(&self) -> &str {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Timeout { url }
            | FetchError::Transport { url, .. }
            | FetchError::EmptyBody { url } => url,
        }
    }
}

/// Upstream page did not have the expected structure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("racer table not found")]
    RegionNotFound,

    #[error("no lane could be parsed")]
    NoLanes,
}
