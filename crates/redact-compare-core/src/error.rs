//! Provider error surface shared by all redactor variants.

use thiserror::Error;

/// Failure of a single redaction call. Errors originate in the wrapped
/// provider; there is no retry or partial-result policy, so one failed call
/// fails the whole redaction.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("missing credential: {0}")]
    MissingCredentials(&'static str),

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{provider} returned status {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("unexpected {provider} response: {detail}")]
    InvalidResponse {
        provider: &'static str,
        detail: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}
