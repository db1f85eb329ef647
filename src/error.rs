//! Error types for the token lifecycle, publishing and scaffolding.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while logging in or obtaining an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider answered with an OAuth `error` field.
    #[error("Identity provider rejected the request: {error}{}", describe(.description))]
    Provider {
        error: String,
        description: Option<String>,
    },

    /// Non-success status without a recognizable OAuth error body.
    #[error("Token endpoint returned HTTP {status}: {body}")]
    TokenEndpoint {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The token response did not carry the fields a token record needs.
    #[error("Malformed token response")]
    MalformedTokenResponse(#[source] serde_json::Error),

    /// The provider issued no refresh token, so the session could not be kept alive.
    #[error("Token response did not include a refresh token")]
    MissingRefreshToken,

    /// The callback carried a `state` value other than the one this login generated.
    #[error("Login callback state mismatch, please run login again")]
    StateMismatch,

    /// The browser redirect reported an error instead of a code.
    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),

    /// No redirect arrived before the login timeout.
    #[error("Timed out after {0} seconds waiting for the browser login")]
    CallbackTimeout(u64),

    /// The listener stopped without receiving an authorization code.
    #[error("Login callback listener closed before a code was received")]
    CallbackAborted,

    #[error("Could not listen on localhost:{port}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not build authorization URL")]
    Url(#[from] url::ParseError),

    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("JSON error")]
    Json(#[from] serde_json::Error),
}

fn describe(description: &Option<String>) -> String {
    description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
}

/// Errors that can occur while packaging or uploading an extension.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("No {} folder found, nothing to publish...", .0.display())]
    NothingToPublish(PathBuf),

    #[error("Manifest {} not found", .0.display())]
    MissingManifest(PathBuf),

    #[error("Archive already contains an entry named {0}")]
    DuplicateEntry(String),

    #[error("Failed to publish extension (HTTP {status}):\n{body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Could not obtain an access token")]
    Auth(#[from] AuthError),

    #[error("Archive error")]
    Zip(#[from] zip::result::ZipError),

    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while creating a new extension project.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("Invalid extension name {0:?}: use a plain directory name")]
    InvalidName(String),

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}
