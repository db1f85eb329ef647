// API client module: a small blocking HTTP client for the two remote
// services the CLI talks to, the identity provider's token endpoint and the
// Elfsquad extensions API.

use anyhow::Context;
use reqwest::blocking::{multipart, Client};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::credentials::TokenGrant;
use crate::error::{AuthError, PublishError};
use crate::publish::{ExtensionUploader, PackagedExtension};
use crate::token::TokenEndpoint;

/// Uploads can be a few megabytes; give them more room than the default.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Blocking API client holding the reqwest client and the endpoints and
/// client identifiers taken from [`Config`].
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    token_url: String,
    publish_url: String,
    client_id: String,
    redirect_uri: String,
}

impl ApiClient {
    /// Create an ApiClient for the endpoints in `config`.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("elfsquad-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            token_url: config.token_url.clone(),
            publish_url: config.publish_url.clone(),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri(),
        })
    }

    /// POST a form to the token endpoint and validate the answer.
    ///
    /// A JSON body with an `error` field is a provider rejection, whatever
    /// the status code.
    fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenGrant, AuthError> {
        let res = self.client.post(&self.token_url).form(form).send()?;
        let status = res.status();
        let body = res.text()?;
        debug!(%status, "token endpoint responded");

        if let Ok(value) = serde_json::from_str::<Value>(&body) {
            if let Some(error) = value.get("error").and_then(Value::as_str) {
                return Err(AuthError::Provider {
                    error: error.to_string(),
                    description: value
                        .get("error_description")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                });
            }
        }
        if !status.is_success() {
            return Err(AuthError::TokenEndpoint { status, body });
        }
        serde_json::from_str(&body).map_err(AuthError::MalformedTokenResponse)
    }
}

impl TokenEndpoint for ApiClient {
    fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError> {
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
    }

    fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ])
    }
}

impl ExtensionUploader for ApiClient {
    /// Upload the archive as multipart/form-data in the `file` field. The
    /// Authorization header is only sent when a token is present.
    fn upload(&self, package: &PackagedExtension, access_token: Option<&str>) -> Result<(), PublishError> {
        let part = multipart::Part::bytes(package.bytes.clone())
            .file_name(package.file_name.clone())
            .mime_str("application/zip")?;
        let form = multipart::Form::new().part("file", part);

        let mut req = self.client.post(&self.publish_url).multipart(form);
        if let Some(token) = access_token {
            req = req.bearer_auth(token);
        }

        let res = req.send()?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_else(|_| "".into());
            return Err(PublishError::Rejected { status, body });
        }
        let _: Value = res.json()?;
        Ok(())
    }
}
