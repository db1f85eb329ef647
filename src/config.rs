// Configuration: every endpoint and identifier the CLI talks to lives here so
// that tests (and staging setups) can point the client somewhere else.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Base URL of the identity provider (authorization and token endpoints).
pub const DEFAULT_LOGIN_URL: &str = "https://login.elfsquad.io";
/// Base URL of the Elfsquad API.
pub const DEFAULT_API_URL: &str = "https://api.elfsquad.io";
pub const DEFAULT_CLIENT_ID: &str = "elfsquad-cli";
pub const DEFAULT_SCOPE: &str = "openid profile email offline_access";
/// Port of the local redirect target `http://localhost:8888`.
pub const DEFAULT_CALLBACK_PORT: u16 = 8888;
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 300;

/// Directory under the home directory holding the credential file.
const CREDENTIALS_DIR: &str = ".elfsquad";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub authorize_url: String,
    pub token_url: String,
    pub publish_url: String,
    pub client_id: String,
    pub scope: String,
    pub callback_port: u16,
    /// `None` waits for the browser redirect forever.
    pub login_timeout: Option<Duration>,
    pub credentials_dir: PathBuf,
}

impl Config {
    /// Build a configuration for the given service base URLs, keeping every
    /// other setting at its default.
    pub fn with_base_urls(login_url: &str, api_url: &str) -> Self {
        let login_url = login_url.trim_end_matches('/');
        let api_url = api_url.trim_end_matches('/');
        Config {
            authorize_url: format!("{login_url}/oauth2/auth"),
            token_url: format!("{login_url}/oauth2/token"),
            publish_url: format!("{api_url}/api/2/extensions"),
            client_id: DEFAULT_CLIENT_ID.into(),
            scope: DEFAULT_SCOPE.into(),
            callback_port: DEFAULT_CALLBACK_PORT,
            login_timeout: Some(Duration::from_secs(DEFAULT_LOGIN_TIMEOUT_SECS)),
            credentials_dir: default_credentials_dir(),
        }
    }

    /// Read overrides from `ELFSQUAD_*` environment variables, falling back to
    /// the production endpoints.
    pub fn from_env() -> Result<Self, ConfigError> {
        let login_url = std::env::var("ELFSQUAD_LOGIN_URL").unwrap_or_else(|_| DEFAULT_LOGIN_URL.into());
        let api_url = std::env::var("ELFSQUAD_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let mut config = Config::with_base_urls(&login_url, &api_url);

        if let Ok(client_id) = std::env::var("ELFSQUAD_CLIENT_ID") {
            config.client_id = client_id;
        }
        if let Some(port) = parse_env::<u16>("ELFSQUAD_CALLBACK_PORT")? {
            config.callback_port = port;
        }
        if let Some(secs) = parse_env::<u64>("ELFSQUAD_LOGIN_TIMEOUT_SECS")? {
            config.login_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Ok(dir) = std::env::var("ELFSQUAD_HOME") {
            config.credentials_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Redirect URI registered for the CLI client.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.callback_port)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_dir.join(crate::credentials::CREDENTIALS_FILE)
    }
}

fn default_credentials_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(CREDENTIALS_DIR)
}

fn parse_env<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        Err(_) => Ok(None),
    }
}
