//! Token lifecycle: interactive login, logout and access-token refresh.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rand::RngCore;
use tracing::{debug, info, warn};
use url::Url;

use crate::callback::{AuthorizationSession, CallbackListener};
use crate::config::Config;
use crate::credentials::{CredentialStore, TokenGrant};
use crate::error::AuthError;

/// The identity provider's token endpoint.
pub trait TokenEndpoint {
    /// Exchange an authorization code (grant type `authorization_code`).
    fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError>;
    /// Mint a new access token (grant type `refresh_token`).
    fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError>;
}

/// Anything that can hand out a currently valid access token.
pub trait AccessTokenSource {
    fn access_token(&self) -> Result<Option<String>, AuthError>;
}

/// Generate the anti-forgery `state` value for one login.
///
/// 32 random bytes, base64url encoded without padding (43 characters).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Owns the persisted session and talks to the token endpoint.
pub struct TokenService<E> {
    config: Config,
    store: CredentialStore,
    endpoint: E,
}

impl<E: TokenEndpoint> TokenService<E> {
    pub fn new(config: Config, endpoint: E) -> Self {
        let store = CredentialStore::new(config.credentials_path());
        TokenService { config, store, endpoint }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Authorization URL the browser is sent to.
    pub fn authorization_url(&self, state: &str) -> Result<Url, AuthError> {
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri().as_str()),
                ("scope", self.config.scope.as_str()),
                ("response_type", "code"),
                ("state", state),
            ],
        )?;
        Ok(url)
    }

    /// Run the interactive login.
    ///
    /// Binds the callback listener first so the redirect cannot race it, then
    /// hands the authorization URL to `open_browser` and blocks until the
    /// listener has consumed one code (or failed, or timed out).
    pub fn login<B>(&self, open_browser: B) -> Result<(), AuthError>
    where
        B: FnOnce(&Url),
    {
        let listener = CallbackListener::bind(self.config.callback_port, self.config.login_timeout)?;
        let state = generate_state();
        let url = self.authorization_url(&state)?;

        open_browser(&url);

        let session = AuthorizationSession::new(state);
        listener.serve(session, |code| self.complete_login(code))?;
        info!("login completed");
        Ok(())
    }

    /// Exchange an authorization code and persist the resulting record.
    pub fn complete_login(&self, code: &str) -> Result<(), AuthError> {
        let grant = self.endpoint.exchange_code(code)?;
        let record = grant.into_record(Utc::now().timestamp(), None)?;
        self.store.save(&record)?;
        Ok(())
    }

    /// Forget the stored session. Nothing stored is not an error.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.delete()?;
        Ok(())
    }
}

impl<E: TokenEndpoint> AccessTokenSource for TokenService<E> {
    /// Return a valid access token, refreshing a stale one.
    ///
    /// No stored session yields `Ok(None)` without touching the network. A
    /// failed refresh is an error; the stale token is never handed out.
    fn access_token(&self) -> Result<Option<String>, AuthError> {
        let Some(record) = self.store.load() else {
            return Ok(None);
        };

        let now = Utc::now().timestamp();
        if !record.is_stale_at(now) {
            return Ok(Some(record.access_token));
        }

        debug!(expired_at = record.expires_at(), "access token expired, refreshing");
        let grant = self.endpoint.refresh(&record.refresh_token).map_err(|e| {
            warn!(error = ?e, "token refresh failed");
            e
        })?;
        let refreshed = grant.into_record(Utc::now().timestamp(), Some(&record.refresh_token))?;
        self.store.save(&refreshed)?;
        Ok(Some(refreshed.access_token))
    }
}
