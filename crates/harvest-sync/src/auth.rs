//! # Vendor Authentication Manager
//!
//! Owns the OAuth2 credential lifecycle: the authorization-code exchange on
//! first connect and refresh-before-use afterwards.
//!
//! ## Authentication Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Vendor Authentication Flow                        │
//! │                                                                         │
//! │  ┌──────────────┐      ┌─────────────────┐      ┌──────────────────┐   │
//! │  │  Dashboard   │      │  AuthManager    │      │  Token endpoint  │   │
//! │  └──────┬───────┘      └────────┬────────┘      └────────┬─────────┘   │
//! │         │ 1. authorization_url  │                        │             │
//! │         │──────────────────────►│                        │             │
//! │         │   {auth_url, state}   │                        │             │
//! │         │◄──────────────────────│                        │             │
//! │         │                       │                        │             │
//! │         │ 2. callback(code)     │  grant_type=           │             │
//! │         │──────────────────────►│  authorization_code    │             │
//! │         │                       │───────────────────────►│             │
//! │         │                       │◄───────────────────────│             │
//! │         │                       │  replace_all (1 tx)    │             │
//! │         │                       │                        │             │
//! │         │  [Later: any sync]    │                        │             │
//! │         │ 3. valid_access_token │  policy says refresh?  │             │
//! │         │──────────────────────►│  grant_type=           │             │
//! │         │                       │  refresh_token         │             │
//! │         │                       │───────────────────────►│             │
//! │         │                       │  update_tokens         │             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every read-refresh-write sequence runs under one mutex, so concurrent
//! callers never refresh the same credential twice.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::OAuthSettings;
use crate::error::{SyncError, SyncResult};
use harvest_core::{Credential, RefreshPolicy, TokenGrant};
use harvest_db::{CredentialRepository, DbResult};

// =============================================================================
// Credential Store
// =============================================================================

/// Persistence seam for the single active credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The most recently created credential, if any.
    async fn latest(&self) -> DbResult<Option<Credential>>;

    /// Deletes every credential and inserts one, atomically.
    async fn replace_all(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
        scopes: &str,
    ) -> DbResult<Credential>;

    /// Overwrites the tokens of an existing credential in place.
    async fn update_tokens(
        &self,
        id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()>;
}

#[async_trait]
impl CredentialStore for CredentialRepository {
    async fn latest(&self) -> DbResult<Option<Credential>> {
        CredentialRepository::latest(self).await
    }

    async fn replace_all(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
        scopes: &str,
    ) -> DbResult<Credential> {
        CredentialRepository::replace_all(self, access_token, refresh_token, expires_at, scopes)
            .await
    }

    async fn update_tokens(
        &self,
        id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()> {
        CredentialRepository::update_tokens(self, id, access_token, refresh_token, expires_at)
            .await
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Where to send the user to grant access.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    pub auth_url: String,
    pub state: String,
}

/// Connection state shown on the settings page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl AuthStatus {
    fn disconnected() -> Self {
        AuthStatus {
            connected: false,
            is_expired: None,
            expires_at: None,
            scopes: None,
            last_updated: None,
        }
    }
}

// =============================================================================
// Auth Manager
// =============================================================================

/// The single synchronized accessor for the vendor credential.
pub struct AuthManager {
    store: Arc<dyn CredentialStore>,
    http: Client,
    oauth: OAuthSettings,
    policy: RefreshPolicy,
    lock: Mutex<()>,
}

impl AuthManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        oauth: OAuthSettings,
        policy: RefreshPolicy,
        timeout: std::time::Duration,
    ) -> SyncResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(AuthManager {
            store,
            http,
            oauth,
            policy,
            lock: Mutex::new(()),
        })
    }

    /// Returns an access token that is valid now, refreshing it first when
    /// the policy says so.
    ///
    /// ## Returns
    /// * `Ok(Some(token))` - ready to use
    /// * `Ok(None)` - nothing stored, or the refresh was rejected
    /// * `Err(_)` - the credential store failed
    pub async fn valid_access_token(&self) -> SyncResult<Option<String>> {
        let _guard = self.lock.lock().await;

        let Some(credential) = self.store.latest().await? else {
            debug!("No vendor credential stored");
            return Ok(None);
        };

        let now = Utc::now();
        if !self.policy.needs_refresh(credential.expires_at, now) {
            return Ok(Some(credential.access_token));
        }

        debug!(expires_at = %credential.expires_at, "Access token needs refresh");
        match self.refresh(&credential).await {
            Ok(refreshed) => Ok(Some(refreshed.access_token)),
            Err(SyncError::TokenExchangeFailed(details)) => {
                warn!(%details, "Token refresh rejected");
                Ok(None)
            }
            Err(SyncError::Upstream(e)) => {
                warn!(error = %e, "Token refresh failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Refreshes regardless of expiry.
    ///
    /// ## Returns
    /// The new expiry instant.
    pub async fn force_refresh(&self) -> SyncResult<DateTime<Utc>> {
        let _guard = self.lock.lock().await;

        let credential = self
            .store
            .latest()
            .await?
            .ok_or(SyncError::NotAuthenticated)?;
        let refreshed = self.refresh(&credential).await?;
        Ok(refreshed.expires_at)
    }

    /// Exchanges an authorization code and replaces every stored credential
    /// with the result.
    pub async fn exchange_code(&self, code: &str) -> SyncResult<Credential> {
        let _guard = self.lock.lock().await;

        let grant = self
            .request_grant(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
            ])
            .await?;

        let expires_at = expiry_after(Utc::now(), grant.expires_in)?;
        let scopes = grant
            .scope
            .as_deref()
            .filter(|scope| !scope.is_empty())
            .unwrap_or(self.oauth.scopes.as_str());
        let refresh_token = grant.refresh_token.as_deref().unwrap_or_default();

        let credential = self
            .store
            .replace_all(&grant.access_token, refresh_token, expires_at, scopes)
            .await?;

        info!(%expires_at, "Vendor account connected");
        Ok(credential)
    }

    /// Connection state without triggering a refresh.
    pub async fn status(&self) -> SyncResult<AuthStatus> {
        let Some(credential) = self.store.latest().await? else {
            return Ok(AuthStatus::disconnected());
        };

        Ok(AuthStatus {
            connected: true,
            is_expired: Some(credential.is_expired_at(Utc::now())),
            expires_at: Some(credential.expires_at),
            scopes: Some(credential.scopes),
            last_updated: Some(credential.updated_at),
        })
    }

    /// Builds the vendor login URL with a fresh `state`.
    pub fn authorization_url(&self) -> SyncResult<AuthorizationRequest> {
        let state = Uuid::new_v4().to_string();
        let url = Url::parse_with_params(
            &self.oauth.auth_url,
            &[
                ("response_type", "code"),
                ("scope", self.oauth.scopes.as_str()),
                ("client_id", self.oauth.client_id.as_str()),
                ("state", state.as_str()),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
            ],
        )?;

        Ok(AuthorizationRequest {
            auth_url: url.into(),
            state,
        })
    }

    /// Builds the URL where the user selects organizations to share.
    pub fn connect_organizations_url(&self) -> SyncResult<String> {
        let base = format!(
            "{}/{}/select-organizations",
            self.oauth.connections_url.trim_end_matches('/'),
            self.oauth.client_id
        );
        let url = Url::parse_with_params(
            &base,
            &[("redirect_uri", self.oauth.redirect_uri.as_str())],
        )?;
        Ok(url.into())
    }

    // =========================================================================
    // Token Endpoint
    // =========================================================================

    /// Posts a refresh grant and writes the result over `credential`.
    ///
    /// The refresh token only rotates when the server returns a new one.
    async fn refresh(&self, credential: &Credential) -> SyncResult<Credential> {
        let grant = self
            .request_grant(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credential.refresh_token.as_str()),
            ])
            .await?;

        let now = Utc::now();
        let expires_at = expiry_after(now, grant.expires_in)?;
        let refresh_token = grant
            .refresh_token
            .unwrap_or_else(|| credential.refresh_token.clone());

        self.store
            .update_tokens(&credential.id, &grant.access_token, &refresh_token, expires_at)
            .await?;

        info!(%expires_at, "Access token refreshed");
        Ok(Credential {
            access_token: grant.access_token,
            refresh_token,
            expires_at,
            updated_at: now,
            ..credential.clone()
        })
    }

    async fn request_grant(&self, params: &[(&str, &str)]) -> SyncResult<TokenGrant> {
        let resp = self
            .http
            .post(&self.oauth.token_url)
            .basic_auth(&self.oauth.client_id, Some(&self.oauth.client_secret))
            .form(params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::TokenExchangeFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        resp.json::<TokenGrant>()
            .await
            .map_err(|e| SyncError::TokenExchangeFailed(format!("Invalid token response: {}", e)))
    }
}

/// Expiry instant for a grant issued at `now` with `expires_in` seconds.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> SyncResult<DateTime<Utc>> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            SyncError::TokenExchangeFailed(format!("expires_in out of range: {}", expires_in))
        })
}
