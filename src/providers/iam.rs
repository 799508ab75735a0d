//! IAM token acquisition and caching

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use super::CloudError;
use crate::config::DatasourceSettings;

const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const JWT_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Deserialize)]
struct ServiceAccountKey {
    id: String,
    service_account_id: String,
    private_key: String,
}

/// How the datasource authenticates
pub enum Credentials {
    ServiceAccount {
        key_id: String,
        service_account_id: String,
        encoding_key: EncodingKey,
    },
    /// Token from the compute instance metadata service
    Instance,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceAccount {
                key_id,
                service_account_id,
                ..
            } => f
                .debug_struct("ServiceAccount")
                .field("key_id", key_id)
                .field("service_account_id", service_account_id)
                .finish_non_exhaustive(),
            Self::Instance => f.write_str("Instance"),
        }
    }
}

impl Credentials {
    /// Parse a service-account key; an empty string selects instance credentials
    pub fn from_key_json(key_json: &str) -> Result<Self, CloudError> {
        if key_json.trim().is_empty() {
            return Ok(Self::Instance);
        }

        let key: ServiceAccountKey = serde_json::from_str(key_json)
            .map_err(|e| CloudError::Credentials(format!("malformed service account key: {}", e)))?;

        // Keys exported by the console carry a banner line before the PEM block
        let pem = match key.private_key.find("-----BEGIN") {
            Some(start) => &key.private_key[start..],
            None => key.private_key.as_str(),
        };
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| CloudError::Credentials(format!("invalid private key: {}", e)))?;

        Ok(Self::ServiceAccount {
            key_id: key.id,
            service_account_id: key.service_account_id,
            encoding_key,
        })
    }
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Serialize)]
struct IamTokenRequest {
    jwt: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IamTokenResponse {
    iam_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Cached IAM token, refreshed a minute before it expires
pub struct TokenSource {
    http: Client,
    credentials: Credentials,
    iam_endpoint: String,
    metadata_endpoint: String,
    timeout: Duration,
    cached: ArcSwapOption<CachedToken>,
    refresh: Mutex<()>,
}

impl TokenSource {
    pub fn new(http: Client, credentials: Credentials, settings: &DatasourceSettings) -> Self {
        Self {
            http,
            credentials,
            iam_endpoint: settings.iam_endpoint.clone(),
            metadata_endpoint: settings.metadata_endpoint.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.timeout_seconds),
            cached: ArcSwapOption::empty(),
            refresh: Mutex::new(()),
        }
    }

    /// Current token, fetching a new one when missing or about to expire
    pub async fn token(&self) -> Result<String, CloudError> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        // Another caller may have refreshed while we waited
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let fetched = match &self.credentials {
            Credentials::ServiceAccount {
                key_id,
                service_account_id,
                encoding_key,
            } => self.exchange_jwt(key_id, service_account_id, encoding_key).await?,
            Credentials::Instance => self.metadata_token().await?,
        };
        debug!(expires_at = %fetched.expires_at, "IAM token refreshed");

        let token = fetched.token.clone();
        self.cached.store(Some(Arc::new(fetched)));
        Ok(token)
    }

    fn fresh_token(&self) -> Option<String> {
        let cached = self.cached.load_full()?;
        let deadline = cached.expires_at - ChronoDuration::seconds(REFRESH_MARGIN_SECS);
        (Utc::now() < deadline).then(|| cached.token.clone())
    }

    async fn exchange_jwt(
        &self,
        key_id: &str,
        service_account_id: &str,
        encoding_key: &EncodingKey,
    ) -> Result<CachedToken, CloudError> {
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            iss: service_account_id,
            aud: &self.iam_endpoint,
            iat: now,
            exp: now + JWT_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::PS256);
        header.kid = Some(key_id.to_string());
        let jwt = jsonwebtoken::encode(&header, &claims, encoding_key)
            .map_err(|e| CloudError::Token(format!("failed to sign JWT: {}", e)))?;

        let response = self
            .http
            .post(&self.iam_endpoint)
            .timeout(self.timeout)
            .json(&IamTokenRequest { jwt })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CloudError::Token(format!("IAM endpoint returned {}: {}", status, error_text)));
        }

        let body: IamTokenResponse = response.json().await?;
        Ok(CachedToken {
            token: body.iam_token,
            expires_at: body.expires_at,
        })
    }

    async fn metadata_token(&self) -> Result<CachedToken, CloudError> {
        let url = format!("{}{}", self.metadata_endpoint, METADATA_TOKEN_PATH);
        let response = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CloudError::Token(format!(
                "metadata service returned {}: {}",
                status, error_text
            )));
        }

        let body: MetadataTokenResponse = response.json().await?;
        Ok(CachedToken {
            token: body.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(body.expires_in),
        })
    }
}
