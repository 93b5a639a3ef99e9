//! FCM HTTP v1 的 OAuth2 access token 来源
//!
//! 支持两种方式：
//! - 配置中直接给出的静态 token（本地调试、外部注入）
//! - Google service account 私钥：签发 RS256 JWT assertion，向 `token_uri` 换取 access token，
//!   缓存到过期前 60 秒

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, ServerError};

/// FCM 发送所需的 OAuth2 scope
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_TTL_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// Service account 密钥文件（Google Cloud 控制台导出的 JSON）
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// 从 JSON 文件读取
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ServerError::Configuration(format!(
                "Failed to read service account key {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            ServerError::Configuration(format!("Invalid service account key: {}", e))
        })
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_TTL_SECS
}

/// 缓存的 access token
#[derive(Debug, Clone)]
pub struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Access token 来源
pub enum AccessTokenSource {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        encoding_key: EncodingKey,
        client: Client,
        cache: RwLock<Option<CachedToken>>,
    },
}

impl AccessTokenSource {
    pub fn from_static(token: impl Into<String>) -> Self {
        AccessTokenSource::Static(token.into())
    }

    pub fn from_service_account(key: ServiceAccountKey, client: Client) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            ServerError::Configuration(format!("Failed to parse service account private key: {}", e))
        })?;

        Ok(AccessTokenSource::ServiceAccount {
            key,
            encoding_key,
            client,
            cache: RwLock::new(None),
        })
    }

    /// 获取可用的 access token（必要时刷新）
    pub async fn access_token(&self) -> Result<String> {
        match self {
            AccessTokenSource::Static(token) => Ok(token.clone()),
            AccessTokenSource::ServiceAccount {
                key,
                encoding_key,
                client,
                cache,
            } => {
                if let Some(token) = fresh_token(&*cache.read().await) {
                    return Ok(token);
                }

                let mut cached = cache.write().await;
                // 其他调用可能已经刷新
                if let Some(token) = fresh_token(&*cached) {
                    return Ok(token);
                }

                let fresh = exchange_assertion(key, encoding_key, client).await?;
                let value = fresh.value.clone();
                *cached = Some(fresh);
                Ok(value)
            }
        }
    }
}

fn fresh_token(cached: &Option<CachedToken>) -> Option<String> {
    cached
        .as_ref()
        .filter(|t| t.is_fresh(Utc::now()))
        .map(|t| t.value.clone())
}

fn sign_assertion(key: &ServiceAccountKey, encoding_key: &EncodingKey, now: DateTime<Utc>) -> Result<String> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: FCM_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_TTL_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    Ok(encode(&header, &claims, encoding_key)?)
}

async fn exchange_assertion(
    key: &ServiceAccountKey,
    encoding_key: &EncodingKey,
    client: &Client,
) -> Result<CachedToken> {
    let now = Utc::now();
    let assertion = sign_assertion(key, encoding_key, now)?;

    debug!("[OAUTH] Requesting access token: client_email={}", key.client_email);

    let response = client
        .post(&key.token_uri)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ServerError::Authentication(format!(
            "token exchange failed: status={}, error={}",
            status, error_text
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ServerError::Authentication(format!("invalid token response: {}", e)))?;

    info!(
        "[OAUTH] Access token refreshed: client_email={}, expires_in={}s",
        key.client_email, token.expires_in
    );

    Ok(CachedToken {
        value: token.access_token,
        expires_at: now + Duration::seconds(token.expires_in),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let source = AccessTokenSource::from_static("ya29.static");
        assert_eq!(source.access_token().await.unwrap(), "ya29.static");
    }

    #[test]
    fn test_service_account_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email":"a@b.iam.gserviceaccount.com","private_key":"pem"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(key.project_id.is_none());
    }

    #[test]
    fn test_invalid_key_is_configuration_error() {
        let err = ServiceAccountKey::from_json("{}").unwrap_err();
        assert!(matches!(err, ServerError::Configuration(_)));
    }

    #[test]
    fn test_bad_private_key_rejected() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email":"a@b.iam.gserviceaccount.com","private_key":"not a pem"}"#,
        )
        .unwrap();
        let result = AccessTokenSource::from_service_account(key, Client::new());
        assert!(matches!(result, Err(ServerError::Configuration(_))));
    }

    #[test]
    fn test_cached_token_refresh_margin() {
        let now = Utc::now();
        let fresh = CachedToken {
            value: "t".to_string(),
            expires_at: now + Duration::seconds(3599),
        };
        let stale = CachedToken {
            value: "t".to_string(),
            expires_at: now + Duration::seconds(30),
        };
        assert!(fresh.is_fresh(now));
        assert!(!stale.is_fresh(now));
    }
}
