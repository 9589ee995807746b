// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Google Cloud DNS backend.
//!
//! Talks to the Cloud DNS v1 REST API with `reqwest`. Authentication uses a
//! service account JSON key: a signed RS256 assertion is exchanged for an
//! OAuth2 access token, which is cached until shortly before it expires.
//!
//! Record names are sent with a trailing dot, as are CNAME targets.

use super::{BackendError, BackendRecord, DnsBackend};
use crate::constants::{
    CLOUDDNS_SCOPE, GOOGLE_TOKEN_URI, JWT_ASSERTION_LIFETIME_SECS, TOKEN_REFRESH_MARGIN_SECS,
};
use crate::crd::DnsRecordType;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{header::CONTENT_TYPE, Method};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

// ============================================================================
// Authentication
// ============================================================================

/// Source of OAuth2 bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, BackendError>;
}

/// Fixed token, for tests and pre-authenticated environments.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String, BackendError> {
        Ok(self.0.clone())
    }
}

/// Fields of a Google service account key file the backend needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parse a JSON key file.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Credentials`] when the JSON is malformed or a
    /// required field is missing.
    pub fn from_json(bytes: &[u8]) -> Result<Self, BackendError> {
        serde_json::from_slice(bytes).map_err(|e| {
            BackendError::Credentials(format!("invalid service account key: {e}"))
        })
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges signed service account assertions for access tokens.
pub struct ServiceAccountTokenSource {
    http: reqwest::Client,
    email: String,
    token_uri: String,
    key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    /// # Errors
    ///
    /// Returns [`BackendError::Jwt`] when the private key is not a valid RSA PEM.
    pub fn new(http: reqwest::Client, key: &ServiceAccountKey) -> Result<Self, BackendError> {
        Ok(Self {
            http,
            email: key.client_email.clone(),
            token_uri: key
                .token_uri
                .clone()
                .unwrap_or_else(|| GOOGLE_TOKEN_URI.to_string()),
            key: EncodingKey::from_rsa_pem(key.private_key.as_bytes())?,
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, BackendError> {
        let claims = Claims {
            iss: &self.email,
            scope: CLOUDDNS_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + JWT_ASSERTION_LIFETIME_SECS,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.key,
        )?)
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn token(&self) -> Result<String, BackendError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Cloud DNS access token for {}", self.email);
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer")
            .append_pair("assertion", &self.assertion(now)?)
            .finish();

        let response = self
            .http
            .post(&self.token_uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|source| BackendError::Http {
                url: self.token_uri.clone(),
                source,
            })?;
        let response = check_status("POST", &self.token_uri, response).await?;
        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|source| BackendError::Http {
                    url: self.token_uri.clone(),
                    source,
                })?;

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in.unwrap_or(3600)),
        });
        Ok(value)
    }
}

async fn check_status(
    method: &'static str,
    url: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Api {
        method,
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

// ============================================================================
// API types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZone {
    dns_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceRecordSet {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    ttl: i32,
    #[serde(default)]
    rrdatas: Vec<String>,
}

#[derive(Deserialize)]
struct RrsetList {
    #[serde(default)]
    rrsets: Vec<ResourceRecordSet>,
}

#[derive(Serialize)]
struct Change {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    additions: Vec<ResourceRecordSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    deletions: Vec<ResourceRecordSet>,
}

fn absolute(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

impl From<&BackendRecord> for ResourceRecordSet {
    fn from(record: &BackendRecord) -> Self {
        let data = match record.record_type {
            DnsRecordType::Cname => absolute(&record.data),
            DnsRecordType::A => record.data.clone(),
        };
        Self {
            name: absolute(&record.name),
            record_type: record.record_type.to_string(),
            ttl: record.ttl,
            rrdatas: vec![data],
        }
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Backend bound to one Cloud DNS managed zone.
pub struct CloudDnsBackend {
    http: reqwest::Client,
    endpoint: Url,
    project: String,
    zone: String,
    domain: String,
    tokens: Arc<dyn TokenSource>,
}

impl fmt::Debug for CloudDnsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudDnsBackend")
            .field("project", &self.project)
            .field("zone", &self.zone)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl CloudDnsBackend {
    /// Connect using a service account JSON key.
    ///
    /// # Errors
    ///
    /// Fails when the key is invalid, no token can be obtained, or the managed
    /// zone cannot be read.
    pub async fn connect(
        http: reqwest::Client,
        endpoint: Url,
        zone: &str,
        credentials: &[u8],
    ) -> Result<Self, BackendError> {
        let key = ServiceAccountKey::from_json(credentials)?;
        let tokens = Arc::new(ServiceAccountTokenSource::new(http.clone(), &key)?);
        Self::with_token_source(http, endpoint, &key.project_id, zone, tokens).await
    }

    /// Connect with an explicit token source and resolve the zone's DNS name.
    ///
    /// # Errors
    ///
    /// Fails when the managed zone cannot be read.
    pub async fn with_token_source(
        http: reqwest::Client,
        endpoint: Url,
        project: &str,
        zone: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, BackendError> {
        let mut backend = Self {
            http,
            endpoint,
            project: project.to_string(),
            zone: zone.to_string(),
            domain: String::new(),
            tokens,
        };

        let url = backend.url(&[])?;
        let managed: ManagedZone = backend
            .send(Method::GET, url, None::<&()>)
            .await?
            .json()
            .await
            .map_err(|source| BackendError::Http {
                url: backend.endpoint.to_string(),
                source,
            })?;
        backend.domain = managed.dns_name.trim_end_matches('.').to_string();

        info!(
            "Connected to Cloud DNS zone {} in project {} ({})",
            backend.zone, backend.project, backend.domain
        );
        Ok(backend)
    }

    /// `<endpoint>/projects/<project>/managedZones/<zone>/<extra...>`
    fn url(&self, extra: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::Endpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend([
                "projects",
                self.project.as_str(),
                "managedZones",
                self.zone.as_str(),
            ])
            .extend(extra);
        Ok(url)
    }

    async fn send<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, BackendError> {
        let token = self.tokens.token().await?;
        let method_name = if method == Method::POST { "POST" } else { "GET" };
        let mut request = self.http.request(method, url.clone()).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|source| BackendError::Http {
            url: url.to_string(),
            source,
        })?;
        check_status(method_name, url.as_str(), response).await
    }

    async fn find(&self, wanted: &ResourceRecordSet) -> Result<Option<ResourceRecordSet>, BackendError> {
        let mut url = self.url(&["rrsets"])?;
        url.query_pairs_mut()
            .append_pair("name", &wanted.name)
            .append_pair("type", &wanted.record_type);

        let list: RrsetList = self
            .send(Method::GET, url.clone(), None::<&()>)
            .await?
            .json()
            .await
            .map_err(|source| BackendError::Http {
                url: url.to_string(),
                source,
            })?;
        Ok(list.rrsets.into_iter().next())
    }

    async fn apply(&self, change: &Change) -> Result<(), BackendError> {
        let url = self.url(&["changes"])?;
        self.send(Method::POST, url, Some(change)).await?;
        Ok(())
    }
}

#[async_trait]
impl DnsBackend for CloudDnsBackend {
    async fn update(&self, record: &BackendRecord) -> Result<(), BackendError> {
        let wanted = ResourceRecordSet::from(record);
        let change = match self.find(&wanted).await? {
            Some(existing) if existing.ttl == wanted.ttl && existing.rrdatas == wanted.rrdatas => {
                debug!("{} {} already up to date", wanted.record_type, wanted.name);
                return Ok(());
            }
            Some(existing) => Change {
                additions: vec![wanted],
                deletions: vec![existing],
            },
            None => Change {
                additions: vec![wanted],
                deletions: vec![],
            },
        };
        self.apply(&change).await
    }

    async fn delete(&self, record: &BackendRecord) -> Result<(), BackendError> {
        let wanted = ResourceRecordSet::from(record);
        match self.find(&wanted).await? {
            Some(existing) if existing.ttl == wanted.ttl && existing.rrdatas == wanted.rrdatas => {
                self.apply(&Change {
                    additions: vec![],
                    deletions: vec![existing],
                })
                .await
            }
            Some(existing) => {
                debug!(
                    "{} {} now holds {:?}, not {:?}; leaving it in place",
                    wanted.record_type, wanted.name, existing.rrdatas, wanted.rrdatas
                );
                Ok(())
            }
            None => {
                debug!("{} {} already absent", wanted.record_type, wanted.name);
                Ok(())
            }
        }
    }

    fn identity(&self) -> String {
        format!("clouddns:{}/{}/{}", self.project, self.zone, self.domain)
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}

#[cfg(test)]
#[path = "clouddns_tests.rs"]
mod clouddns_tests;
