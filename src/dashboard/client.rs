// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! HTTP client for the dashboard backend
//!
//! The backend keeps the uploaded kubeconfig in a cookie session, so every
//! call carries `Cookie: sessionToken=...`. Read helpers that degrade to an
//! empty result live next to the client so callers can choose between the
//! fallible and the forgiving form.

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, StatusCode, multipart};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::resource::{ResourceRecord, ResourceType};

/// Timeout for establishing a connection to the backend
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a whole request/response exchange
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the session cookie set by `/upload`
pub const SESSION_COOKIE: &str = "sessionToken";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend did not return a session cookie")]
    MissingSession,

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Operations the dashboard consumes from the backend
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn fetch_namespaces(&self) -> Result<Vec<String>, ApiError>;

    async fn fetch_resources(
        &self,
        namespace: &str,
        resource_type: ResourceType,
    ) -> Result<Vec<ResourceRecord>, ApiError>;

    async fn trigger_rollout(
        &self,
        resource_type: ResourceType,
        namespace: &str,
        name: &str,
    ) -> Result<(), ApiError>;

    /// Name of the user owning the current session
    async fn auth_check(&self) -> Result<String, ApiError>;
}

/// Namespaces, or an empty list when the call fails
pub async fn namespaces_or_empty<A: DashboardApi + ?Sized>(api: &A) -> Vec<String> {
    match api.fetch_namespaces().await {
        Ok(namespaces) => namespaces,
        Err(e) => {
            warn!(error = %e, "Error getting namespaces");
            Vec::new()
        }
    }
}

/// Resources of one type, or an empty list when the call fails
pub async fn resources_or_empty<A: DashboardApi + ?Sized>(
    api: &A,
    namespace: &str,
    resource_type: ResourceType,
) -> Vec<ResourceRecord> {
    match api.fetch_resources(namespace, resource_type).await {
        Ok(records) => records,
        Err(e) => {
            warn!(
                namespace = %namespace,
                resource_type = %resource_type,
                error = %e,
                "Error getting resources"
            );
            Vec::new()
        }
    }
}

#[derive(Deserialize)]
struct UserResponse {
    user: String,
}

/// Result of a successful `/upload`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: String,
}

/// reqwest-backed implementation of [`DashboardApi`]
#[derive(Clone)]
pub struct HttpDashboardClient {
    http: Client,
    base_url: String,
    session_token: Option<String>,
}

impl HttpDashboardClient {
    pub fn new(base_url: &str, session_token: Option<String>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(|source| ApiError::Network {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.session_token {
            Some(token) => builder.header(COOKIE, format!("{}={}", SESSION_COOKIE, token)),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await.map_err(|source| ApiError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        debug!(url = %url, status = %status, "Dashboard API response");
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self
            .send(self.request(reqwest::Method::GET, &url), &url)
            .await?;
        response
            .json()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }

    /// Upload a kubeconfig and open a new session
    pub async fn login(&self, kubeconfig: &Path) -> Result<Session, ApiError> {
        let content = tokio::fs::read(kubeconfig)
            .await
            .map_err(|source| ApiError::Io {
                path: kubeconfig.display().to_string(),
                source,
            })?;

        let part = multipart::Part::bytes(content).file_name("kubeconfig");
        let form = multipart::Form::new().part("kubeconfig", part);

        let url = self.url("/upload");
        let response = self
            .send(
                self.request(reqwest::Method::POST, &url).multipart(form),
                &url,
            )
            .await?;

        let token = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(session_token_from_cookie)
            .ok_or(ApiError::MissingSession)?;

        let body: UserResponse = response
            .json()
            .await
            .map_err(|source| ApiError::Decode { url, source })?;

        Ok(Session {
            token,
            user: body.user,
        })
    }

    /// Drop the server-side session
    pub async fn logout(&self) -> Result<(), ApiError> {
        let url = self.url("/logout");
        self.send(self.request(reqwest::Method::POST, &url), &url)
            .await?;
        Ok(())
    }
}

/// Extract the session token from one `Set-Cookie` header value
fn session_token_from_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
}

#[async_trait]
impl DashboardApi for HttpDashboardClient {
    async fn fetch_namespaces(&self) -> Result<Vec<String>, ApiError> {
        self.get_json("/api/v1/namespaces/").await
    }

    async fn fetch_resources(
        &self,
        namespace: &str,
        resource_type: ResourceType,
    ) -> Result<Vec<ResourceRecord>, ApiError> {
        let path = format!(
            "/api/v1/{}/namespace/{}",
            resource_type.api_path(),
            namespace
        );
        let mut records: Vec<ResourceRecord> = self.get_json(&path).await?;
        for record in &mut records {
            record.resource_type = resource_type;
        }
        Ok(records)
    }

    async fn trigger_rollout(
        &self,
        resource_type: ResourceType,
        namespace: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!(
            "/api/v1/{}/{}/rollout/{}",
            resource_type.api_path(),
            namespace,
            name
        ));
        self.send(self.request(reqwest::Method::POST, &url), &url)
            .await?;
        Ok(())
    }

    async fn auth_check(&self) -> Result<String, ApiError> {
        let body: UserResponse = self.get_json("/api/v1/authcheck").await?;
        Ok(body.user)
    }
}
