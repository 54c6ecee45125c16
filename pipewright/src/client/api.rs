//! Typed client for the pipeline coordination HTTP API.
//!
//! Every per-instance path carries the instance-variables query string, the
//! mechanism multiplexing many logical pipelines behind one named template.
//! Mutating calls are wrapped in the retry policy; the server's
//! replace-if-version-matches semantics make retried upserts safe.

use super::retry::{with_retry, RetryConfig};
use super::status::{resolve_status, JobInfo, PublishStatus};
use crate::definition::PipelineDefinition;
use crate::errors::ApiError;
use crate::settings::PipelineSettings;
use serde::Deserialize;
use tokio::sync::Mutex;

/// Header carrying the opaque config concurrency token.
pub const CONFIG_VERSION_HEADER: &str = "X-Concourse-Config-Version";

/// Opaque server-assigned config version token.
///
/// Read immediately before each update attempt and echoed back on update; a
/// missing token signals "create new" rather than "update".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineVersion(String);

impl PipelineVersion {
    /// Wraps a raw header value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw header value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ConfigResponse {
    config: PipelineDefinition,
}

/// Client for a Concourse-compatible pipeline coordination API.
///
/// Holds no cross-call shared mutable state other than the auth-token cache,
/// which is refreshed under a single-writer discipline so back-to-back
/// updates across many pipelines do not trigger redundant re-auth storms.
#[derive(Debug)]
pub struct PipelineApiClient {
    base_url: String,
    team: String,
    username: String,
    password: String,
    http: reqwest::Client,
    token: Mutex<Option<String>>,
    retry: RetryConfig,
}

impl PipelineApiClient {
    /// Creates a client from validated settings.
    #[must_use]
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            team: settings.api_team.clone(),
            username: settings.api_username.clone(),
            password: settings.api_password.clone(),
            http: reqwest::Client::new(),
            token: Mutex::new(None),
            retry: RetryConfig::default(),
        }
    }

    /// Replaces the retry policy for mutating calls.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builds a per-instance pipeline URL with the instance-variables query.
    fn pipeline_url(&self, pipeline: &str, suffix: &str, site: &str) -> Result<reqwest::Url, ApiError> {
        let path = format!(
            "{}/api/v1/teams/{}/pipelines/{pipeline}{suffix}",
            self.base_url, self.team
        );
        let vars = serde_json::json!({ "site": site }).to_string();
        reqwest::Url::parse_with_params(&path, &[("vars", vars.as_str())])
            .map_err(|e| ApiError::Decode(format!("invalid request url {path}: {e}")))
    }

    async fn authenticate(&self) -> Result<String, ApiError> {
        let url = format!("{}/sky/issuer/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth("fly", Some(""))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("scope", "openid profile email groups"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Auth {
                status: status.as_u16(),
            });
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(token.access_token)
    }

    /// Returns the cached bearer token, authenticating on first use.
    async fn bearer(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let token = self.authenticate().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Re-authenticates and replaces the cached token.
    ///
    /// The lock is held across the round-trip so concurrent callers wait for
    /// one refresh instead of each re-authenticating.
    async fn refresh_bearer(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;
        let token = self.authenticate().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Sends an authorized request, re-authenticating and retrying once on
    /// any failing response.
    ///
    /// A failure may mean the cached token went stale mid-session, so the
    /// single retry always carries a fresh token. The retried response is
    /// classified normally, preserving the distinct not-found mapping.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let retry_request = request.try_clone();
        let token = self.bearer().await?;
        let response = request.bearer_auth(&token).send().await?;

        if !response.status().is_success() {
            if let Some(request) = retry_request {
                let token = self.refresh_bearer().await?;
                let response = request.bearer_auth(&token).send().await?;
                return Self::classify(response, path);
            }
        }
        Self::classify(response, path)
    }

    fn classify(response: reqwest::Response, path: &str) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        match status.as_u16() {
            404 => Err(ApiError::NotFound {
                path: path.to_string(),
            }),
            401 | 403 => Err(ApiError::Auth {
                status: status.as_u16(),
            }),
            code if status.is_server_error() => Err(ApiError::Server {
                status: code,
                path: path.to_string(),
            }),
            code => Err(ApiError::Client {
                status: code,
                path: path.to_string(),
            }),
        }
    }

    /// Fetches a pipeline's config and its concurrency version token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the pipeline does not exist yet,
    /// distinctly from other HTTP failures.
    pub async fn fetch_config(
        &self,
        pipeline: &str,
        site: &str,
    ) -> Result<(PipelineDefinition, Option<PipelineVersion>), ApiError> {
        let url = self.pipeline_url(pipeline, "/config", site)?;
        let path = url.path().to_string();
        let response = self.execute(self.http.get(url), &path).await?;

        let version = response
            .headers()
            .get(CONFIG_VERSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(PipelineVersion::new);
        let body: ConfigResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok((body.config, version))
    }

    /// Creates or replaces a pipeline's config.
    ///
    /// The version token, when present, is sent as the concurrency-control
    /// header; omitting it signals "create". Retried on transient failure.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::VersionConflict`] when the token is stale; the
    /// caller must re-fetch and retry the whole upsert.
    pub async fn upsert_config(
        &self,
        pipeline: &str,
        site: &str,
        definition: &PipelineDefinition,
        version: Option<&PipelineVersion>,
    ) -> Result<(), ApiError> {
        let url = self.pipeline_url(pipeline, "/config", site)?;
        let path = url.path().to_string();
        tracing::debug!(pipeline, site, version = ?version, "upserting pipeline config");

        with_retry(&self.retry, "upsert_config", || {
            let url = url.clone();
            let path = path.clone();
            async move {
                let mut request = self.http.put(url).json(definition);
                if let Some(version) = version {
                    request = request.header(CONFIG_VERSION_HEADER, version.as_str());
                }
                match self.execute(request, &path).await {
                    Ok(_) => Ok(()),
                    Err(ApiError::Client {
                        status: 409 | 412, ..
                    }) => Err(ApiError::VersionConflict {
                        pipeline: pipeline.to_string(),
                    }),
                    Err(e) => Err(e),
                }
            }
        })
        .await
    }

    /// Triggers a new build of the named job. Retried on transient failure.
    ///
    /// # Errors
    ///
    /// Returns the underlying API failure after retries are exhausted.
    pub async fn trigger_build(
        &self,
        pipeline: &str,
        site: &str,
        job: &str,
    ) -> Result<(), ApiError> {
        let url = self.pipeline_url(pipeline, &format!("/jobs/{job}/builds"), site)?;
        let path = url.path().to_string();
        tracing::debug!(pipeline, site, job, "triggering build");

        with_retry(&self.retry, "trigger_build", || {
            let url = url.clone();
            let path = path.clone();
            async move {
                self.execute(self.http.post(url), &path).await?;
                Ok(())
            }
        })
        .await
    }

    /// Unpauses the pipeline so triggered builds can run. Retried on
    /// transient failure.
    ///
    /// # Errors
    ///
    /// Returns the underlying API failure after retries are exhausted.
    pub async fn unpause(&self, pipeline: &str, site: &str) -> Result<(), ApiError> {
        let url = self.pipeline_url(pipeline, "/unpause", site)?;
        let path = url.path().to_string();

        with_retry(&self.retry, "unpause", || {
            let url = url.clone();
            let path = path.clone();
            async move {
                self.execute(self.http.put(url), &path).await?;
                Ok(())
            }
        })
        .await
    }

    /// Reports the status of the named job's latest build.
    ///
    /// Absence of the pipeline or job maps to
    /// [`PublishStatus::NotStarted`]; a pending next build takes priority
    /// over a finished build's status.
    ///
    /// # Errors
    ///
    /// Returns non-404 API failures unchanged.
    pub async fn latest_status(
        &self,
        pipeline: &str,
        site: &str,
        job: &str,
    ) -> Result<PublishStatus, ApiError> {
        let url = self.pipeline_url(pipeline, &format!("/jobs/{job}"), site)?;
        let path = url.path().to_string();

        let response = match self.execute(self.http.get(url), &path).await {
            Ok(response) => response,
            Err(ApiError::NotFound { .. }) => return Ok(PublishStatus::NotStarted),
            Err(e) => return Err(e),
        };
        let info: JobInfo = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(resolve_status(Some(&info)))
    }
}
