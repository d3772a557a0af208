//! Profile synchronization against the external directory service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue},
    multipart,
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use utils::api::directory::{NewUsersPage, Photo, Profile};

#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
    #[error("url error: {0}")]
    Url(String),
    #[error("config error: {0}")]
    Config(String),
}

/// Profile lifecycle operations against the directory service, the system of
/// record for user identity.
///
/// Implementations are picked at composition time: [`NoopDirectory`] when no
/// remote directory is configured, [`RemoteDirectory`] otherwise. Every
/// operation is a single stateless request/response exchange; persistence of
/// fetched or created data into local records is the caller's job.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Fetches a user's profile. `Ok(None)` means the directory has no
    /// record for the username.
    async fn fetch_profile(&self, username: &str) -> Result<Option<Profile>, DirectoryError>;

    /// Creates a profile in the directory. The user is expected to not exist
    /// there yet. Only recognized fields are transmitted.
    async fn create_profile(&self, profile: &Profile) -> Result<Profile, DirectoryError>;

    /// Updates a user's profile, optionally attaching a photo. Only
    /// recognized fields are transmitted.
    async fn update_profile(
        &self,
        username: &str,
        profile: &Profile,
        photo: Option<Photo>,
    ) -> Result<(), DirectoryError>;

    /// Lists users present in the directory but not yet synchronized
    /// locally.
    async fn fetch_new_users(&self) -> Result<Vec<Profile>, DirectoryError>;

    /// Renders the location of a user's photo. Pure formatting, no network
    /// call.
    fn user_photo_url(&self, username: &str) -> String;
}

/// Where locally served profile photos live.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub media_url: String,
    pub photo_format: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            media_url: "/media".to_string(),
            photo_format: "webp".to_string(),
        }
    }
}

/// The fallback when no remote directory is configured. Fetches and listings
/// come back empty and updates report success without doing anything.
pub struct NoopDirectory {
    media: MediaConfig,
}

impl NoopDirectory {
    pub fn new(media: MediaConfig) -> Self {
        Self { media }
    }
}

#[async_trait]
impl ProfileDirectory for NoopDirectory {
    async fn fetch_profile(&self, username: &str) -> Result<Option<Profile>, DirectoryError> {
        debug!(%username, "no directory configured, skipping profile fetch");
        Ok(None)
    }

    async fn create_profile(&self, _profile: &Profile) -> Result<Profile, DirectoryError> {
        Ok(Profile::new())
    }

    async fn update_profile(
        &self,
        username: &str,
        _profile: &Profile,
        _photo: Option<Photo>,
    ) -> Result<(), DirectoryError> {
        debug!(%username, "no directory configured, skipping profile update");
        Ok(())
    }

    async fn fetch_new_users(&self) -> Result<Vec<Profile>, DirectoryError> {
        Ok(Vec::new())
    }

    fn user_photo_url(&self, username: &str) -> String {
        format!(
            "{}/photo/{username}.{}",
            self.media.media_url.trim_end_matches('/'),
            self.media.photo_format
        )
    }
}

/// Connection settings for the remote directory.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Base URL the per-user endpoints hang off of.
    pub base_url: String,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Verify the directory's TLS certificate. Leave on outside development.
    pub verify_tls: bool,
    /// Per-request timeout. Callers own timeout policy; `None` keeps the
    /// reqwest default.
    pub timeout: Option<Duration>,
}

impl DirectoryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: Vec::new(),
            verify_tls: true,
            timeout: None,
        }
    }
}

/// HTTP-backed [`ProfileDirectory`] speaking JSON to the directory service.
#[derive(Debug, Clone)]
pub struct RemoteDirectory {
    base: Url,
    http: Client,
}

impl RemoteDirectory {
    pub fn new(config: DirectoryConfig) -> Result<Self, DirectoryError> {
        let mut base =
            Url::parse(&config.base_url).map_err(|e| DirectoryError::Url(e.to_string()))?;
        // Relative joins drop the last path segment unless the base ends
        // with a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| DirectoryError::Config(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| DirectoryError::Config(e.to_string()))?;
            headers.insert(name, value);
        }

        // reqwest's rustls stack is built with the `-no-provider` feature, so
        // no process-default crypto provider is installed. Install the
        // aws-lc-rs provider pinned in Cargo.toml; otherwise `Client::build`
        // panics with "No provider set". Idempotent across clients.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut builder = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent(concat!("directory-sync/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        Ok(Self { base, http })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DirectoryError> {
        self.base
            .join(path)
            .map_err(|e| DirectoryError::Url(e.to_string()))
    }
}

#[async_trait]
impl ProfileDirectory for RemoteDirectory {
    async fn fetch_profile(&self, username: &str) -> Result<Option<Profile>, DirectoryError> {
        let url = self.endpoint(&format!("users/{username}"))?;
        let res = self.http.get(url).send().await.map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<Profile>()
                .await
                .map(Some)
                .map_err(|e| DirectoryError::Serde(e.to_string())),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(status_error(res).await),
        }
    }

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, DirectoryError> {
        let url = self.endpoint("users")?;
        let res = self
            .http
            .post(url)
            .json(&profile.recognized())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !res.status().is_success() {
            return Err(status_error(res).await);
        }
        res.json::<Profile>()
            .await
            .map_err(|e| DirectoryError::Serde(e.to_string()))
    }

    async fn update_profile(
        &self,
        username: &str,
        profile: &Profile,
        photo: Option<Photo>,
    ) -> Result<(), DirectoryError> {
        let url = self.endpoint(&format!("users/{username}"))?;
        let fields = profile.recognized();

        let req = self.http.patch(url);
        let req = match photo {
            Some(photo) => {
                let photo_part = multipart::Part::bytes(photo.bytes)
                    .file_name(photo.file_name)
                    .mime_str(&photo.content_type)
                    .map_err(|e| DirectoryError::Config(e.to_string()))?;
                let data_part = multipart::Part::text(
                    serde_json::to_string(&fields)
                        .map_err(|e| DirectoryError::Serde(e.to_string()))?,
                )
                .mime_str("application/json")
                .map_err(|e| DirectoryError::Config(e.to_string()))?;
                req.multipart(
                    multipart::Form::new()
                        .part("photo", photo_part)
                        .part("data", data_part),
                )
            }
            None => req.json(&fields),
        };

        let res = req.send().await.map_err(map_reqwest_error)?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(status_error(res).await)
        }
    }

    async fn fetch_new_users(&self) -> Result<Vec<Profile>, DirectoryError> {
        let url = self.endpoint("users")?;
        let res = self.http.get(url).send().await.map_err(map_reqwest_error)?;

        if !res.status().is_success() {
            return Err(status_error(res).await);
        }
        let page = res
            .json::<NewUsersPage>()
            .await
            .map_err(|e| DirectoryError::Serde(e.to_string()))?;
        Ok(page.results)
    }

    fn user_photo_url(&self, username: &str) -> String {
        // The base is normalized to end with a slash at construction.
        format!("{}users/{username}/photo", self.base)
    }
}

async fn status_error(res: reqwest::Response) -> DirectoryError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    warn!(status, "directory request failed");
    DirectoryError::Http { status, body }
}

fn map_reqwest_error(e: reqwest::Error) -> DirectoryError {
    if e.is_timeout() {
        DirectoryError::Timeout
    } else {
        DirectoryError::Transport(e.to_string())
    }
}
