//! src/services/blob_service.rs
//!
//! BlobService — uploads images into the fixed `images` container and hands
//! back the public address `{account_url}/images/{file_name}`.
//!
//! The account URL decides the backend:
//! - `http(s)://…` → Azure Blob Storage over REST with a managed-identity token
//! - `file://…`    → a local directory, for development and tests
//!
//! Uploads always overwrite. There is no conflict detection or versioning.

use crate::{
    models::image::ImageUpload,
    services::credential::{CredentialError, ManagedIdentityCredential, STORAGE_RESOURCE},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use reqwest::{Client, Url};
use std::{
    io::{self, ErrorKind},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use uuid::Uuid;

/// Container every image is written to.
pub const BLOB_CONTAINER_NAME: &str = "images";

const STORAGE_API_VERSION: &str = "2021-08-06";

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("unsupported blob account url `{0}`")]
    UnsupportedAccountUrl(String),
    #[error("invalid blob name `{0}`")]
    InvalidName(String),
    #[error("credential acquisition failed: {0}")]
    Credential(#[from] CredentialError),
    #[error("blob request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("blob service returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Storage primitive behind [`BlobService`]: put `data` at `container/name`,
/// replacing whatever is there.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    async fn put(
        &self,
        container: &str,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> BlobResult<()>;

    /// Short label for logs and readiness output.
    fn kind(&self) -> &'static str;
}

/// Long-lived upload handle shared across requests.
#[derive(Clone)]
pub struct BlobService {
    account_url: String,
    backend: Arc<dyn BlobBackend>,
}

impl BlobService {
    pub fn new(account_url: impl Into<String>, backend: Arc<dyn BlobBackend>) -> Self {
        let account_url = account_url.into().trim_end_matches('/').to_string();
        Self {
            account_url,
            backend,
        }
    }

    /// Build the service for `account_url`, choosing the backend by scheme.
    pub fn from_account_url(account_url: &str, client: Client) -> BlobResult<Self> {
        let backend: Arc<dyn BlobBackend> = if let Some(dir) = account_url.strip_prefix("file://")
        {
            Arc::new(LocalBlobBackend::new(dir.trim_end_matches('/')))
        } else if account_url.starts_with("https://") || account_url.starts_with("http://") {
            let credential = ManagedIdentityCredential::from_env(client.clone());
            Arc::new(AzureBlobBackend::new(account_url, client, credential))
        } else {
            return Err(BlobError::UnsupportedAccountUrl(account_url.to_string()));
        };
        Ok(Self::new(account_url, backend))
    }

    /// Address of `file_name` in the image container. Deterministic.
    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}/{}", self.account_url, BLOB_CONTAINER_NAME, file_name)
    }

    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// Upload `image` under its own file name and return its URL.
    pub async fn upload_image(&self, image: &ImageUpload) -> BlobResult<String> {
        self.backend
            .put(
                BLOB_CONTAINER_NAME,
                &image.file_name,
                image.content_type_or_default(),
                image.data.clone(),
            )
            .await?;

        let url = self.url_for(&image.file_name);
        tracing::info!(
            backend = self.backend.kind(),
            size = image.data.len(),
            url = %url,
            "uploaded image"
        );
        Ok(url)
    }
}

/// Azure Blob Storage `Put Blob` with a bearer token from the ambient identity.
pub struct AzureBlobBackend {
    account_url: String,
    client: Client,
    credential: ManagedIdentityCredential,
}

impl AzureBlobBackend {
    pub fn new(
        account_url: impl Into<String>,
        client: Client,
        credential: ManagedIdentityCredential,
    ) -> Self {
        Self {
            account_url: account_url.into().trim_end_matches('/').to_string(),
            client,
            credential,
        }
    }

    /// `{account}/{container}/{name}` with every path segment percent-encoded,
    /// so `#`, `?` and `%` in a file name stay part of the blob name.
    fn blob_url(&self, container: &str, name: &str) -> BlobResult<Url> {
        let unsupported = || BlobError::UnsupportedAccountUrl(self.account_url.clone());
        let mut url = Url::parse(&self.account_url).map_err(|_| unsupported())?;
        url.path_segments_mut()
            .map_err(|_| unsupported())?
            .pop_if_empty()
            .push(container)
            .extend(name.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl BlobBackend for AzureBlobBackend {
    async fn put(
        &self,
        container: &str,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> BlobResult<()> {
        let url = self.blob_url(container, name)?;
        let token = self.credential.token(STORAGE_RESOURCE).await?;

        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-blob-content-type", content_type)
            .header("Content-Type", content_type)
            .header("Content-MD5", content_md5(&data))
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "azure"
    }
}

/// Directory-backed store laid out as `{base_path}/{container}/{name}`.
pub struct LocalBlobBackend {
    base_path: PathBuf,
}

impl LocalBlobBackend {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolve the on-disk path for `name`, refusing anything that would
    /// leave the container directory.
    fn blob_path(&self, container: &str, name: &str) -> BlobResult<PathBuf> {
        let relative = Path::new(name);
        let escapes = name.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(BlobError::InvalidName(name.to_string()));
        }
        Ok(self.base_path.join(container).join(relative))
    }
}

#[async_trait]
impl BlobBackend for LocalBlobBackend {
    /// Write to a temp file next to the target, fsync, then rename over it.
    async fn put(
        &self,
        container: &str,
        name: &str,
        _content_type: &str,
        data: Bytes,
    ) -> BlobResult<()> {
        let file_path = self.blob_path(container, name)?;
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::new(ErrorKind::Other, "blob path missing parent"))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = write_all_synced(&mut file, &data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobError::Io(err));
            }
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

async fn write_all_synced(file: &mut File, data: &[u8]) -> io::Result<()> {
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Base64 MD5 digest for the `Content-MD5` header.
fn content_md5(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(md5::compute(data).0)
}
