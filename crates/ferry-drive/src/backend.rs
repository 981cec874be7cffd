//! Storage boundary consumed by [`crate::UploadController`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{DriveError, DriveResult};
use crate::token::AccessToken;

/// A local file about to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    /// Location on disk.
    pub path: PathBuf,
    /// Remote object name.
    pub name: String,
    /// Size in bytes when inspected.
    pub size_bytes: u64,
}

impl LocalArtifact {
    /// Stat `path` and capture the name and size to upload.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::LocalFile`] when the path is missing, is not a
    /// regular file, or has no usable file name.
    pub async fn inspect(path: &Path) -> DriveResult<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| DriveError::local(path, source))?;
        if !metadata.is_file() {
            return Err(DriveError::local(
                path,
                std::io::Error::other("not a regular file"),
            ));
        }
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToString::to_string)
            .ok_or_else(|| {
                DriveError::local(path, std::io::Error::other("file name is not valid UTF-8"))
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            name,
            size_bytes: metadata.len(),
        })
    }
}

/// An uploaded remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Remote identifier.
    pub id: String,
    /// Shareable link when the service returned one.
    pub link: Option<String>,
}

/// Remote storage operations needed to place one file into a named folder.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Obtain credentials, verifying them against the service.
    async fn authenticate(&self) -> DriveResult<AccessToken>;

    /// Look up a non-trashed folder by exact name.
    async fn find_folder(&self, token: &AccessToken, name: &str) -> DriveResult<Option<String>>;

    /// Create a folder, returning its identifier.
    async fn create_folder(&self, token: &AccessToken, name: &str) -> DriveResult<String>;

    /// Upload `artifact` into `folder_id`. `progress` receives the number of
    /// bytes the service has acknowledged after every chunk.
    async fn upload(
        &self,
        token: &AccessToken,
        artifact: &LocalArtifact,
        folder_id: &str,
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> DriveResult<RemoteFile>;
}
