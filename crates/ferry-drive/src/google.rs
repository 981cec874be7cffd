//! Drive v3 REST backend.
//!
//! Folder lookup uses `files.list` with an exact-name folder query; uploads
//! use the resumable protocol: one `POST` opens a session, then fixed-size
//! `PUT` chunks carry `Content-Range` until the service answers with the file
//! resource. `308` means "keep going" and carries the persisted `Range`.

use std::io::SeekFrom;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use crate::backend::{LocalArtifact, RemoteFile, StorageBackend};
use crate::error::{DriveError, DriveResult};
use crate::token::{self, AccessToken, TokenSource};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";
const MAX_STALLED_CHUNKS: u32 = 3;

/// Drive v3 REST client.
pub struct DriveBackend {
    client: Client,
    api_base: String,
    chunk_size: u64,
    sources: Vec<TokenSource>,
}

impl DriveBackend {
    /// Build a backend against `api_base` (e.g. `https://www.googleapis.com`).
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        api_base: impl Into<String>,
        chunk_size: u64,
        sources: Vec<TokenSource>,
    ) -> DriveResult<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("ferry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| DriveError::transport("client.build", err))?;
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            api_base,
            chunk_size: chunk_size.max(1),
            sources,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    /// Empty `bytes */N` request: asks the session to finish once every
    /// byte is persisted.
    async fn finalize(&self, session: &str, total: u64) -> DriveResult<RemoteFile> {
        let response = self
            .client
            .put(session)
            .header(CONTENT_RANGE, format!("bytes */{total}"))
            .body(Vec::new())
            .send()
            .await
            .map_err(|err| DriveError::transport("upload.finalize", err))?;
        if response.status() == StatusCode::PERMANENT_REDIRECT {
            return Err(DriveError::Protocol {
                operation: "upload.finalize",
                reason: "upload session reported every byte but did not finish",
            });
        }
        finished_file(check("upload.finalize", response).await?).await
    }

    async fn upload_chunks(
        &self,
        session: &str,
        artifact: &LocalArtifact,
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> DriveResult<RemoteFile> {
        let total = artifact.size_bytes;
        if total == 0 {
            let file = self.finalize(session, total).await?;
            progress(0);
            return Ok(file);
        }

        let mut file = tokio::fs::File::open(&artifact.path)
            .await
            .map_err(|source| DriveError::local(&artifact.path, source))?;
        let mut offset = 0_u64;
        let mut stalled = 0_u32;
        loop {
            if offset >= total {
                let file = self.finalize(session, total).await?;
                progress(total);
                return Ok(file);
            }
            let len = self.chunk_size.min(total - offset);
            let mut buffer = vec![0_u8; usize::try_from(len).unwrap_or(usize::MAX)];
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|source| DriveError::local(&artifact.path, source))?;
            file.read_exact(&mut buffer)
                .await
                .map_err(|source| DriveError::local(&artifact.path, source))?;

            let range = format!("bytes {offset}-{}/{total}", offset + len - 1);
            debug!(range = %range, "sending upload chunk");
            let response = self
                .client
                .put(session)
                .header(CONTENT_RANGE, range)
                .body(buffer)
                .send()
                .await
                .map_err(|err| DriveError::transport("upload.chunk", err))?;

            if response.status() == StatusCode::PERMANENT_REDIRECT {
                let next = persisted_offset(&response);
                if next <= offset {
                    stalled += 1;
                    if stalled >= MAX_STALLED_CHUNKS {
                        return Err(DriveError::Protocol {
                            operation: "upload.chunk",
                            reason: "upload session stopped accepting data",
                        });
                    }
                } else {
                    stalled = 0;
                }
                offset = next.min(total);
                progress(offset);
                continue;
            }

            let file = finished_file(check("upload.chunk", response).await?).await?;
            progress(total);
            return Ok(file);
        }
    }
}

#[async_trait]
impl StorageBackend for DriveBackend {
    async fn authenticate(&self) -> DriveResult<AccessToken> {
        let token = token::resolve(&self.sources).await?;
        let response = self
            .client
            .get(self.url("/drive/v3/about"))
            .bearer_auth(token.secret())
            .query(&[("fields", "user")])
            .send()
            .await
            .map_err(|err| DriveError::transport("about.get", err))?;
        check("about.get", response).await?;
        Ok(token)
    }

    async fn find_folder(&self, token: &AccessToken, name: &str) -> DriveResult<Option<String>> {
        let query = folder_query(name);
        let response = self
            .client
            .get(self.url("/drive/v3/files"))
            .bearer_auth(token.secret())
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id)"),
                ("pageSize", "1"),
            ])
            .send()
            .await
            .map_err(|err| DriveError::transport("files.list", err))?;
        let list: FileList = check("files.list", response)
            .await?
            .json()
            .await
            .map_err(|err| DriveError::transport("files.list", err))?;
        Ok(list.files.into_iter().next().map(|file| file.id))
    }

    async fn create_folder(&self, token: &AccessToken, name: &str) -> DriveResult<String> {
        let response = self
            .client
            .post(self.url("/drive/v3/files"))
            .bearer_auth(token.secret())
            .query(&[("fields", "id")])
            .json(&json!({ "name": name, "mimeType": FOLDER_MIME_TYPE }))
            .send()
            .await
            .map_err(|err| DriveError::transport("files.create", err))?;
        let created: FileRef = check("files.create", response)
            .await?
            .json()
            .await
            .map_err(|err| DriveError::transport("files.create", err))?;
        info!(folder = %name, folder_id = %created.id, "remote folder created");
        Ok(created.id)
    }

    async fn upload(
        &self,
        token: &AccessToken,
        artifact: &LocalArtifact,
        folder_id: &str,
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> DriveResult<RemoteFile> {
        let response = self
            .client
            .post(self.url("/upload/drive/v3/files"))
            .bearer_auth(token.secret())
            .query(&[("uploadType", "resumable"), ("fields", "id,webViewLink")])
            .header("X-Upload-Content-Type", UPLOAD_CONTENT_TYPE)
            .header("X-Upload-Content-Length", artifact.size_bytes.to_string())
            .json(&json!({ "name": artifact.name, "parents": [folder_id] }))
            .send()
            .await
            .map_err(|err| DriveError::transport("upload.initiate", err))?;
        let response = check("upload.initiate", response).await?;
        let session = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
            .ok_or(DriveError::Protocol {
                operation: "upload.initiate",
                reason: "response carried no upload session location",
            })?;
        debug!(file = %artifact.name, bytes = artifact.size_bytes, "upload session opened");
        self.upload_chunks(&session, artifact, progress).await
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    id: String,
    web_view_link: Option<String>,
}

async fn check(operation: &'static str, response: Response) -> DriveResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        Err(DriveError::Unauthorized { operation, message })
    } else {
        Err(DriveError::Api {
            operation,
            status: status.as_u16(),
            message,
        })
    }
}

async fn finished_file(response: Response) -> DriveResult<RemoteFile> {
    let file: UploadedFile = response
        .json()
        .await
        .map_err(|err| DriveError::transport("upload.chunk", err))?;
    Ok(RemoteFile {
        id: file.id,
        link: file.web_view_link,
    })
}

/// Next byte the service expects, from a `Range: bytes=0-N` header.
fn persisted_offset(response: &Response) -> u64 {
    response
        .headers()
        .get(RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("bytes="))
        .and_then(|value| value.split_once('-'))
        .and_then(|(_, end)| end.trim().parse::<u64>().ok())
        .map_or(0, |end| end + 1)
}

fn folder_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("mimeType='{FOLDER_MIME_TYPE}' and name='{escaped}' and trashed=false")
}
