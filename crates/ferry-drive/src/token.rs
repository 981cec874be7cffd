//! Credential sources for the storage backend.

use std::fmt;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{DriveError, DriveResult};

/// Bearer token presented to the remote service.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token, trimming surrounding whitespace.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    /// Raw token value.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Where an access token may come from. Sources are consulted in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// A token supplied directly.
    Static(String),
    /// An environment variable.
    Env(String),
    /// A file whose trimmed contents are the token.
    File(PathBuf),
    /// Ask on the terminal without echo.
    Prompt,
}

impl TokenSource {
    /// Short identifier used in error reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::Env(_) => "environment",
            Self::File(_) => "token file",
            Self::Prompt => "prompt",
        }
    }

    /// Try this source. `Ok(None)` means it had nothing to offer.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::TokenSource`] when a configured file cannot be
    /// read or the terminal prompt fails.
    pub async fn fetch(&self) -> DriveResult<Option<AccessToken>> {
        let raw = match self {
            Self::Static(value) => Some(value.clone()),
            Self::Env(name) => std::env::var(name).ok(),
            Self::File(path) => Some(tokio::fs::read_to_string(path).await.map_err(|source| {
                DriveError::TokenSource {
                    source_name: self.label(),
                    source,
                }
            })?),
            Self::Prompt => tokio::task::spawn_blocking(|| {
                rpassword::prompt_password("Drive access token: ")
            })
            .await
            .map_err(|err| DriveError::TokenSource {
                source_name: "prompt",
                source: io::Error::other(err),
            })?
            .map(Some)
            .map_err(|source| DriveError::TokenSource {
                source_name: "prompt",
                source,
            })?,
        };
        Ok(raw
            .map(AccessToken::new)
            .filter(|token| !token.secret().is_empty()))
    }
}

/// Return the first token produced by `sources`.
///
/// # Errors
///
/// Propagates a failing source, or returns [`DriveError::MissingToken`] when
/// every source came up empty.
pub(crate) async fn resolve(sources: &[TokenSource]) -> DriveResult<AccessToken> {
    for source in sources {
        if let Some(token) = source.fetch().await? {
            debug!(source = source.label(), "access token resolved");
            return Ok(token);
        }
    }
    Err(DriveError::MissingToken {
        tried: sources.iter().map(TokenSource::label).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_non_empty_source_wins() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("token");
        tokio::fs::write(&path, "  from-file\n").await?;
        let sources = [
            TokenSource::Static("   ".into()),
            TokenSource::Env("FERRY_TEST_TOKEN_THAT_IS_NEVER_SET".into()),
            TokenSource::File(path),
        ];
        let token = resolve(&sources).await?;
        assert_eq!(token.secret(), "from-file");
        Ok(())
    }

    #[tokio::test]
    async fn empty_sources_report_what_was_tried() {
        let sources = [TokenSource::Env("FERRY_TEST_TOKEN_THAT_IS_NEVER_SET".into())];
        match resolve(&sources).await {
            Err(DriveError::MissingToken { tried }) => assert_eq!(tried, vec!["environment"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreadable_token_file_is_an_error() {
        let source = TokenSource::File(PathBuf::from("/definitely/not/a/token"));
        assert!(matches!(
            source.fetch().await,
            Err(DriveError::TokenSource {
                source_name: "token file",
                ..
            })
        ));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let token = AccessToken::new("secret-value");
        assert_eq!(format!("{token:?}"), "AccessToken(***)");
    }
}
