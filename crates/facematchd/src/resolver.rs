//! Turn an uploaded file or an image URL into raw image bytes.

use axum::body::Bytes;
use facematch_core::Subject;
use std::time::Duration;
use thiserror::Error;

const MAX_REDIRECTS: usize = 5;

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    File(Bytes),
    Url(String),
}

impl ImageSource {
    /// Pick the source for one slot: a non-empty file wins over a non-blank URL.
    pub fn select(file: Option<Bytes>, url: Option<String>) -> Option<Self> {
        match (file.filter(|b| !b.is_empty()), url) {
            (Some(bytes), _) => Some(ImageSource::File(bytes)),
            (None, Some(url)) if !url.trim().is_empty() => Some(ImageSource::Url(url.trim().to_string())),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchFailure {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("response of {len} bytes exceeds the {limit} byte limit")]
    TooLarge { len: u64, limit: usize },
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{0} image is required in file or URL form.")]
    Missing(Subject),
    #[error("Failed to fetch image from URL.")]
    Fetch {
        url: String,
        #[source]
        source: FetchFailure,
    },
}

/// Shared HTTP client for image URLs.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    client: reqwest::Client,
    max_image_bytes: usize,
}

impl ImageResolver {
    pub fn new(timeout: Duration, max_image_bytes: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("facematchd/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, max_image_bytes })
    }

    /// Produce the bytes for `subject`, fetching over HTTP when needed.
    pub async fn resolve(&self, subject: Subject, source: Option<ImageSource>) -> Result<Bytes, ResolveError> {
        match source {
            Some(ImageSource::File(bytes)) => Ok(bytes),
            Some(ImageSource::Url(url)) => match self.fetch(&url).await {
                Ok(bytes) => {
                    tracing::debug!(%subject, %url, len = bytes.len(), "fetched image");
                    Ok(bytes)
                }
                Err(source) => {
                    tracing::debug!(%subject, %url, error = %source, "image fetch failed");
                    Err(ResolveError::Fetch { url, source })
                }
            },
            None => Err(ResolveError::Missing(subject)),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, FetchFailure> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let limit = self.max_image_bytes;
        if let Some(len) = response.content_length() {
            if len > limit as u64 {
                return Err(FetchFailure::TooLarge { len, limit });
            }
        }

        // Content-Length may be absent or wrong, so count while reading
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let len = body.len() + chunk.len();
            if len > limit {
                return Err(FetchFailure::TooLarge { len: len as u64, limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ImageResolver {
        ImageResolver::new(Duration::from_secs(1), 1024).unwrap()
    }

    #[test]
    fn test_select_prefers_file() {
        let source = ImageSource::select(Some(Bytes::from_static(b"img")), Some("http://x/y.png".into()));
        assert_eq!(source, Some(ImageSource::File(Bytes::from_static(b"img"))));
    }

    #[test]
    fn test_select_falls_back_to_url() {
        let source = ImageSource::select(None, Some(" http://x/y.png ".into()));
        assert_eq!(source, Some(ImageSource::Url("http://x/y.png".into())));
    }

    #[test]
    fn test_select_treats_empty_inputs_as_absent() {
        assert_eq!(ImageSource::select(Some(Bytes::new()), Some("  ".into())), None);
        assert_eq!(ImageSource::select(Some(Bytes::new()), Some("http://x".into())), Some(ImageSource::Url("http://x".into())));
        assert_eq!(ImageSource::select(None, None), None);
    }

    #[tokio::test]
    async fn test_resolve_missing_names_the_slot() {
        let err = resolver().resolve(Subject::Profile, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Profile image is required in file or URL form.");
    }

    #[tokio::test]
    async fn test_resolve_file_passes_through() {
        let bytes = resolver()
            .resolve(Subject::Cnic, Some(ImageSource::File(Bytes::from_static(b"abc"))))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"abc");
    }

    #[tokio::test]
    async fn test_resolve_malformed_url_is_a_fetch_error() {
        let err = resolver()
            .resolve(Subject::Cnic, Some(ImageSource::Url("not a url".into())))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch image from URL.");
    }
}
