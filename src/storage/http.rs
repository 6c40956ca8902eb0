use super::{ByteStream, Storage};
use crate::registry::Location;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode, header};
use url::Url;

/// Remote objects served over http(s).
#[derive(Debug, Clone)]
pub struct HttpStorage {
    client: Client,
}

impl HttpStorage {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn url(location: &Location) -> Result<&Url> {
        match location {
            Location::Remote(url) => Ok(url),
            Location::Local(path) => Err(Error::Internal(format!(
                "{} is not a remote object",
                path.display()
            ))),
        }
    }
}

fn check_status(url: &Url, status: StatusCode) -> Result<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(Error::NotFound(format!("{} does not exist", url))),
        StatusCode::UNAUTHORIZED => Err(Error::InvalidAuthentication),
        StatusCode::FORBIDDEN => Err(Error::PermissionDenied),
        StatusCode::RANGE_NOT_SATISFIABLE => {
            Err(Error::InvalidRange(format!("range not satisfiable for {}", url)))
        }
        s => Err(Error::Internal(format!("{} answered {}", url, s))),
    }
}

#[async_trait]
impl Storage for HttpStorage {
    async fn head_length(&self, location: &Location) -> Result<u64> {
        let url = Self::url(location)?;
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| Error::Internal(format!("HTTP HEAD request failed: {}", e)))?;
        check_status(url, response.status())?;

        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::Internal(format!("{} has no Content-Length", url)))
    }

    async fn read_range(&self, location: &Location, start: u64, end: u64) -> Result<ByteStream> {
        let url = Self::url(location)?;
        let response = self
            .client
            .get(url.clone())
            .header(header::RANGE, format!("bytes={}-{}", start, end))
            .send()
            .await
            .map_err(|e| Error::Internal(format!("HTTP GET request failed: {}", e)))?;
        check_status(url, response.status())?;

        tracing::debug!(%url, start, end, status = %response.status(), "fetching remote range");
        Ok(response
            .bytes_stream()
            .map_err(|e| Error::Internal(format!("failed to read HTTP response: {}", e)))
            .boxed())
    }
}
