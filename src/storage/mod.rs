//! Byte-range access to whole objects.
//!
//! Used only on the unfiltered path, where a block is a plain slice of the
//! stored object and no external tool is involved.
//!
//! # Implementations
//!
//! - [`LocalStorage`] - files on this host
//! - [`HttpStorage`] - http(s) objects via HEAD and `Range` requests (`http` feature)
//!
//! [`Storages`] picks the implementation from the [`Location`] kind.

#[cfg(feature = "http")]
mod http;
mod local;

#[cfg(feature = "http")]
pub use http::HttpStorage;
pub use local::LocalStorage;

use crate::registry::Location;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Byte range as sent in a `Range` header; `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Inclusive `(start, end)` within an object of `total` bytes.
    pub fn resolve(&self, total: u64) -> Result<(u64, u64)> {
        if self.start >= total {
            return Err(Error::InvalidRange(format!(
                "range start {} is beyond the object size {}",
                self.start, total
            )));
        }
        let last = total - 1;
        Ok((self.start, self.end.map_or(last, |end| end.min(last))))
    }

    pub fn to_header(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Size of the object in bytes.
    async fn head_length(&self, location: &Location) -> Result<u64>;

    /// Stream bytes `start..=end` of the object.
    async fn read_range(&self, location: &Location, start: u64, end: u64) -> Result<ByteStream>;
}

/// Dispatches to the backend matching each location.
#[derive(Debug, Clone)]
pub struct Storages {
    local: LocalStorage,
    #[cfg(feature = "http")]
    http: HttpStorage,
}

impl Storages {
    pub fn new() -> Result<Self> {
        Ok(Self {
            local: LocalStorage::new(),
            #[cfg(feature = "http")]
            http: HttpStorage::new()?,
        })
    }

    fn backend(&self, location: &Location) -> Result<&dyn Storage> {
        match location {
            Location::Local(_) => Ok(&self.local),
            #[cfg(feature = "http")]
            Location::Remote(_) => Ok(&self.http),
            #[cfg(not(feature = "http"))]
            Location::Remote(url) => Err(Error::Internal(format!(
                "cannot read {}: built without the http feature",
                url
            ))),
        }
    }
}

#[async_trait]
impl Storage for Storages {
    async fn head_length(&self, location: &Location) -> Result<u64> {
        self.backend(location)?.head_length(location).await
    }

    async fn read_range(&self, location: &Location, start: u64, end: u64) -> Result<ByteStream> {
        self.backend(location)?.read_range(location, start, end).await
    }
}
