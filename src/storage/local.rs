use super::{ByteStream, Storage};
use crate::pipeline::trim::COPY_CHUNK_SIZE;
use crate::registry::Location;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

#[derive(Debug, Clone, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }

    fn path(location: &Location) -> Result<&Path> {
        match location {
            Location::Local(path) => Ok(path),
            Location::Remote(url) => Err(Error::Internal(format!("{} is not a local file", url))),
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn head_length(&self, location: &Location) -> Result<u64> {
        let path = Self::path(location)?;
        let metadata = fs::metadata(path)
            .await
            .map_err(|_| Error::NotFound(format!("{} does not exist", path.display())))?;
        Ok(metadata.len())
    }

    async fn read_range(&self, location: &Location, start: u64, end: u64) -> Result<ByteStream> {
        let path = Self::path(location)?;
        let mut file = fs::File::open(path)
            .await
            .map_err(|_| Error::NotFound(format!("{} does not exist", path.display())))?;
        file.seek(SeekFrom::Start(start)).await?;

        let reader = file.take(end + 1 - start);
        Ok(ReaderStream::with_capacity(reader, COPY_CHUNK_SIZE)
            .map_err(Error::from)
            .boxed())
    }
}
