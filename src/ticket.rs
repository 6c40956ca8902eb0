//! Block planning: turns a validated request into the URLs of a ticket.
//!
//! | request                              | blocks                                   |
//! |--------------------------------------|------------------------------------------|
//! | `class=header`                       | one header block                         |
//! | no filtering, stored format          | one byte range per chunk of the object   |
//! | field/tag filters or format change   | header block + one body block            |
//! | one or more regions                  | header block + one body block per region |
//!
//! Block position travels in the `HtsgetBlockId`, `HtsgetNumBlocks` and
//! `HtsgetBlockClass` headers; filters travel as query parameters, and only
//! the non-default ones are written.

use crate::request::HtsgetRequest;
use crate::registry::Location;
use crate::storage::{ByteRange, Storage};
use crate::types::{DataClass, Region, UrlEntry};
use crate::{Error, Result};
use std::collections::BTreeMap;
use url::Url;

pub const DEFAULT_CHUNK_SIZE: u64 = 500_000_000;

/// Split `total` bytes into inclusive ranges of at most `chunk_size` bytes.
pub fn chunk_ranges(total: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let chunk_size = chunk_size.max(1);
    (0..total.div_ceil(chunk_size))
        .map(|i| {
            let start = i * chunk_size;
            (start, (start + chunk_size).min(total) - 1)
        })
        .collect()
}

pub struct TicketPlanner<'a> {
    base_url: &'a Url,
    chunk_size: u64,
    storage: &'a dyn Storage,
}

impl<'a> TicketPlanner<'a> {
    pub fn new(base_url: &'a Url, chunk_size: u64, storage: &'a dyn Storage) -> Self {
        Self {
            base_url,
            chunk_size,
            storage,
        }
    }

    pub async fn plan(&self, req: &HtsgetRequest) -> Result<Vec<UrlEntry>> {
        let urls = if req.is_header_only() {
            vec![self.header_block(req, 1)?]
        } else if req.is_unfiltered() {
            self.byte_range_blocks(req).await?
        } else if req.regions.is_empty() {
            vec![self.header_block(req, 2)?, self.body_block(req, None, 1, 2)?]
        } else {
            let count = req.regions.len() + 1;
            let mut urls = Vec::with_capacity(count);
            urls.push(self.header_block(req, count)?);
            for (i, region) in req.regions.iter().enumerate() {
                urls.push(self.body_block(req, Some(region), i + 1, count)?);
            }
            urls
        };

        tracing::info!(id = %req.id, format = %req.format, blocks = urls.len(), "planned ticket");
        Ok(urls)
    }

    fn header_block(&self, req: &HtsgetRequest, count: usize) -> Result<UrlEntry> {
        let mut query = format_param(req);
        query.push(("class", DataClass::Header.as_str().to_string()));
        Ok(UrlEntry {
            url: self.data_url(req, &query)?.to_string(),
            headers: Some(block_headers(0, count, DataClass::Header)),
            class: Some(DataClass::Header),
        })
    }

    fn body_block(
        &self,
        req: &HtsgetRequest,
        region: Option<&Region>,
        id: usize,
        count: usize,
    ) -> Result<UrlEntry> {
        let query = filter_params(req, region);
        Ok(UrlEntry {
            url: self.data_url(req, &query)?.to_string(),
            headers: Some(block_headers(id, count, DataClass::Body)),
            class: Some(DataClass::Body),
        })
    }

    /// Unfiltered objects are served as plain byte ranges, directly from the
    /// object's own URL when it has one.
    async fn byte_range_blocks(&self, req: &HtsgetRequest) -> Result<Vec<UrlEntry>> {
        let total = self.storage.head_length(&req.location).await?;
        let ranges = chunk_ranges(total, self.chunk_size);
        let count = ranges.len();

        ranges
            .into_iter()
            .enumerate()
            .map(|(id, (start, end))| {
                let range = ByteRange { start, end: Some(end) }.to_header();
                let (url, headers) = match &req.location {
                    Location::Remote(url) => {
                        (url.to_string(), BTreeMap::from([("Range".to_string(), range)]))
                    }
                    Location::Local(_) => {
                        let mut headers = block_headers(id, count, DataClass::Body);
                        headers.insert("Range".to_string(), range);
                        (self.data_url(req, &format_param(req))?.to_string(), headers)
                    }
                };
                Ok(UrlEntry {
                    url,
                    headers: Some(headers),
                    class: Some(DataClass::Body),
                })
            })
            .collect()
    }

    /// `{base}/{endpoint}/data/{id}?{query}`
    fn data_url(&self, req: &HtsgetRequest, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Internal(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend([req.endpoint.name(), "data", req.id.as_str()]);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

fn block_headers(id: usize, count: usize, class: DataClass) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("HtsgetBlockId".to_string(), id.to_string()),
        ("HtsgetNumBlocks".to_string(), count.to_string()),
        ("HtsgetBlockClass".to_string(), class.as_str().to_string()),
    ])
}

fn format_param(req: &HtsgetRequest) -> Vec<(&'static str, String)> {
    if req.format == req.endpoint.default_format() {
        Vec::new()
    } else {
        vec![("format", req.format.to_string())]
    }
}

fn filter_params(req: &HtsgetRequest, region: Option<&Region>) -> Vec<(&'static str, String)> {
    let mut query = format_param(req);
    if let Some(region) = region {
        query.push(("referenceName", region.reference_name.clone()));
        if let Some(start) = region.start {
            query.push(("start", start.to_string()));
        }
        if let Some(end) = region.end {
            query.push(("end", end.to_string()));
        }
    }
    if let Some(fields) = req.fields.to_param() {
        query.push(("fields", fields));
    }
    if let Some(tags) = req.tags.to_param() {
        query.push(("tags", tags));
    }
    if !req.notags.is_empty() {
        query.push(("notags", req.notags.join(",")));
    }
    query
}
