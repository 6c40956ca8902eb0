//! Request model and the order-dependent validator.
//!
//! A request is assembled parameter by parameter into a [`PartialRequest`],
//! following one of the fixed orders in [`params`]. Each validator sees the
//! value and everything set before it; the first failure ends processing.
//! [`PartialRequest::finish`] then applies defaults and yields the immutable
//! [`HtsgetRequest`].

pub mod params;
pub mod validate;

use crate::formats::{self, HeaderReader};
use crate::registry::{Location, Registry};
use crate::storage::ByteRange;
use crate::types::{DataClass, Endpoint, Format, Region, Selection, TicketPostBody};
use crate::{Error, Result};
use axum::http::HeaderMap;
use params::{Param, ParamOrder, Source};
use std::collections::HashMap;
use tokio::sync::OnceCell;
use validate::*;

/// Position of a block within its ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub id: usize,
    pub count: usize,
    pub class: DataClass,
}

impl Block {
    /// Only the last block of a ticket keeps the end-of-file marker.
    pub fn is_last(&self) -> bool {
        self.id + 1 == self.count
    }
}

impl Default for Block {
    fn default() -> Self {
        Self {
            id: 0,
            count: 1,
            class: DataClass::Body,
        }
    }
}

/// Fully validated and defaulted request.
#[derive(Debug, Clone, PartialEq)]
pub struct HtsgetRequest {
    pub id: String,
    pub endpoint: Endpoint,
    pub location: Location,
    pub format: Format,
    pub class: DataClass,
    pub fields: Selection,
    pub tags: Selection,
    pub notags: Vec<String>,
    pub regions: Vec<Region>,
    pub block: Block,
    pub range: Option<ByteRange>,
}

impl HtsgetRequest {
    pub fn is_header_only(&self) -> bool {
        self.class == DataClass::Header
    }

    /// Any column or tag redaction requested.
    pub fn has_field_filter(&self) -> bool {
        !self.fields.is_all() || !self.tags.is_all() || !self.notags.is_empty()
    }

    /// The requested container differs from the one the object is stored in.
    pub fn needs_conversion(&self) -> bool {
        self.format != formats::stored_format(self.endpoint, &self.location)
    }

    /// The whole object, byte for byte.
    pub fn is_unfiltered(&self) -> bool {
        !self.is_header_only()
            && self.regions.is_empty()
            && !self.has_field_filter()
            && !self.needs_conversion()
    }
}

/// Request under construction. Fields stay `None`/default until their
/// parameter has been processed.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRequest {
    pub endpoint: Endpoint,
    pub id: String,
    pub location: Option<Location>,
    pub format: Option<Format>,
    pub class: DataClass,
    pub reference_name: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub fields: Selection,
    pub tags: Selection,
    pub notags: Vec<String>,
    pub regions: Vec<Region>,
    pub num_blocks: Option<usize>,
    pub block_id: Option<usize>,
    pub block_class: Option<DataClass>,
    pub range: Option<ByteRange>,
}

impl PartialRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            id: String::new(),
            location: None,
            format: None,
            class: DataClass::Body,
            reference_name: None,
            start: None,
            end: None,
            fields: Selection::All,
            tags: Selection::All,
            notags: Vec::new(),
            regions: Vec::new(),
            num_blocks: None,
            block_id: None,
            block_class: None,
            range: None,
        }
    }

    pub fn format_or_default(&self) -> Format {
        self.format.unwrap_or_else(|| self.endpoint.default_format())
    }

    pub fn is_unfiltered(&self) -> bool {
        self.class == DataClass::Body
            && self.reference_name.is_none()
            && self.regions.is_empty()
            && self.fields.is_all()
            && self.tags.is_all()
            && self.notags.is_empty()
            && self.location.as_ref().is_none_or(|location| {
                self.format_or_default() == formats::stored_format(self.endpoint, location)
            })
    }

    pub fn finish(self) -> Result<HtsgetRequest> {
        let location = self
            .location
            .ok_or_else(|| Error::Internal(format!("id '{}' was never resolved", self.id)))?;
        let format = self.format.unwrap_or_else(|| self.endpoint.default_format());

        let mut regions = self.regions;
        if let Some(reference_name) = self.reference_name {
            regions.push(Region {
                reference_name,
                start: self.start,
                end: self.end,
            });
        }

        let block = Block {
            id: self.block_id.unwrap_or(0),
            count: self.num_blocks.unwrap_or(1),
            class: self.block_class.unwrap_or(self.class),
        };

        Ok(HtsgetRequest {
            id: self.id,
            endpoint: self.endpoint,
            location,
            format,
            class: self.class,
            fields: self.fields,
            tags: self.tags,
            notags: self.notags,
            regions,
            block,
            range: self.range,
        })
    }
}

/// Everything a handler extracted from the HTTP request, before validation.
#[derive(Debug, Default)]
pub struct RawInputs {
    pub id: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Option<TicketPostBody>,
}

/// Collaborators needed while validating a single request.
pub struct ValidationContext<'a> {
    registry: &'a Registry,
    header_reader: &'a dyn HeaderReader,
    reference_names: OnceCell<Vec<String>>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(registry: &'a Registry, header_reader: &'a dyn HeaderReader) -> Self {
        Self {
            registry,
            header_reader,
            reference_names: OnceCell::new(),
        }
    }

    /// Reference dictionary of the object being requested, read at most once.
    async fn reference_names(&self, partial: &PartialRequest) -> Result<&[String]> {
        let names = self
            .reference_names
            .get_or_try_init(|| async {
                let location = partial.location.as_ref().ok_or_else(|| {
                    Error::Internal("reference names requested before id".to_string())
                })?;
                self.header_reader
                    .reference_names(partial.format_or_default(), location)
                    .await
            })
            .await?;
        Ok(names.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RawValue {
    Scalar(String),
    List(Vec<String>),
    Regions(Vec<Region>),
}

impl RawValue {
    fn into_scalar(self, param: Param) -> Result<String> {
        match self {
            RawValue::Scalar(value) => Ok(value),
            _ => Err(param.error(format!("{} must be a single value", param.name()))),
        }
    }

    fn into_list(self) -> Vec<String> {
        match self {
            RawValue::Scalar(value) => split_list(&value),
            RawValue::List(values) => values,
            RawValue::Regions(_) => Vec::new(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn lookup(param: Param, source: Source, raw: &RawInputs) -> Result<Option<RawValue>> {
    let value = match source {
        Source::Path => Some(RawValue::Scalar(raw.id.clone())),
        Source::Query => raw.query.get(param.name()).map(|value| {
            if param.is_list() {
                RawValue::List(split_list(value))
            } else {
                RawValue::Scalar(value.clone())
            }
        }),
        Source::Header => match raw.headers.get(param.name()) {
            Some(value) => {
                let value = value.to_str().map_err(|_| {
                    param.error(format!("{} header is not valid text", param.name()))
                })?;
                Some(RawValue::Scalar(value.to_string()))
            }
            None => None,
        },
        Source::Body => raw.body.as_ref().and_then(|body| match param {
            Param::Format => body.format.clone().map(RawValue::Scalar),
            Param::Class => body.class.clone().map(RawValue::Scalar),
            Param::Fields => body.fields.clone().map(RawValue::List),
            Param::Tags => body.tags.clone().map(RawValue::List),
            Param::NoTags => body.notags.clone().map(RawValue::List),
            Param::Regions => body.regions.clone().map(RawValue::Regions),
            _ => None,
        }),
    };
    Ok(value)
}

fn transform(param: Param, value: RawValue) -> RawValue {
    match (param, value) {
        (Param::Format, RawValue::Scalar(value)) => RawValue::Scalar(value.to_ascii_uppercase()),
        (Param::Class | Param::BlockClass, RawValue::Scalar(value)) => {
            RawValue::Scalar(value.to_ascii_lowercase())
        }
        (_, value) => value,
    }
}

async fn apply(
    param: Param,
    value: RawValue,
    partial: &mut PartialRequest,
    ctx: &ValidationContext<'_>,
) -> Result<()> {
    let invalid = |message: String| param.error(message);

    match param {
        Param::Id => {
            let id = value.into_scalar(param)?;
            let location = ctx.registry.resolve(&id)?;
            partial.id = id;
            partial.location = Some(location);
        }
        Param::Format => {
            let value = value.into_scalar(param)?;
            partial.format = Some(validate_format(&value, partial.endpoint).map_err(invalid)?);
        }
        Param::Class => {
            let value = value.into_scalar(param)?;
            partial.class = validate_class(&value, partial).map_err(invalid)?;
        }
        Param::ReferenceName => {
            let value = value.into_scalar(param)?;
            let known: &[String] = if needs_reference_names(&value) && partial.class != DataClass::Header {
                ctx.reference_names(partial).await?
            } else {
                &[]
            };
            validate_reference_name(&value, partial, known).map_err(invalid)?;
            partial.reference_name = Some(value);
        }
        Param::Start => {
            let value = value.into_scalar(param)?;
            partial.start = Some(validate_start(&value, partial).map_err(invalid)?);
        }
        Param::End => {
            let value = value.into_scalar(param)?;
            partial.end = Some(validate_end(&value, partial).map_err(invalid)?);
        }
        Param::Fields => {
            let values = value.into_list();
            validate_fields(&values, partial).map_err(invalid)?;
            partial.fields = Selection::Only(values);
        }
        Param::Tags => {
            let values = value.into_list();
            validate_tags(&values, partial).map_err(invalid)?;
            partial.tags = Selection::Only(values);
        }
        Param::NoTags => {
            let values = value.into_list();
            validate_notags(&values, partial).map_err(invalid)?;
            partial.notags = values;
        }
        Param::Regions => {
            let RawValue::Regions(regions) = value else {
                return Err(invalid("regions must be a list of objects".to_string()));
            };
            for region in &regions {
                validate_region(region, partial, ctx).await?;
            }
            partial.regions = regions;
        }
        Param::NumBlocks => {
            let value = value.into_scalar(param)?;
            partial.num_blocks = Some(validate_num_blocks(&value, partial).map_err(invalid)?);
        }
        Param::BlockId => {
            let value = value.into_scalar(param)?;
            partial.block_id = Some(validate_block_id(&value, partial).map_err(invalid)?);
        }
        Param::BlockClass => {
            let value = value.into_scalar(param)?;
            partial.block_class = Some(validate_block_class(&value, partial).map_err(invalid)?);
        }
        Param::Range => {
            let value = value.into_scalar(param)?;
            partial.range = Some(validate_range(&value, partial).map_err(invalid)?);
        }
    }
    Ok(())
}

/// A body region is checked like a GET `referenceName`/`start`/`end` triple,
/// against a copy of the request scoped to that region.
async fn validate_region(
    region: &Region,
    partial: &PartialRequest,
    ctx: &ValidationContext<'_>,
) -> Result<()> {
    let mut scoped = PartialRequest {
        reference_name: None,
        start: None,
        end: None,
        regions: Vec::new(),
        ..partial.clone()
    };

    let name = region.reference_name.as_str();
    let known: &[String] = if needs_reference_names(name) && scoped.class != DataClass::Header {
        ctx.reference_names(&scoped).await?
    } else {
        &[]
    };
    validate_reference_name(name, &scoped, known).map_err(|m| Param::Regions.error(m))?;
    scoped.reference_name = Some(name.to_string());

    if let Some(start) = region.start {
        scoped.start =
            Some(validate_start(&start.to_string(), &scoped).map_err(|m| Param::Start.error(m))?);
    }
    if let Some(end) = region.end {
        validate_end(&end.to_string(), &scoped).map_err(|m| Param::End.error(m))?;
    }
    Ok(())
}

/// Run every parameter of `order` against `raw`, stopping at the first failure.
pub async fn parse_and_validate(
    endpoint: Endpoint,
    raw: &RawInputs,
    order: ParamOrder,
    ctx: &ValidationContext<'_>,
) -> Result<HtsgetRequest> {
    let mut partial = PartialRequest::new(endpoint);

    for &(param, source) in order {
        let Some(value) = lookup(param, source, raw)? else {
            continue;
        };
        if let Err(err) = apply(param, transform(param, value), &mut partial, ctx).await {
            tracing::debug!(id = %raw.id, param = param.name(), %err, "request rejected");
            return Err(err);
        }
    }

    partial.finish()
}
