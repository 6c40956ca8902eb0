//! Parameter validators.
//!
//! Each validator sees the raw (already transformed) value and the request as
//! built so far, and returns either the parsed value or a message. Which error
//! kind a message becomes is decided by the parameter, not the validator.

use super::PartialRequest;
use crate::formats::fields::is_sam_field;
use crate::storage::ByteRange;
use crate::types::{DataClass, Endpoint, Format, Selection};

pub type Validation<T> = std::result::Result<T, String>;

fn reject_header_class(req: &PartialRequest, param: &str) -> Validation<()> {
    if req.class == DataClass::Header {
        return Err(format!("{} is not allowed when class=header", param));
    }
    Ok(())
}

fn parse_coordinate(value: &str, param: &str) -> Validation<u64> {
    value
        .parse::<u64>()
        .map_err(|_| format!("{} must be a non-negative integer, got '{}'", param, value))
}

pub fn validate_format(value: &str, endpoint: Endpoint) -> Validation<Format> {
    let format: Format = value.parse()?;
    if !endpoint.formats().contains(&format) {
        return Err(format!(
            "{} is not a supported {} format",
            format,
            endpoint.name()
        ));
    }
    Ok(format)
}

pub fn validate_class(value: &str, _req: &PartialRequest) -> Validation<DataClass> {
    match value {
        "header" => Ok(DataClass::Header),
        other => Err(format!("class must be 'header', got '{}'", other)),
    }
}

/// `known` is the object's own reference dictionary; it is not consulted for `*`.
pub fn validate_reference_name(value: &str, req: &PartialRequest, known: &[String]) -> Validation<()> {
    reject_header_class(req, "referenceName")?;

    if value.is_empty() {
        return Err("referenceName must not be empty".to_string());
    }
    if value == "*" {
        return match req.endpoint {
            Endpoint::Reads => Ok(()),
            Endpoint::Variants => Err("referenceName=* is only meaningful for reads".to_string()),
        };
    }
    if !known.iter().any(|name| name == value) {
        return Err(format!(
            "reference sequence '{}' is not in the header of the requested object",
            value
        ));
    }
    Ok(())
}

/// Whether the request needs the reference dictionary to validate `value`.
pub fn needs_reference_names(value: &str) -> bool {
    !value.is_empty() && value != "*"
}

fn require_placed_reference(req: &PartialRequest, param: &str) -> Validation<()> {
    match req.reference_name.as_deref() {
        None => Err(format!("{} requires referenceName", param)),
        Some("*") => Err(format!("{} is not allowed when referenceName=*", param)),
        Some(_) => Ok(()),
    }
}

pub fn validate_start(value: &str, req: &PartialRequest) -> Validation<u64> {
    reject_header_class(req, "start")?;
    require_placed_reference(req, "start")?;
    parse_coordinate(value, "start")
}

pub fn validate_end(value: &str, req: &PartialRequest) -> Validation<u64> {
    reject_header_class(req, "end")?;
    require_placed_reference(req, "end")?;
    let end = parse_coordinate(value, "end")?;
    // An absent start means the beginning of the sequence.
    let start = req.start.unwrap_or(0);
    if end <= start {
        return Err(format!("end ({}) must be greater than start ({})", end, start));
    }
    Ok(end)
}

pub fn validate_fields(values: &[String], req: &PartialRequest) -> Validation<()> {
    reject_header_class(req, "fields")?;
    match values.iter().find(|field| !is_sam_field(field)) {
        Some(field) => Err(format!("'{}' is not a SAM field", field)),
        None => Ok(()),
    }
}

fn check_tag_names(values: &[String]) -> Validation<()> {
    let valid = |tag: &str| {
        let bytes = tag.as_bytes();
        bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1].is_ascii_alphanumeric()
    };
    match values.iter().find(|tag| !valid(tag.as_str())) {
        Some(tag) => Err(format!("'{}' is not a valid SAM tag name", tag)),
        None => Ok(()),
    }
}

pub fn validate_tags(values: &[String], req: &PartialRequest) -> Validation<()> {
    reject_header_class(req, "tags")?;
    check_tag_names(values)
}

/// `notags` must not name anything `tags` asks for.
pub fn validate_notags(values: &[String], req: &PartialRequest) -> Validation<()> {
    reject_header_class(req, "notags")?;
    check_tag_names(values)?;
    if let Selection::Only(tags) = &req.tags {
        if let Some(tag) = values.iter().find(|tag| tags.contains(tag)) {
            return Err(format!("'{}' appears in both tags and notags", tag));
        }
    }
    Ok(())
}

pub fn validate_num_blocks(value: &str, _req: &PartialRequest) -> Validation<usize> {
    match value.parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(format!("HtsgetNumBlocks must be a positive integer, got '{}'", value)),
    }
}

pub fn validate_block_id(value: &str, req: &PartialRequest) -> Validation<usize> {
    let id = value
        .parse::<usize>()
        .map_err(|_| format!("HtsgetBlockId must be a non-negative integer, got '{}'", value))?;
    let count = req.num_blocks.unwrap_or(1);
    if id >= count {
        return Err(format!(
            "HtsgetBlockId ({}) must be less than HtsgetNumBlocks ({})",
            id, count
        ));
    }
    Ok(id)
}

pub fn validate_block_class(value: &str, req: &PartialRequest) -> Validation<DataClass> {
    let class: DataClass = value.parse()?;
    if class != req.class {
        return Err(format!(
            "HtsgetBlockClass '{}' does not match the requested class '{}'",
            class.as_str(),
            req.class.as_str()
        ));
    }
    Ok(class)
}

/// `bytes=<start>-<end>` or `bytes=<start>-`, only on unfiltered body requests.
pub fn validate_range(value: &str, req: &PartialRequest) -> Validation<ByteRange> {
    if !req.is_unfiltered() {
        return Err("Range is only supported when no filtering is requested".to_string());
    }

    let ranges = value
        .strip_prefix("bytes=")
        .ok_or_else(|| format!("unsupported Range header '{}'", value))?;
    let (start, end) = ranges
        .split_once('-')
        .ok_or_else(|| format!("malformed Range header '{}'", value))?;

    let start = parse_coordinate(start.trim(), "Range start")?;
    let end = match end.trim() {
        "" => None,
        end => Some(parse_coordinate(end, "Range end")?),
    };
    if end.is_some_and(|end| end < start) {
        return Err(format!("Range end precedes start in '{}'", value));
    }
    Ok(ByteRange { start, end })
}
