//! Parameter table and per-endpoint processing orders.
//!
//! Validators read fields that earlier parameters wrote into the
//! [`PartialRequest`](super::PartialRequest), so the order of each list below
//! is part of its contract: `referenceName` before `start` before `end`,
//! `tags` before `notags`, `HtsgetNumBlocks` before `HtsgetBlockId`, and
//! every filter before `Range`.

use crate::Error;
use crate::types::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Id,
    Format,
    Class,
    ReferenceName,
    Start,
    End,
    Fields,
    Tags,
    NoTags,
    Regions,
    NumBlocks,
    BlockId,
    BlockClass,
    Range,
}

/// Where a parameter's raw value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Path,
    Query,
    Body,
    Header,
}

impl Param {
    /// Name on the wire (query key, JSON key or header name).
    pub fn name(self) -> &'static str {
        match self {
            Param::Id => "id",
            Param::Format => "format",
            Param::Class => "class",
            Param::ReferenceName => "referenceName",
            Param::Start => "start",
            Param::End => "end",
            Param::Fields => "fields",
            Param::Tags => "tags",
            Param::NoTags => "notags",
            Param::Regions => "regions",
            Param::NumBlocks => "HtsgetNumBlocks",
            Param::BlockId => "HtsgetBlockId",
            Param::BlockClass => "HtsgetBlockClass",
            Param::Range => "Range",
        }
    }

    /// List-valued parameters arrive comma-separated in query strings.
    pub fn is_list(self) -> bool {
        matches!(self, Param::Fields | Param::Tags | Param::NoTags)
    }

    /// Wrap a validation message in this parameter's designated error kind.
    pub fn error(self, message: String) -> Error {
        match self {
            Param::Id => Error::NotFound(message),
            Param::Format => Error::UnsupportedFormat(message),
            Param::Start | Param::End | Param::Range => Error::InvalidRange(message),
            _ => Error::InvalidInput(message),
        }
    }
}

pub type ParamOrder = &'static [(Param, Source)];

const READS_TICKET_GET: ParamOrder = &[
    (Param::Id, Source::Path),
    (Param::Format, Source::Query),
    (Param::Class, Source::Query),
    (Param::ReferenceName, Source::Query),
    (Param::Start, Source::Query),
    (Param::End, Source::Query),
    (Param::Fields, Source::Query),
    (Param::Tags, Source::Query),
    (Param::NoTags, Source::Query),
];

const READS_TICKET_POST: ParamOrder = &[
    (Param::Id, Source::Path),
    (Param::Format, Source::Body),
    (Param::Class, Source::Body),
    (Param::Fields, Source::Body),
    (Param::Tags, Source::Body),
    (Param::NoTags, Source::Body),
    (Param::Regions, Source::Body),
];

const VARIANTS_TICKET_GET: ParamOrder = &[
    (Param::Id, Source::Path),
    (Param::Format, Source::Query),
    (Param::Class, Source::Query),
    (Param::ReferenceName, Source::Query),
    (Param::Start, Source::Query),
    (Param::End, Source::Query),
];

const VARIANTS_TICKET_POST: ParamOrder = &[
    (Param::Id, Source::Path),
    (Param::Format, Source::Body),
    (Param::Class, Source::Body),
    (Param::Regions, Source::Body),
];

const READS_DATA: ParamOrder = &[
    (Param::Id, Source::Path),
    (Param::Format, Source::Query),
    (Param::Class, Source::Query),
    (Param::ReferenceName, Source::Query),
    (Param::Start, Source::Query),
    (Param::End, Source::Query),
    (Param::Fields, Source::Query),
    (Param::Tags, Source::Query),
    (Param::NoTags, Source::Query),
    (Param::NumBlocks, Source::Header),
    (Param::BlockId, Source::Header),
    (Param::BlockClass, Source::Header),
    (Param::Range, Source::Header),
];

const VARIANTS_DATA: ParamOrder = &[
    (Param::Id, Source::Path),
    (Param::Format, Source::Query),
    (Param::Class, Source::Query),
    (Param::ReferenceName, Source::Query),
    (Param::Start, Source::Query),
    (Param::End, Source::Query),
    (Param::NumBlocks, Source::Header),
    (Param::BlockId, Source::Header),
    (Param::BlockClass, Source::Header),
    (Param::Range, Source::Header),
];

pub fn ticket_get_order(endpoint: Endpoint) -> ParamOrder {
    match endpoint {
        Endpoint::Reads => READS_TICKET_GET,
        Endpoint::Variants => VARIANTS_TICKET_GET,
    }
}

pub fn ticket_post_order(endpoint: Endpoint) -> ParamOrder {
    match endpoint {
        Endpoint::Reads => READS_TICKET_POST,
        Endpoint::Variants => VARIANTS_TICKET_POST,
    }
}

pub fn data_order(endpoint: Endpoint) -> ParamOrder {
    match endpoint {
        Endpoint::Reads => READS_DATA,
        Endpoint::Variants => VARIANTS_DATA,
    }
}
