use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// htsget response format per spec 1.3
#[derive(Debug, Serialize)]
pub struct HtsgetResponse {
    pub htsget: HtsgetResponseBody,
}

#[derive(Debug, Serialize)]
pub struct HtsgetResponseBody {
    pub format: Format,
    pub urls: Vec<UrlEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlEntry {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<DataClass>,
}

/// Data formats served by this implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    #[default]
    Bam,
    Vcf,
    Bcf,
}

impl Format {
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Bam => "application/vnd.ga4gh.bam",
            Format::Vcf => "application/vnd.ga4gh.vcf",
            Format::Bcf => "application/vnd.ga4gh.bcf",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Bam => "BAM",
            Format::Vcf => "VCF",
            Format::Bcf => "BCF",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BAM" => Ok(Format::Bam),
            "VCF" => Ok(Format::Vcf),
            "BCF" => Ok(Format::Bcf),
            other => Err(format!("'{}' is not a supported format", other)),
        }
    }
}

/// Data class - header only or full data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataClass {
    #[default]
    Body,
    Header,
}

impl DataClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataClass::Body => "body",
            DataClass::Header => "header",
        }
    }
}

impl FromStr for DataClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "header" => Ok(DataClass::Header),
            "body" => Ok(DataClass::Body),
            other => Err(format!("'{}' is not a valid class", other)),
        }
    }
}

/// The two htsget datatypes, each with its own endpoints and registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Reads,
    Variants,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Reads => "reads",
            Endpoint::Variants => "variants",
        }
    }

    pub fn formats(&self) -> &'static [Format] {
        match self {
            Endpoint::Reads => &[Format::Bam],
            Endpoint::Variants => &[Format::Vcf, Format::Bcf],
        }
    }

    pub fn default_format(&self) -> Format {
        match self {
            Endpoint::Reads => Format::Bam,
            Endpoint::Variants => Format::Vcf,
        }
    }

    /// Whether `fields`, `tags` and `notags` apply to this datatype.
    pub fn supports_field_filtering(&self) -> bool {
        matches!(self, Endpoint::Reads)
    }
}

/// Value of the `fields` and `tags` parameters: everything, or only the listed names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Only(Vec<String>),
}

impl Selection {
    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(names) => names.iter().any(|n| n == name),
        }
    }

    /// Comma-joined list, `None` for [`Selection::All`].
    pub fn to_param(&self) -> Option<String> {
        match self {
            Selection::All => None,
            Selection::Only(names) => Some(names.join(",")),
        }
    }
}

/// Genomic interval filter. Coordinates are 0-based, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(rename = "referenceName")]
    pub reference_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
}

impl Region {
    pub fn new(reference_name: impl Into<String>) -> Self {
        Self {
            reference_name: reference_name.into(),
            start: None,
            end: None,
        }
    }

    pub fn with_start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }

    /// Region string understood by samtools and bcftools (1-based, inclusive).
    pub fn to_tool_region(&self) -> String {
        match (self.start, self.end) {
            (None, None) => self.reference_name.clone(),
            (Some(start), None) => format!("{}:{}", self.reference_name, start + 1),
            (None, Some(end)) => format!("{}:1-{}", self.reference_name, end),
            (Some(start), Some(end)) => {
                format!("{}:{}-{}", self.reference_name, start + 1, end)
            }
        }
    }
}

/// POST request body for the ticket endpoints
#[derive(Debug, Default, Deserialize)]
pub struct TicketPostBody {
    pub format: Option<String>,
    pub class: Option<String>,
    pub fields: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub notags: Option<Vec<String>>,
    pub regions: Option<Vec<Region>>,
}

/// Service info response (GA4GH service-info spec)
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub r#type: ServiceType,
    pub description: Option<String>,
    pub organization: Organization,
    pub version: String,
    pub htsget: HtsgetCapabilities,
}

#[derive(Debug, Serialize)]
pub struct ServiceType {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Organization {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HtsgetCapabilities {
    pub datatype: String,
    pub formats: Vec<Format>,
    #[serde(rename = "fieldsParameterEffective")]
    pub fields_parameter_effective: bool,
    #[serde(rename = "tagsParametersEffective")]
    pub tags_parameters_effective: bool,
}
