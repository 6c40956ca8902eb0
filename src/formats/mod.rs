//! Container formats and the external tools that read them.
//!
//! This module knows the handful of structural facts the streaming engine
//! needs about each container format (its end-of-file marker) and how to
//! phrase samtools / bcftools invocations for a block.
//!
//! # Submodules
//!
//! - [`bam`] - samtools invocations for BAM, and SAM header dictionaries
//! - [`vcf`] - bcftools invocations for VCF / BCF, and VCF contig dictionaries
//! - [`fields`] - column and tag redaction of SAM text records

pub mod bam;
pub mod fields;
pub mod vcf;

use crate::pipeline::{Command, CommandChain};
use crate::registry::Location;
use crate::request::HtsgetRequest;
use crate::types::{DataClass, Endpoint, Format};
use crate::{Error, Result};
use async_trait::async_trait;

/// The empty BGZF block that terminates every BGZF stream (BAM, VCF.gz, BCF).
pub const BGZF_EOF: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// End-of-file marker written by the tools for each format.
pub fn trailer(format: Format) -> &'static [u8] {
    match format {
        Format::Bam | Format::Vcf | Format::Bcf => &BGZF_EOF,
    }
}

/// Container an object is stored in, judged by its name.
///
/// Reads objects are always BAM. Variants objects are BCF when named `.bcf`
/// and bgzipped VCF otherwise.
pub fn stored_format(endpoint: Endpoint, location: &Location) -> Format {
    let name = match location {
        Location::Local(path) => path.to_string_lossy().into_owned(),
        Location::Remote(url) => url.path().to_string(),
    };
    match endpoint {
        Endpoint::Reads => Format::Bam,
        Endpoint::Variants if name.ends_with(".bcf") => Format::Bcf,
        Endpoint::Variants => Format::Vcf,
    }
}

/// Source of the reference sequence dictionary of an object.
#[async_trait]
pub trait HeaderReader: Send + Sync {
    async fn reference_names(&self, format: Format, location: &Location) -> Result<Vec<String>>;
}

/// Programs used to build pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub samtools: String,
    pub bcftools: String,
    pub modify_sam: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            samtools: "samtools".to_string(),
            bcftools: "bcftools".to_string(),
            modify_sam: "htsget-modify-sam".to_string(),
        }
    }
}

impl Tools {
    /// Binary, header-only conversion of the object (header + end-of-file marker).
    pub fn header_command(&self, format: Format, location: &Location) -> Command {
        match format {
            Format::Bam => bam::header_command(&self.samtools, location),
            Format::Vcf | Format::Bcf => vcf::header_command(&self.bcftools, format, location),
        }
    }

    /// Pipeline producing the raw (untrimmed) bytes of one block.
    pub fn block_chain(&self, request: &HtsgetRequest) -> CommandChain {
        match request.block.class {
            DataClass::Header => {
                CommandChain::from(self.header_command(request.format, &request.location))
            }
            DataClass::Body => match request.format {
                Format::Bam => bam::body_chain(self, request),
                Format::Vcf | Format::Bcf => vcf::body_chain(&self.bcftools, request),
            },
        }
    }

    /// Number of leading bytes a body block shares with the header block.
    pub async fn header_size(&self, format: Format, location: &Location) -> Result<u64> {
        let output = CommandChain::from(self.header_command(format, location))
            .output()
            .await?;

        let trailer = trailer(format);
        if !output.ends_with(trailer) {
            return Err(Error::Internal(format!(
                "{} header of {} does not end with an end-of-file marker",
                format, location
            )));
        }

        let size = (output.len() - trailer.len()) as u64;
        tracing::debug!(%location, size, "measured header");
        Ok(size)
    }
}

#[async_trait]
impl HeaderReader for Tools {
    async fn reference_names(&self, format: Format, location: &Location) -> Result<Vec<String>> {
        match format {
            Format::Bam => {
                let text = CommandChain::from(bam::header_text_command(&self.samtools, location))
                    .output()
                    .await?;
                bam::parse_reference_names(&text)
            }
            Format::Vcf | Format::Bcf => {
                let text = CommandChain::from(vcf::header_text_command(&self.bcftools, location))
                    .output()
                    .await?;
                vcf::parse_contig_names(&text)
            }
        }
    }
}
