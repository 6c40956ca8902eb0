use crate::pipeline::{Command, CommandChain};
use crate::registry::Location;
use crate::request::HtsgetRequest;
use crate::types::{Format, Region};
use crate::{Error, Result};
use noodles::vcf;

/// bcftools `-O` value: bgzipped VCF or BCF.
fn output_type(format: Format) -> &'static str {
    match format {
        Format::Bcf => "b",
        _ => "z",
    }
}

pub fn header_command(bcftools: &str, format: Format, location: &Location) -> Command {
    Command::new(bcftools)
        .args(["view", "--no-version", "-h", "-O", output_type(format)])
        .arg(location.as_tool_arg())
}

/// Uncompressed VCF header text.
pub fn header_text_command(bcftools: &str, location: &Location) -> Command {
    Command::new(bcftools)
        .args(["view", "--no-version", "-h"])
        .arg(location.as_tool_arg())
}

pub fn body_chain(bcftools: &str, request: &HtsgetRequest) -> CommandChain {
    let mut view = Command::new(bcftools).args(["view", "--no-version", "-O", output_type(request.format)]);
    if let Some(region) = request.regions.first() {
        view = view.arg("-r").arg(Region::to_tool_region(region));
    }
    CommandChain::from(view.arg(request.location.as_tool_arg()))
}

/// Contig names (`##contig=<ID=...>`) from VCF header text.
pub fn parse_contig_names(text: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(text)
        .map_err(|e| Error::Internal(format!("VCF header is not UTF-8: {}", e)))?;

    let header: vcf::Header = text
        .parse()
        .map_err(|e| Error::Internal(format!("failed to parse VCF header: {}", e)))?;

    Ok(header.contigs().keys().cloned().collect())
}
