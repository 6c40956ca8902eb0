use super::Tools;
use crate::pipeline::{Command, CommandChain};
use crate::registry::Location;
use crate::request::HtsgetRequest;
use crate::types::{Region, Selection};
use crate::{Error, Result};
use noodles::sam;

/// `samtools view -H -b`: the BAM header followed by the BGZF end-of-file block.
pub fn header_command(samtools: &str, location: &Location) -> Command {
    Command::new(samtools)
        .args(["view", "--no-PG", "-H", "-b"])
        .arg(location.as_tool_arg())
}

/// `samtools view -H`: the header as SAM text.
pub fn header_text_command(samtools: &str, location: &Location) -> Command {
    Command::new(samtools)
        .args(["view", "--no-PG", "-H"])
        .arg(location.as_tool_arg())
}

/// Region view, plus a SAM text round trip through the field/tag filter when
/// the request redacts anything.
pub fn body_chain(tools: &Tools, request: &HtsgetRequest) -> CommandChain {
    let location = request.location.as_tool_arg();
    let region = request.regions.first().map(Region::to_tool_region);

    if !request.has_field_filter() {
        return CommandChain::from(
            Command::new(&tools.samtools)
                .args(["view", "--no-PG", "-b"])
                .arg(location)
                .args(region),
        );
    }

    CommandChain::new()
        .then(
            Command::new(&tools.samtools)
                .args(["view", "--no-PG", "-h"])
                .arg(location)
                .args(region),
        )
        .then(modify_sam_command(&tools.modify_sam, request))
        .then(Command::new(&tools.samtools).args(["view", "--no-PG", "-b", "-"]))
}

fn modify_sam_command(program: &str, request: &HtsgetRequest) -> Command {
    let mut command = Command::new(program);
    if let Selection::Only(fields) = &request.fields {
        command = command.arg("--fields").arg(fields.join(","));
    }
    if let Selection::Only(tags) = &request.tags {
        command = command.arg("--tags").arg(tags.join(","));
    }
    if !request.notags.is_empty() {
        command = command.arg("--notags").arg(request.notags.join(","));
    }
    command
}

/// Reference sequence names (`@SQ SN`) from SAM header text.
pub fn parse_reference_names(text: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(text)
        .map_err(|e| Error::Internal(format!("SAM header is not UTF-8: {}", e)))?;

    let header: sam::Header = text
        .parse()
        .map_err(|e| Error::Internal(format!("failed to parse SAM header: {}", e)))?;

    Ok(header
        .reference_sequences()
        .keys()
        .map(|name| name.to_string())
        .collect())
}
