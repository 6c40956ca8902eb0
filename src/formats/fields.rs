//! Column and tag redaction of SAM records.
//!
//! Excluded mandatory fields are set to their missing value rather than
//! removed, so every record stays valid SAM. Optional fields are kept or
//! dropped by tag against the `tags` / `notags` sets.

use crate::types::Selection;
use noodles::sam;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::io::Write as _;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::{Flags, MappingQuality};
use std::collections::HashSet;
use std::io::{self, BufRead, Write};

/// Canonical SAM columns, in file order.
pub const SAM_FIELDS: [&str; 11] = [
    "QNAME", "FLAG", "RNAME", "POS", "MAPQ", "CIGAR", "RNEXT", "PNEXT", "TLEN", "SEQ", "QUAL",
];

pub fn is_sam_field(name: &str) -> bool {
    SAM_FIELDS.contains(&name)
}

fn parse_tag(name: &str) -> Option<Tag> {
    match name.as_bytes() {
        [a, b] => Some(Tag::new(*a, *b)),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct RecordFilter {
    fields: HashSet<&'static str>,
    /// `None` keeps every tag not named in `notags`.
    tags: Option<HashSet<Tag>>,
    notags: HashSet<Tag>,
}

impl RecordFilter {
    pub fn new(fields: &Selection, tags: &Selection, notags: &[String]) -> Self {
        let tags = match tags {
            Selection::All => None,
            Selection::Only(names) => Some(names.iter().filter_map(|name| parse_tag(name)).collect()),
        };
        Self {
            fields: SAM_FIELDS.into_iter().filter(|field| fields.contains(field)).collect(),
            tags,
            notags: notags.iter().filter_map(|name| parse_tag(name)).collect(),
        }
    }

    fn drops(&self, field: &str) -> bool {
        !self.fields.contains(field)
    }

    fn keep_tag(&self, tag: &Tag) -> bool {
        self.tags.as_ref().is_none_or(|tags| tags.contains(tag)) && !self.notags.contains(tag)
    }

    /// Redact one record in place.
    pub fn apply(&self, record: &mut RecordBuf) {
        if self.drops("QNAME") {
            *record.name_mut() = None;
        }
        if self.drops("FLAG") {
            *record.flags_mut() = Flags::empty();
        }
        if self.drops("RNAME") {
            *record.reference_sequence_id_mut() = None;
        }
        if self.drops("POS") {
            *record.alignment_start_mut() = None;
        }
        if self.drops("MAPQ") {
            *record.mapping_quality_mut() = MappingQuality::new(0);
        }
        if self.drops("CIGAR") {
            *record.cigar_mut() = Default::default();
        }
        if self.drops("RNEXT") {
            *record.mate_reference_sequence_id_mut() = None;
        }
        if self.drops("PNEXT") {
            *record.mate_alignment_start_mut() = None;
        }
        if self.drops("TLEN") {
            *record.template_length_mut() = 0;
        }
        // QUAL must be missing or as long as SEQ.
        if self.drops("SEQ") {
            *record.sequence_mut() = Default::default();
            *record.quality_scores_mut() = Default::default();
        }
        if self.drops("QUAL") {
            *record.quality_scores_mut() = Default::default();
        }

        let dropped: Vec<Tag> = record
            .data()
            .iter()
            .map(|(tag, _)| tag.to_owned())
            .filter(|tag| !self.keep_tag(tag))
            .collect();
        for tag in dropped {
            record.data_mut().remove(&tag);
        }
    }

    /// Filter a SAM stream: the header passes through, every record is redacted.
    pub fn filter<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> io::Result<()> {
        let mut reader = sam::io::Reader::new(reader);
        let header = reader.read_header()?;

        {
            let mut sam_writer = sam::io::Writer::new(&mut writer);
            sam_writer.write_header(&header)?;
            for result in reader.record_bufs(&header) {
                let mut record = result?;
                self.apply(&mut record);
                sam_writer.write_alignment_record(&header, &record)?;
            }
        }

        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:248956422\n";
    const RECORD: &str = "r001\t99\tchr1\t7\t30\t8M\t*\t37\t39\tTTAGATAA\tIIIIIIII\tNM:i:1\tMD:Z:8\tHI:i:2";

    fn only(names: &[&str]) -> Selection {
        Selection::Only(names.iter().map(|s| s.to_string()).collect())
    }

    /// Run `filter` over one record and return the rewritten record line.
    fn rewrite(filter: &RecordFilter) -> String {
        let input = format!("{}{}\n", HEADER, RECORD);
        let mut out = Vec::new();
        filter.filter(input.as_bytes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let records: Vec<&str> = text.lines().filter(|line| !line.starts_with('@')).collect();
        assert_eq!(records.len(), 1);
        records[0].to_string()
    }

    #[test]
    fn test_everything_kept() {
        let filter = RecordFilter::new(&Selection::All, &Selection::All, &[]);
        assert_eq!(rewrite(&filter), RECORD);
    }

    #[test]
    fn test_excluded_fields_get_missing_values() {
        let filter = RecordFilter::new(&only(&["QNAME", "RNAME", "POS"]), &Selection::All, &[]);
        assert_eq!(
            rewrite(&filter),
            "r001\t0\tchr1\t7\t0\t*\t*\t0\t0\t*\t*\tNM:i:1\tMD:Z:8\tHI:i:2"
        );
    }

    #[test]
    fn test_no_fields() {
        let filter = RecordFilter::new(&Selection::Only(vec![]), &Selection::Only(vec![]), &[]);
        assert_eq!(rewrite(&filter), "*\t0\t*\t0\t0\t*\t*\t0\t0\t*\t*");
    }

    #[test]
    fn test_dropping_seq_blanks_qual() {
        let filter = RecordFilter::new(
            &only(&["QNAME", "FLAG", "RNAME", "POS", "MAPQ", "CIGAR", "RNEXT", "PNEXT", "TLEN", "QUAL"]),
            &Selection::All,
            &[],
        );
        let line = rewrite(&filter);
        let columns: Vec<&str> = line.split('\t').collect();
        assert_eq!(columns[9], "*");
        assert_eq!(columns[10], "*");
    }

    #[test]
    fn test_tag_inclusion() {
        let filter = RecordFilter::new(&Selection::All, &only(&["NM", "HI"]), &[]);
        assert!(rewrite(&filter).ends_with("IIIIIIII\tNM:i:1\tHI:i:2"));
    }

    #[test]
    fn test_tag_exclusion() {
        let filter = RecordFilter::new(&Selection::All, &Selection::All, &["MD".to_string()]);
        assert!(rewrite(&filter).ends_with("IIIIIIII\tNM:i:1\tHI:i:2"));
    }

    #[test]
    fn test_no_tags() {
        let filter = RecordFilter::new(&Selection::All, &Selection::Only(vec![]), &[]);
        assert!(rewrite(&filter).ends_with("TTAGATAA\tIIIIIIII"));
    }

    #[test]
    fn test_header_passes_through() {
        let input = format!("{}{}\n", HEADER, RECORD);
        let filter = RecordFilter::new(&only(&["QNAME"]), &Selection::Only(vec![]), &[]);
        let mut out = Vec::new();
        filter.filter(input.as_bytes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("@HD\tVN:1.6\n"));
        assert!(text.contains("@SQ\tSN:chr1\tLN:248956422\n"));
        assert!(text.ends_with("r001\t0\t*\t0\t0\t*\t*\t0\t0\t*\t*\n"));
    }

    #[test]
    fn test_field_names() {
        assert!(is_sam_field("TLEN"));
        assert!(!is_sam_field("NM"));
        assert!(!is_sam_field(""));
    }
}
