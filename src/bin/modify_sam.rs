//! SAM filter used between the two samtools stages of a filtered block.
//!
//! Reads SAM on stdin and writes SAM on stdout with excluded columns set to
//! their missing values and optional tags kept or dropped by name.

use clap::Parser;
use htsget_refserver::formats::fields::{RecordFilter, is_sam_field};
use htsget_refserver::types::Selection;
use std::io::{self, BufReader, BufWriter};

#[derive(Debug, Parser)]
#[command(name = "htsget-modify-sam")]
#[command(about = "Redact SAM columns and tags read from stdin")]
struct Args {
    /// Columns to keep (comma-separated); all when absent, none when empty
    #[arg(long, value_delimiter = ',', num_args = 0..=1)]
    fields: Option<Vec<String>>,

    /// Tags to keep (comma-separated); all when absent, none when empty
    #[arg(long, value_delimiter = ',', num_args = 0..=1)]
    tags: Option<Vec<String>>,

    /// Tags to drop (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "")]
    notags: Vec<String>,
}

/// `--fields ""` arrives as a single empty value, which means "none".
fn selection(values: Option<Vec<String>>) -> Selection {
    match values {
        None => Selection::All,
        Some(values) => Selection::Only(values.into_iter().filter(|v| !v.is_empty()).collect()),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let fields = selection(args.fields);
    if let Selection::Only(names) = &fields {
        if let Some(unknown) = names.iter().find(|f| !is_sam_field(f)) {
            anyhow::bail!("'{}' is not a SAM field", unknown);
        }
    }

    let notags: Vec<String> = args.notags.into_iter().filter(|t| !t.is_empty()).collect();
    let filter = RecordFilter::new(&fields, &selection(args.tags), &notags);

    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    filter.filter(BufReader::new(stdin), BufWriter::new(stdout))?;
    Ok(())
}
