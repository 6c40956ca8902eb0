use crate::formats::Tools;
use crate::registry::{DataSourceConfig, Registry};
use crate::ticket::DEFAULT_CHUNK_SIZE;
use crate::{Error, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(name = "htsget-refserver")]
#[command(about = "htsget reference server")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "HTSGET_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "HTSGET_PORT", default_value = "3000")]
    pub port: u16,

    /// Base URL written into ticket URLs (e.g., https://example.com/htsget)
    #[arg(long, env = "HTSGET_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory served when no registry file is given
    #[arg(long, env = "HTSGET_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// JSON file describing the reads and variants data sources
    #[arg(long, env = "HTSGET_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Largest byte range handed out for an unfiltered object
    #[arg(long, env = "HTSGET_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    #[arg(long, env = "HTSGET_SAMTOOLS", default_value = "samtools")]
    pub samtools: String,

    #[arg(long, env = "HTSGET_BCFTOOLS", default_value = "bcftools")]
    pub bcftools: String,

    /// Field/tag rewrite filter placed between the two samtools stages
    #[arg(long, env = "HTSGET_MODIFY_SAM", default_value = "htsget-modify-sam")]
    pub modify_sam: String,

    /// Enable CORS for all origins
    #[arg(long, env = "HTSGET_CORS", default_value = "true")]
    pub cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Contents of the `--registry` file.
#[derive(Debug, Default, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub reads: RegistrySection,
    #[serde(default)]
    pub variants: RegistrySection,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegistrySection {
    #[serde(default)]
    pub sources: Vec<DataSourceConfig>,
}

const DATA_DIR_ID_PATTERN: &str = r"^(?P<id>[A-Za-z0-9_-][A-Za-z0-9._-]*)$";

impl RegistryFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Internal(format!("failed to read registry {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            Error::Internal(format!("invalid registry {}: {}", path.display(), e))
        })
    }

    /// One source per datatype, rooted at `data_dir`.
    ///
    /// Ids are single file names: no path separators, and no leading dot, so
    /// `..` and hidden files never match.
    pub fn for_data_dir(data_dir: &Path) -> Self {
        let source = |extension: &str| RegistrySection {
            sources: vec![DataSourceConfig {
                pattern: DATA_DIR_ID_PATTERN.to_string(),
                location: format!("{}/{{id}}.{}", data_dir.display(), extension),
            }],
        };
        Self {
            reads: source("bam"),
            variants: source("vcf.gz"),
        }
    }
}

impl Config {
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }

    pub fn base_url(&self) -> Result<Url> {
        let base_url = self.effective_base_url();
        Url::parse(&base_url)
            .map_err(|e| Error::Internal(format!("invalid base URL '{}': {}", base_url, e)))
    }

    /// Reads and variants registries, validated.
    pub fn registries(&self) -> Result<(Registry, Registry)> {
        let file = match &self.registry {
            Some(path) => RegistryFile::load(path)?,
            None => RegistryFile::for_data_dir(&self.data_dir),
        };
        Ok((
            Registry::from_config(&file.reads.sources)?,
            Registry::from_config(&file.variants.sources)?,
        ))
    }

    pub fn tools(&self) -> Tools {
        Tools {
            samtools: self.samtools.clone(),
            bcftools: self.bcftools.clone(),
            modify_sam: self.modify_sam.clone(),
        }
    }
}
