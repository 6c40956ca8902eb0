//! Data source registry.
//!
//! Maps opaque object ids onto concrete object locations. Each [`DataSource`]
//! pairs a regular expression with a location template; `{name}` placeholders
//! in the template are filled from the pattern's named capture groups. The
//! first source whose pattern matches wins.
//!
//! ```
//! use htsget_refserver::registry::{DataSource, Location, Registry};
//!
//! let registry = Registry::new(vec![
//!     DataSource::new(r"^sample\.(?P<name>.+)$", "/data/{name}.bam").unwrap(),
//! ]);
//! let location = registry.resolve("sample.NA12878").unwrap();
//! assert_eq!(location, Location::parse("/data/NA12878.bam"));
//! ```

use crate::{Error, Result};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Where an object lives: a file on this host or an http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(Url),
}

impl Location {
    /// Anything that parses as an http(s) URL is remote, everything else is a path.
    pub fn parse(s: &str) -> Self {
        match Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Location::Remote(url),
            _ => Location::Local(PathBuf::from(s)),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }

    /// Argument form passed to samtools/bcftools, which accept both paths and URLs.
    pub fn as_tool_arg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Serialized form of a data source, as found in the registry file.
#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceConfig {
    pub pattern: String,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct DataSource {
    pattern: Regex,
    template: String,
}

impl DataSource {
    /// Compile a data source, rejecting templates that name a group the pattern never captures.
    pub fn new(pattern: &str, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::Internal(format!("invalid data source pattern '{}': {}", pattern, e)))?;

        let groups: HashSet<&str> = pattern.capture_names().flatten().collect();
        for caps in PLACEHOLDER.captures_iter(&template) {
            if !groups.contains(&caps[1]) {
                return Err(Error::Internal(format!(
                    "data source template '{}' references '{}', which pattern '{}' does not capture",
                    template,
                    &caps[1],
                    pattern.as_str()
                )));
            }
        }

        Ok(Self { pattern, template })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// `None` when the pattern does not match the id.
    fn resolve(&self, id: &str) -> Option<Result<String>> {
        let captures = self.pattern.captures(id)?;

        let mut unset = None;
        let resolved = PLACEHOLDER.replace_all(&self.template, |caps: &Captures| {
            match captures.name(&caps[1]) {
                Some(m) => m.as_str().to_string(),
                None => {
                    unset.get_or_insert_with(|| caps[1].to_string());
                    String::new()
                }
            }
        });

        Some(match unset {
            Some(name) => Err(Error::Internal(format!(
                "group '{}' of pattern '{}' did not participate in the match for '{}'",
                name,
                self.pattern.as_str(),
                id
            ))),
            None => Ok(resolved.into_owned()),
        })
    }
}

/// Ordered list of data sources. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sources: Vec<DataSource>,
}

impl Registry {
    pub fn new(sources: Vec<DataSource>) -> Self {
        Self { sources }
    }

    pub fn from_config(sources: &[DataSourceConfig]) -> Result<Self> {
        sources
            .iter()
            .map(|s| DataSource::new(&s.pattern, s.location.clone()))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    pub fn sources(&self) -> &[DataSource] {
        &self.sources
    }

    pub fn resolve(&self, id: &str) -> Result<Location> {
        for source in &self.sources {
            if let Some(resolved) = source.resolve(id) {
                let location = Location::parse(&resolved?);
                tracing::debug!(id, pattern = source.pattern(), %location, "resolved object id");
                return Ok(location);
            }
        }
        Err(Error::NotFound(format!("no data source matches id '{}'", id)))
    }
}
