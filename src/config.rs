use anyhow::Result;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::EtlError;

pub const DEFAULT_DATA_DIR: &str = "data/raw";
pub const DEFAULT_OUTPUT_DIR: &str = "public/data";

/// Settings shared by every transformation unit of a batch.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Value written to `metadata.lastUpdated`, `YYYY-MM-DD`.
    pub as_of: String,
    /// Treat every missing input as a failure, even optional ones.
    pub strict: bool,
}

impl EtlConfig {
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
            as_of: today(),
            strict: false,
        }
    }

    /// Freezes `metadata.lastUpdated`; rejects anything that is not a calendar date.
    pub fn with_as_of(mut self, date: &str) -> Result<Self> {
        let format = format_description!("[year]-[month]-[day]");
        Date::parse(date, &format).map_err(|_| EtlError::InvalidDate(date.to_string()))?;
        self.as_of = date.to_string();
        Ok(self)
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn output_path(&self, topic: Topic, file_name: &str) -> PathBuf {
        self.output_dir.join(topic.dir_name()).join(file_name)
    }
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR, DEFAULT_OUTPUT_DIR)
    }
}

fn today() -> String {
    let format = format_description!("[year]-[month]-[day]");
    OffsetDateTime::now_utc()
        .date()
        .format(&format)
        .unwrap_or_else(|_| "1970-01-01".to_string())
}

/// Dashboard section a document belongs to; each maps to one output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Spatial,
    Sector,
    Economic,
    Regulatory,
}

impl Topic {
    pub fn dir_name(self) -> &'static str {
        match self {
            Topic::Spatial => "datos-espaciales",
            Topic::Sector => "datos-sectoriales",
            Topic::Economic => "datos-economicos",
            Topic::Regulatory => "datos-normativos",
        }
    }
}

/// One source file a unit reads: glob candidates tried in order.
#[derive(Debug, Clone, Copy)]
pub struct InputSpec {
    pub candidates: &'static [&'static str],
    pub required: bool,
}

impl InputSpec {
    pub const fn required(candidates: &'static [&'static str]) -> Self {
        Self {
            candidates,
            required: true,
        }
    }

    pub const fn optional(candidates: &'static [&'static str]) -> Self {
        Self {
            candidates,
            required: false,
        }
    }

    pub fn locate(&self, data_dir: &Path) -> Option<PathBuf> {
        crate::source::locate_input(data_dir, self.candidates)
    }
}
