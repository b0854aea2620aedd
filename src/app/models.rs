//! Data models for DWD Fetcher
//!
//! This module defines the core data structures used throughout the application:
//! the per-model catalog entry, the user request, the individual download job and
//! the flags that control how a job is executed.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::app::template::{Template, TemplateBindings};
use crate::errors::{TemplateError, TemplateResult};

/// Vertical level category of a field
///
/// The string form matches the level-type segment used in published file names
/// (e.g. `icon-d2_germany_regular-lat-lon_single-level_...`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LevelType {
    /// Surface and 2d fields, no vertical dimension
    #[default]
    SingleLevel,
    /// Native model levels, numbered
    ModelLevel,
    /// Pressure levels in hPa
    PressureLevel,
    /// Constant fields such as orography
    TimeInvariant,
}

impl LevelType {
    /// Zero-pad width used for a bare `{level}` placeholder
    ///
    /// Pressure levels are rendered as-is (`850`, `1000`).
    pub fn default_level_width(self) -> Option<usize> {
        match self {
            LevelType::SingleLevel | LevelType::ModelLevel | LevelType::TimeInvariant => Some(2),
            LevelType::PressureLevel => None,
        }
    }

    /// Whether jobs of this type iterate over a level selection
    pub fn has_levels(self) -> bool {
        matches!(self, LevelType::ModelLevel | LevelType::PressureLevel)
    }

    /// Whether jobs of this type iterate over forecast steps
    ///
    /// Time-invariant fields are published once per run.
    pub fn has_steps(self) -> bool {
        !matches!(self, LevelType::TimeInvariant)
    }
}

/// Catalog entry describing how one model publishes its files
///
/// Loaded once by the catalog and shared read-only between all jobs.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    /// Model identifier as used on the server (e.g. `icon-d2`)
    pub id: String,
    /// Compiled URL pattern per level type
    pub url_patterns: HashMap<LevelType, Template>,
    /// Supported grids, the first one is the default
    pub grids: Vec<String>,
    /// Scope tag used in file names (e.g. `germany`, `global`)
    pub scope: String,
    /// Minutes between the nominal run time and availability on the server
    pub publication_delay_minutes: u32,
    /// Hours between consecutive model runs
    pub run_interval_hours: u32,
    /// Lowest native model level
    pub min_level: u32,
    /// Highest native model level
    pub max_level: u32,
    /// Local sub-directory pattern used unless the layout is flattened
    pub dest_pattern: Template,
    /// Free-form description for listings
    pub description: Option<String>,
}

impl ModelSpec {
    /// Grid used when the request does not name one
    pub fn default_grid(&self) -> Option<&str> {
        self.grids.first().map(String::as_str)
    }

    /// Check whether a grid is offered by this model
    pub fn supports_grid(&self, grid: &str) -> bool {
        self.grids.iter().any(|g| g == grid)
    }

    /// URL pattern for a level type, if the model publishes it
    pub fn url_pattern(&self, level_type: LevelType) -> Option<&Template> {
        self.url_patterns.get(&level_type)
    }

    /// Level types with a URL pattern, in declaration order
    pub fn level_types(&self) -> Vec<LevelType> {
        use strum::IntoEnumIterator;
        LevelType::iter()
            .filter(|lt| self.url_patterns.contains_key(lt))
            .collect()
    }
}

/// Which vertical levels a request covers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LevelSelection {
    /// Use the model defaults (only meaningful for model-level fields)
    #[default]
    Default,
    /// Inclusive numeric range; a missing bound takes the model's own bound
    Range { min: Option<u32>, max: Option<u32> },
    /// Explicit list, e.g. pressure levels in hPa
    List(Vec<u32>),
}

impl LevelSelection {
    /// Inclusive range with both bounds given
    pub fn range(min: u32, max: u32) -> Self {
        LevelSelection::Range {
            min: Some(min),
            max: Some(max),
        }
    }
}

/// Flags controlling how a fetch worker executes a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Keep the payload compressed as published
    pub compressed_output: bool,
    /// Skip jobs whose destination file already exists
    pub skip_existing: bool,
    /// Resolve URLs and paths without touching network or disk
    pub dry_run: bool,
}

impl FetchOptions {
    /// Keep payloads compressed
    pub fn with_compressed_output(mut self, compressed: bool) -> Self {
        self.compressed_output = compressed;
        self
    }

    /// Skip existing destination files
    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Enable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// A user request for one level-type category of one model
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub model: String,
    /// Grid to fetch, `None` selects the model default
    pub grid: Option<String>,
    /// Field short names in the order they should be fetched
    pub fields: Vec<String>,
    pub level_type: LevelType,
    /// First forecast step (hours), inclusive
    pub min_step: u32,
    /// Last forecast step (hours), inclusive; `None` is an empty range
    pub max_step: Option<u32>,
    pub levels: LevelSelection,
    /// Root directory for downloaded files
    pub dest_root: PathBuf,
    /// Write every file directly into `dest_root`
    pub flatten: bool,
    /// Explicit `YYYYMMDDHH` run, otherwise the latest available one
    pub run: Option<String>,
    pub options: FetchOptions,
}

impl DownloadRequest {
    /// Create a request for the given model, level type and fields
    pub fn new(model: impl Into<String>, level_type: LevelType, fields: Vec<String>) -> Self {
        Self {
            model: model.into(),
            grid: None,
            fields,
            level_type,
            min_step: 0,
            max_step: None,
            levels: LevelSelection::Default,
            dest_root: PathBuf::from("."),
            flatten: false,
            run: None,
            options: FetchOptions::default(),
        }
    }

    /// Select a grid
    pub fn with_grid(mut self, grid: impl Into<String>) -> Self {
        self.grid = Some(grid.into());
        self
    }

    /// Set the inclusive forecast step range
    pub fn with_steps(mut self, min: u32, max: u32) -> Self {
        self.min_step = min;
        self.max_step = Some(max);
        self
    }

    /// Set the level selection
    pub fn with_levels(mut self, levels: LevelSelection) -> Self {
        self.levels = levels;
        self
    }

    /// Set the destination root
    pub fn with_dest_root(mut self, dest_root: impl Into<PathBuf>) -> Self {
        self.dest_root = dest_root.into();
        self
    }

    /// Flatten the output layout
    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Use an explicit `YYYYMMDDHH` run
    pub fn with_run(mut self, run: impl Into<String>) -> Self {
        self.run = Some(run.into());
        self
    }

    /// Set the fetch flags
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }
}

/// One file to fetch
///
/// Everything needed to compute the remote URL and the local path is held by
/// value, apart from the shared model spec.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub model: Arc<ModelSpec>,
    pub grid: String,
    pub field: String,
    pub level_type: LevelType,
    /// Forecast step in hours
    pub step: u32,
    /// Model level number or pressure value; 0 for level-less types
    pub level: u32,
    /// Resolved model run
    pub run: DateTime<Utc>,
    /// Directory the file is written to
    pub dest_dir: PathBuf,
    /// File name overriding the last URL segment
    pub file_name: Option<String>,
}

impl DownloadJob {
    /// Template bindings for this job
    pub fn bindings(&self) -> TemplateBindings<'_> {
        TemplateBindings {
            model: &self.model.id,
            param: &self.field,
            grid: &self.grid,
            scope: &self.model.scope,
            level_type: self.level_type,
            run: self.run,
            step: self.step,
            level: self.level,
        }
    }

    /// Render the remote URL
    pub fn url(&self) -> TemplateResult<String> {
        let pattern = self.model.url_pattern(self.level_type).ok_or_else(|| {
            TemplateError::MissingPattern {
                model: self.model.id.clone(),
                level_type: self.level_type.to_string(),
            }
        })?;
        Ok(pattern.render(&self.bindings()))
    }
}

impl fmt::Display for DownloadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} step {:03}",
            self.model.id, self.level_type, self.field, self.step
        )?;
        if self.level_type.has_levels() {
            write!(f, " level {}", self.level)?;
        }
        Ok(())
    }
}
