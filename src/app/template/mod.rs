//! URL and path templates
//!
//! A closed-set renderer for the patterns stored in the model catalog. Patterns
//! are compiled once with [`Template::parse`]; rendering a compiled template is
//! total and deterministic.
//!
//! # Examples
//!
//! ```rust
//! use dwd_fetcher::app::template::{render, TemplateBindings};
//!
//! let bindings = TemplateBindings {
//!     model: "ICON",
//!     step: 5,
//!     ..Default::default()
//! };
//! assert_eq!(render("{model!L}_{step:>03d}", &bindings).unwrap(), "icon_005");
//! ```

mod parser;

use std::fmt::{self, Write};

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::LevelType;
use crate::errors::{TemplateError, TemplateResult};

use parser::{Case, DatePart, Field, Format, Segment};

/// Width of a bare `{step}`
const STEP_WIDTH: usize = 3;
/// Width of a bare `{modelrun}`
const MODEL_RUN_WIDTH: usize = 2;

/// Values substituted into a template
#[derive(Debug, Clone, Default)]
pub struct TemplateBindings<'a> {
    pub model: &'a str,
    pub param: &'a str,
    pub grid: &'a str,
    pub scope: &'a str,
    pub level_type: LevelType,
    pub run: DateTime<Utc>,
    pub step: u32,
    pub level: u32,
}

/// A compiled pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse and validate a pattern
    pub fn parse(pattern: &str) -> TemplateResult<Self> {
        Ok(Self {
            source: pattern.to_string(),
            segments: parser::parse(pattern)?,
        })
    }

    /// The pattern this template was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the placeholders used, in order of appearance
    pub fn placeholders(&self) -> Vec<&'static str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Field(placeholder) => Some(placeholder.field.name()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute the bindings into the pattern
    pub fn render(&self, bindings: &TemplateBindings<'_>) -> String {
        let mut out = String::with_capacity(self.source.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(placeholder) => render_field(
                    &mut out,
                    placeholder.field,
                    placeholder.case,
                    &placeholder.format,
                    bindings,
                ),
            }
        }
        out
    }
}

impl TryFrom<String> for Template {
    type Error = TemplateError;

    fn try_from(pattern: String) -> TemplateResult<Self> {
        Template::parse(&pattern)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> Self {
        template.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse `pattern` and render it in one go
pub fn render(pattern: &str, bindings: &TemplateBindings<'_>) -> TemplateResult<String> {
    Ok(Template::parse(pattern)?.render(bindings))
}

fn render_field(
    out: &mut String,
    field: Field,
    case: Option<Case>,
    format: &Format,
    bindings: &TemplateBindings<'_>,
) {
    let text = match field {
        Field::Model => bindings.model,
        Field::Param => bindings.param,
        Field::Grid => bindings.grid,
        Field::Scope => bindings.scope,
        Field::LevelType => bindings.level_type.as_ref(),
        Field::ModelRun => {
            let width = integer_width(format, Some(MODEL_RUN_WIDTH));
            return push_padded(out, bindings.run.hour(), width);
        }
        Field::Step => {
            let width = integer_width(format, Some(STEP_WIDTH));
            return push_padded(out, bindings.step, width);
        }
        Field::Level => {
            let width = integer_width(format, bindings.level_type.default_level_width());
            return push_padded(out, bindings.level, width);
        }
        Field::Timestamp => return push_date(out, bindings.run, format),
    };

    match case {
        Some(Case::Lower) => out.push_str(&text.to_lowercase()),
        Some(Case::Upper) => out.push_str(&text.to_uppercase()),
        None => out.push_str(text),
    }
}

fn integer_width(format: &Format, default: Option<usize>) -> Option<usize> {
    match format {
        Format::Integer { width } => *width,
        _ => default,
    }
}

fn push_padded(out: &mut String, value: u32, width: Option<usize>) {
    // Writing to a String cannot fail
    let _ = match width {
        Some(width) => write!(out, "{:0width$}", value, width = width),
        None => write!(out, "{}", value),
    };
}

fn push_date(out: &mut String, run: DateTime<Utc>, format: &Format) {
    let Format::Date(parts) = format else {
        let _ = write!(
            out,
            "{:04}{:02}{:02}{:02}",
            run.year(),
            run.month(),
            run.day(),
            run.hour()
        );
        return;
    };

    for part in parts {
        let _ = match part {
            DatePart::Year => write!(out, "{:04}", run.year()),
            DatePart::ShortYear => write!(out, "{:02}", run.year().rem_euclid(100)),
            DatePart::Month => write!(out, "{:02}", run.month()),
            DatePart::Day => write!(out, "{:02}", run.day()),
            DatePart::Hour => write!(out, "{:02}", run.hour()),
            DatePart::DayOfYear => write!(out, "{:03}", run.ordinal()),
            DatePart::Literal(text) => out.write_str(text),
        };
    }
}
