//! Template parsing
//!
//! Turns a pattern such as
//! `{model!L}_{scope}_{timestamp:%Y%m%d}{modelrun:>02d}_{step:>03d}_{param!U}.grib2.bz2`
//! into a flat list of literal and placeholder segments. Every placeholder name,
//! conversion and format spec is checked here so that rendering cannot fail.

use crate::errors::{TemplateError, TemplateResult};

/// One piece of a compiled template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim
    Literal(String),
    /// Value substituted from the bindings
    Field(Placeholder),
}

/// A validated `{name!conversion:format}` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub field: Field,
    pub case: Option<Case>,
    pub format: Format,
}

/// The fixed placeholder vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Model,
    Param,
    Grid,
    Scope,
    LevelType,
    ModelRun,
    Timestamp,
    Step,
    Level,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        let field = match name {
            "model" => Field::Model,
            "param" => Field::Param,
            "grid" => Field::Grid,
            "scope" => Field::Scope,
            "levtype" => Field::LevelType,
            "modelrun" => Field::ModelRun,
            "timestamp" => Field::Timestamp,
            "step" => Field::Step,
            "level" => Field::Level,
            _ => return None,
        };
        Some(field)
    }

    /// Name as written in templates
    pub fn name(self) -> &'static str {
        match self {
            Field::Model => "model",
            Field::Param => "param",
            Field::Grid => "grid",
            Field::Scope => "scope",
            Field::LevelType => "levtype",
            Field::ModelRun => "modelrun",
            Field::Timestamp => "timestamp",
            Field::Step => "step",
            Field::Level => "level",
        }
    }

    fn is_text(self) -> bool {
        matches!(
            self,
            Field::Model | Field::Param | Field::Grid | Field::Scope | Field::LevelType
        )
    }

    fn is_integer(self) -> bool {
        matches!(self, Field::ModelRun | Field::Step | Field::Level)
    }
}

/// Case conversion applied to text fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Lower,
    Upper,
}

/// Format applied to the field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    /// No format spec given; field defaults apply
    Default,
    /// `:d`, `:0Nd` or `:>0Nd`
    Integer { width: Option<usize> },
    /// `:%Y%m%d` style date format
    Date(Vec<DatePart>),
}

/// Supported strftime directives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatePart {
    Year,
    ShortYear,
    Month,
    Day,
    Hour,
    DayOfYear,
    Literal(String),
}

/// Parse a pattern into segments
pub fn parse(pattern: &str) -> TemplateResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    literal.push('{');
                    continue;
                }

                let mut body = String::new();
                let mut closed = false;
                for (inner_pos, inner) in chars.by_ref() {
                    match inner {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => {
                            return Err(TemplateError::Malformed {
                                position: inner_pos,
                                reason: "nested '{' inside placeholder".to_string(),
                            })
                        }
                        other => body.push(other),
                    }
                }
                if !closed {
                    return Err(TemplateError::Malformed {
                        position: pos,
                        reason: "unterminated placeholder".to_string(),
                    });
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(parse_placeholder(&body, pos)?));
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    literal.push('}');
                } else {
                    return Err(TemplateError::Malformed {
                        position: pos,
                        reason: "single '}' outside placeholder".to_string(),
                    });
                }
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_placeholder(body: &str, position: usize) -> TemplateResult<Placeholder> {
    let (head, spec) = match body.split_once(':') {
        Some((head, spec)) => (head, Some(spec)),
        None => (body, None),
    };
    let (name, conversion) = match head.split_once('!') {
        Some((name, conversion)) => (name, Some(conversion)),
        None => (head, None),
    };

    if name.is_empty() {
        return Err(TemplateError::Malformed {
            position,
            reason: "empty placeholder name".to_string(),
        });
    }

    let field = Field::from_name(name).ok_or_else(|| TemplateError::UnknownPlaceholder {
        name: name.to_string(),
    })?;

    let unsupported = |modifier: String| TemplateError::UnsupportedModifier {
        placeholder: name.to_string(),
        modifier,
    };

    let case = match conversion {
        None => None,
        Some(conv) if !field.is_text() => return Err(unsupported(format!("!{}", conv))),
        Some("L") | Some("l") => Some(Case::Lower),
        Some("U") | Some("u") => Some(Case::Upper),
        Some(conv) => return Err(unsupported(format!("!{}", conv))),
    };

    let format = match spec {
        None => Format::Default,
        Some(spec) if field == Field::Timestamp => Format::Date(
            parse_date_format(spec).ok_or_else(|| unsupported(format!(":{}", spec)))?,
        ),
        Some(spec) if field.is_integer() => Format::Integer {
            width: parse_integer_format(spec).ok_or_else(|| unsupported(format!(":{}", spec)))?,
        },
        Some(spec) => return Err(unsupported(format!(":{}", spec))),
    };

    Ok(Placeholder {
        field,
        case,
        format,
    })
}

/// Accepts `d`, `>d`, `0Nd` and `>0Nd`; returns the zero-pad width
fn parse_integer_format(spec: &str) -> Option<Option<usize>> {
    let spec = spec.strip_prefix('>').unwrap_or(spec);
    let digits = spec.strip_suffix('d')?;
    if digits.is_empty() {
        return Some(None);
    }
    // Only zero fill is supported, so a width must start with '0'
    let width = digits.strip_prefix('0')?;
    if width.is_empty() {
        return Some(None);
    }
    if !width.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    width.parse().ok().map(Some)
}

fn parse_date_format(spec: &str) -> Option<Vec<DatePart>> {
    if spec.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = spec.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        let part = match chars.next()? {
            'Y' => DatePart::Year,
            'y' => DatePart::ShortYear,
            'm' => DatePart::Month,
            'd' => DatePart::Day,
            'H' => DatePart::Hour,
            'j' => DatePart::DayOfYear,
            '%' => {
                literal.push('%');
                continue;
            }
            _ => return None,
        };
        if !literal.is_empty() {
            parts.push(DatePart::Literal(std::mem::take(&mut literal)));
        }
        parts.push(part);
    }

    if !literal.is_empty() {
        parts.push(DatePart::Literal(literal));
    }
    Some(parts)
}
