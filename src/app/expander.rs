//! Job expansion
//!
//! Turns one [`DownloadRequest`] into the full list of [`DownloadJob`]s: the
//! cartesian product of fields, forecast steps and vertical levels for a single
//! level-type category. All request validation happens here, so an invalid
//! request fails before anything is downloaded.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::app::models::{DownloadJob, DownloadRequest, LevelSelection, LevelType, ModelSpec};
use crate::app::template::TemplateBindings;
use crate::errors::{RequestError, RequestResult};

/// Expand a request into jobs for the resolved run
///
/// Jobs are ordered field-major, then by step, then by level, preserving the
/// caller's field order. Time-invariant fields yield one job per field at
/// `min_step`, and repeated levels are fetched once, so no two jobs share a
/// destination.
pub fn expand(
    request: &DownloadRequest,
    spec: &Arc<ModelSpec>,
    run: DateTime<Utc>,
) -> RequestResult<Vec<DownloadJob>> {
    if request.fields.is_empty() {
        return Err(RequestError::NoFields {
            level_type: request.level_type.to_string(),
        });
    }

    if spec.url_pattern(request.level_type).is_none() {
        return Err(RequestError::UnsupportedLevelType {
            model: spec.id.clone(),
            level_type: request.level_type.to_string(),
        });
    }

    let grid = select_grid(request, spec)?;
    let steps = step_range(request)?;
    let levels = level_list(request, spec)?;

    let mut jobs = Vec::with_capacity(request.fields.len() * steps.len() * levels.len());
    for field in &request.fields {
        for &step in &steps {
            for &level in &levels {
                let mut job = DownloadJob {
                    model: Arc::clone(spec),
                    grid: grid.clone(),
                    field: field.clone(),
                    level_type: request.level_type,
                    step,
                    level,
                    run,
                    dest_dir: PathBuf::new(),
                    file_name: None,
                };
                job.dest_dir = destination_dir(request, &job);
                jobs.push(job);
            }
        }
    }

    debug!(
        "Expanded {} {} request into {} jobs ({} fields x {} steps x {} levels)",
        spec.id,
        request.level_type,
        jobs.len(),
        request.fields.len(),
        steps.len(),
        levels.len()
    );

    Ok(jobs)
}

fn select_grid(request: &DownloadRequest, spec: &ModelSpec) -> RequestResult<String> {
    match request.grid.as_deref() {
        Some(grid) if spec.supports_grid(grid) => Ok(grid.to_string()),
        Some(grid) => Err(RequestError::UnsupportedGrid {
            model: spec.id.clone(),
            grid: grid.to_string(),
            supported: spec.grids.clone(),
        }),
        None => spec
            .default_grid()
            .map(str::to_string)
            .ok_or_else(|| RequestError::UnsupportedGrid {
                model: spec.id.clone(),
                grid: String::new(),
                supported: Vec::new(),
            }),
    }
}

fn step_range(request: &DownloadRequest) -> RequestResult<Vec<u32>> {
    if !request.level_type.has_steps() {
        return Ok(vec![request.min_step]);
    }

    match request.max_step {
        Some(max) if max >= request.min_step => Ok((request.min_step..=max).collect()),
        Some(max) => Err(RequestError::EmptyStepRange {
            min: request.min_step,
            max: max.to_string(),
        }),
        None => Err(RequestError::EmptyStepRange {
            min: request.min_step,
            max: "none".to_string(),
        }),
    }
}

fn level_list(request: &DownloadRequest, spec: &ModelSpec) -> RequestResult<Vec<u32>> {
    let empty = || RequestError::EmptyLevelRange {
        level_type: request.level_type.to_string(),
    };

    let mut levels: Vec<u32> = match (request.level_type, &request.levels) {
        (LevelType::SingleLevel | LevelType::TimeInvariant, _) => vec![0],

        // Both bounds zero means "not given"
        (LevelType::ModelLevel, LevelSelection::Default)
        | (
            LevelType::ModelLevel,
            LevelSelection::Range {
                min: Some(0),
                max: Some(0),
            },
        ) => (spec.min_level..=spec.max_level).collect(),
        (LevelType::ModelLevel, LevelSelection::Range { min, max }) => {
            (min.unwrap_or(spec.min_level)..=max.unwrap_or(spec.max_level)).collect()
        }
        (_, LevelSelection::Range { min, max }) => match (min, max) {
            (Some(min), Some(max)) => (*min..=*max).collect(),
            _ => Vec::new(),
        },
        (_, LevelSelection::List(levels)) => levels.clone(),

        // Pressure levels have no default set
        (LevelType::PressureLevel, LevelSelection::Default) => Vec::new(),
    };

    let mut seen = HashSet::with_capacity(levels.len());
    levels.retain(|level| seen.insert(*level));

    if levels.is_empty() {
        return Err(empty());
    }
    Ok(levels)
}

fn destination_dir(request: &DownloadRequest, job: &DownloadJob) -> PathBuf {
    if request.flatten {
        return request.dest_root.clone();
    }

    let bindings: TemplateBindings<'_> = job.bindings();
    let relative = job.model.dest_pattern.render(&bindings);
    request.dest_root.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::catalog::ModelCatalog;
    use crate::app::models::tests::sample_spec;
    use chrono::TimeZone;
    use std::path::Path;

    fn run() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 12, 3, 12, 0, 0).unwrap()
    }

    fn spec() -> Arc<ModelSpec> {
        Arc::new(sample_spec())
    }

    /// Test cartesian product expansion
    ///
    /// Verifies 2 fields x 2 steps x 3 levels yields 12 jobs in caller order
    #[test]
    fn test_expand_model_level_product() {
        let request = DownloadRequest::new(
            "icon-d2",
            LevelType::ModelLevel,
            vec!["u".to_string(), "t".to_string()],
        )
        .with_steps(0, 1)
        .with_levels(LevelSelection::range(1, 3));

        let jobs = expand(&request, &spec(), run()).unwrap();
        assert_eq!(jobs.len(), 12);
        assert!(jobs[..6].iter().all(|j| j.field == "u"));
        assert!(jobs[6..].iter().all(|j| j.field == "t"));
        assert_eq!(
            jobs[..3].iter().map(|j| j.level).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(jobs[3].step, 1);
        assert!(jobs.iter().all(|j| j.grid == "regular-lat-lon"));
    }

    #[test]
    fn test_expand_model_level_from_zero() {
        let request = DownloadRequest::new(
            "icon-d2",
            LevelType::ModelLevel,
            vec!["u".to_string(), "v".to_string()],
        )
        .with_steps(0, 1)
        .with_levels(LevelSelection::range(0, 2));

        let jobs = expand(&request, &spec(), run()).unwrap();
        assert_eq!(jobs.len(), 12);

        let triples: HashSet<_> = jobs
            .iter()
            .map(|j| (j.field.clone(), j.step, j.level))
            .collect();
        assert_eq!(triples.len(), 12);
        assert_eq!(
            jobs[..3].iter().map(|j| j.level).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    /// Test partial model level bounds
    ///
    /// Verifies a missing bound falls back to the model's own bound instead
    /// of producing an empty range
    #[test]
    fn test_model_level_missing_bound_uses_model_bound() {
        let base = DownloadRequest::new("icon-d2", LevelType::ModelLevel, vec!["u".into()])
            .with_steps(0, 0);

        let upper = base.clone().with_levels(LevelSelection::Range {
            min: Some(60),
            max: None,
        });
        let jobs = expand(&upper, &spec(), run()).unwrap();
        assert_eq!(
            jobs.iter().map(|j| j.level).collect::<Vec<_>>(),
            vec![60, 61, 62, 63, 64, 65]
        );

        let lower = base.with_levels(LevelSelection::Range {
            min: None,
            max: Some(3),
        });
        let jobs = expand(&lower, &spec(), run()).unwrap();
        assert_eq!(
            jobs.iter().map(|j| j.level).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    /// Test time-invariant expansion
    ///
    /// Verifies constant fields of the built-in catalog are fetched once per
    /// field whatever the step range, so no two jobs share a URL or path
    #[test]
    fn test_time_invariant_fetched_once() {
        let catalog = ModelCatalog::builtin().unwrap();
        let icon = catalog.require("icon").unwrap();
        let request = DownloadRequest::new(
            "icon",
            LevelType::TimeInvariant,
            vec!["hsurf".into(), "fr_land".into()],
        )
        .with_steps(0, 12);

        let jobs = expand(&request, &icon, run()).unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.step == 0));

        let urls: HashSet<_> = jobs.iter().map(|j| j.url().unwrap()).collect();
        assert_eq!(urls.len(), 2);

        // The step range is irrelevant, even when missing
        let no_steps =
            DownloadRequest::new("icon", LevelType::TimeInvariant, vec!["hsurf".into()]);
        assert_eq!(expand(&no_steps, &icon, run()).unwrap().len(), 1);
    }

    #[test]
    fn test_repeated_pressure_levels_fetched_once() {
        let request = DownloadRequest::new("icon-d2", LevelType::PressureLevel, vec!["t".into()])
            .with_steps(0, 0)
            .with_levels(LevelSelection::List(vec![850, 500, 850]));

        let jobs = expand(&request, &spec(), run()).unwrap();
        assert_eq!(jobs.iter().map(|j| j.level).collect::<Vec<_>>(), vec![850, 500]);
    }

    #[test]
    fn test_single_level_ignores_levels() {
        let request = DownloadRequest::new("icon-d2", LevelType::SingleLevel, vec!["t_2m".into()])
            .with_steps(0, 2)
            .with_levels(LevelSelection::range(5, 9));

        let jobs = expand(&request, &spec(), run()).unwrap();
        assert_eq!(jobs.len(), 3);
        assert!(jobs.iter().all(|j| j.level == 0));
    }

    #[test]
    fn test_model_level_defaults_when_bounds_zero() {
        let request = DownloadRequest::new("icon-d2", LevelType::ModelLevel, vec!["u".into()])
            .with_steps(0, 0)
            .with_levels(LevelSelection::range(0, 0));

        let jobs = expand(&request, &spec(), run()).unwrap();
        assert_eq!(jobs.len(), 65);
        assert_eq!(jobs.first().unwrap().level, 1);
        assert_eq!(jobs.last().unwrap().level, 65);
    }

    #[test]
    fn test_pressure_levels_need_list() {
        let request = DownloadRequest::new("icon-d2", LevelType::PressureLevel, vec!["t".into()])
            .with_steps(0, 0);
        assert!(matches!(
            expand(&request, &spec(), run()),
            Err(RequestError::EmptyLevelRange { .. })
        ));

        let request = request.with_levels(LevelSelection::List(vec![850, 500]));
        let jobs = expand(&request, &spec(), run()).unwrap();
        assert_eq!(jobs.iter().map(|j| j.level).collect::<Vec<_>>(), vec![850, 500]);
        assert!(jobs[0].url().unwrap().ends_with("_000_850_t.grib2.bz2"));
    }

    /// Test empty ranges
    ///
    /// Verifies inverted or missing ranges are rejected before any job exists
    #[test]
    fn test_empty_ranges() {
        let base = DownloadRequest::new("icon-d2", LevelType::ModelLevel, vec!["u".into()]);

        let inverted_steps = base.clone().with_steps(5, 2);
        assert!(matches!(
            expand(&inverted_steps, &spec(), run()),
            Err(RequestError::EmptyStepRange { min: 5, .. })
        ));

        assert!(matches!(
            expand(&base, &spec(), run()),
            Err(RequestError::EmptyStepRange { .. })
        ));

        let inverted_levels = base
            .with_steps(0, 0)
            .with_levels(LevelSelection::range(10, 2));
        assert!(matches!(
            expand(&inverted_levels, &spec(), run()),
            Err(RequestError::EmptyLevelRange { .. })
        ));
    }

    #[test]
    fn test_request_validation() {
        let no_fields = DownloadRequest::new("icon-d2", LevelType::SingleLevel, Vec::new())
            .with_steps(0, 0);
        assert!(matches!(
            expand(&no_fields, &spec(), run()),
            Err(RequestError::NoFields { .. })
        ));

        let bad_grid = DownloadRequest::new("icon-d2", LevelType::SingleLevel, vec!["t".into()])
            .with_steps(0, 0)
            .with_grid("rotated-pole");
        assert!(matches!(
            expand(&bad_grid, &spec(), run()),
            Err(RequestError::UnsupportedGrid { .. })
        ));

        let no_pattern = DownloadRequest::new("icon-d2", LevelType::TimeInvariant, vec!["hsurf".into()])
            .with_steps(0, 0);
        assert!(matches!(
            expand(&no_pattern, &spec(), run()),
            Err(RequestError::UnsupportedLevelType { .. })
        ));
    }

    #[test]
    fn test_destination_layout() {
        let request = DownloadRequest::new("ICON-D2", LevelType::SingleLevel, vec!["T_2M".into()])
            .with_steps(0, 0)
            .with_dest_root("/data");

        let jobs = expand(&request, &spec(), run()).unwrap();
        assert_eq!(jobs[0].dest_dir, Path::new("/data/icon-d2/12/t_2m"));

        let flat = request.with_flatten(true);
        let jobs = expand(&flat, &spec(), run()).unwrap();
        assert_eq!(jobs[0].dest_dir, Path::new("/data"));
    }
}
