//! Natlog Selector
//!
//! A selector binds one series to the reduction and interpolation used to
//! resample it. Selector strings have the form `name`, `name:reduction`,
//! or `name:reduction:interpolation`; omitted strategies fall back to the
//! series defaults.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::datatype::Datatype;
use crate::interpolation::{Interpolation, InterpolationFn};
use crate::reduction::{Reduction, ReductionFn};
use crate::registry::SeriesConfig;
use crate::store::PointGroup;
use crate::value::Value;
use chrono::{DateTime, Utc};
use natlog_common::{NatlogError, Result};

/// Split a selector string into series name and optional strategy names.
pub fn parse_selector_string(selector: &str) -> Result<(String, Option<String>, Option<String>)> {
    let parts: Vec<&str> = selector.split(':').collect();
    match parts.as_slice() {
        [name] => Ok((name.to_string(), None, None)),
        [name, reduction] => Ok((name.to_string(), Some(reduction.to_string()), None)),
        [name, reduction, interpolation] => Ok((
            name.to_string(),
            Some(reduction.to_string()),
            Some(interpolation.to_string()),
        )),
        _ => Err(NatlogError::Selector(format!(
            "{:?} has more than three parts",
            selector
        ))),
    }
}

// =============================================================================
// Selector
// =============================================================================

/// A series resolved together with its resampling strategies.
#[derive(Debug, Clone)]
pub struct Selector {
    series: String,
    datatype: Datatype,
    reduction: Reduction,
    interpolation: Interpolation,
    reduce: ReductionFn,
    interpolate: InterpolationFn,
}

impl Selector {
    /// Resolve strategies against a series config, applying overrides.
    pub fn build(
        config: &SeriesConfig,
        reduction: Option<&str>,
        interpolation: Option<&str>,
    ) -> Result<Self> {
        let datatype = config.parsed_datatype()?;
        let reduction: Reduction = reduction.unwrap_or(&config.reduction).parse()?;
        let interpolation: Interpolation = interpolation.unwrap_or(&config.interpolation).parse()?;

        if datatype.is_blob() && !reduction.supports_blobs() {
            return Err(NatlogError::Selector(format!(
                "reduction {} cannot be applied to blob series {}",
                reduction, config.name
            )));
        }

        Ok(Self {
            series: config.name.clone(),
            datatype,
            reduction,
            interpolation,
            reduce: reduction.function(),
            interpolate: interpolation.function(),
        })
    }

    pub fn series(&self) -> &str {
        &self.series
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Reduce each bin's points, then fill empty bins.
    ///
    /// The result has one entry per bin center.
    pub fn apply_strategies(
        &self,
        centers: &[DateTime<Utc>],
        groups: Vec<PointGroup>,
    ) -> Result<Vec<Option<Value>>> {
        if groups.len() != centers.len() {
            return Err(NatlogError::InvalidQuery(format!(
                "{} point groups for {} bins",
                groups.len(),
                centers.len()
            )));
        }

        let reduced = centers
            .iter()
            .zip(groups)
            .map(|(&center, group)| {
                if group.is_empty() {
                    return Ok(None);
                }
                let (timestamps, values): (Vec<_>, Vec<_>) = group.into_iter().unzip();
                (self.reduce)(&timestamps, &values, center).map(Some)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((self.interpolate)(reduced, &self.datatype, centers))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn config() -> SeriesConfig {
        SeriesConfig::new("foo", "int32", "sum", "none")
    }

    fn s(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_parse_selector_string() {
        assert_eq!(
            parse_selector_string("foo").expect("parse"),
            ("foo".to_string(), None, None)
        );
        assert_eq!(
            parse_selector_string("foo:sum").expect("parse"),
            ("foo".to_string(), s("sum"), None)
        );
        assert_eq!(
            parse_selector_string("foo:sum:previous").expect("parse"),
            ("foo".to_string(), s("sum"), s("previous"))
        );

        let err = parse_selector_string("a:b:c:d").expect_err("too many parts");
        assert!(matches!(err, NatlogError::Selector(_)));
    }

    #[test]
    fn test_build_defaults() {
        let selector = Selector::build(&config(), None, None).expect("build");
        assert_eq!(selector.series(), "foo");
        assert_eq!(selector.reduction(), Reduction::Sum);
        assert_eq!(selector.interpolation(), Interpolation::None);
    }

    #[test]
    fn test_build_overrides() {
        let selector = Selector::build(&config(), Some("closest"), None).expect("build");
        assert_eq!(selector.reduction(), Reduction::Closest);
        assert_eq!(selector.interpolation(), Interpolation::None);

        let selector = Selector::build(&config(), None, Some("previous")).expect("build");
        assert_eq!(selector.reduction(), Reduction::Sum);
        assert_eq!(selector.interpolation(), Interpolation::Previous);

        let selector = Selector::build(&config(), Some("closest"), Some("previous")).expect("build");
        assert_eq!(selector.reduction(), Reduction::Closest);
        assert_eq!(selector.interpolation(), Interpolation::Previous);
    }

    #[test]
    fn test_build_unknown_strategy() {
        let err = Selector::build(&config(), Some("median"), None).expect_err("bad reduction");
        assert!(matches!(&err, NatlogError::Selector(msg) if msg.contains("median")));

        let err = Selector::build(&config(), None, Some("spline")).expect_err("bad interpolation");
        assert!(matches!(&err, NatlogError::Selector(msg) if msg.contains("spline")));
    }

    #[test]
    fn test_build_blob_requires_closest() {
        let blob = SeriesConfig::new("img", "blob:image/png", "closest", "previous");
        assert!(Selector::build(&blob, None, None).is_ok());

        let err = Selector::build(&blob, Some("sum"), None).expect_err("sum over blobs");
        assert!(matches!(err, NatlogError::Selector(_)));
    }

    #[test]
    fn test_apply_strategies() {
        let base = Utc.with_ymd_and_hms(2013, 8, 26, 0, 0, 0).unwrap();
        let centers: Vec<_> = (0..5).map(|i| base + Duration::hours(i)).collect();
        let group = |values: &[i64]| -> PointGroup {
            values.iter().map(|&v| (base, Value::Int(v))).collect()
        };
        let groups = vec![group(&[1]), group(&[1, 2]), group(&[]), group(&[4]), group(&[])];

        let zero = Selector::build(&config(), None, Some("zero")).expect("build");
        let values = zero.apply_strategies(&centers, groups.clone()).expect("apply");
        assert_eq!(
            values,
            [1, 3, 0, 4, 0].iter().map(|&v| Some(Value::Int(v))).collect::<Vec<_>>()
        );

        let previous = Selector::build(&config(), None, Some("previous")).expect("build");
        let values = previous.apply_strategies(&centers, groups.clone()).expect("apply");
        assert_eq!(
            values,
            [1, 3, 3, 4, 4].iter().map(|&v| Some(Value::Int(v))).collect::<Vec<_>>()
        );

        let none = Selector::build(&config(), None, None).expect("build");
        let values = none.apply_strategies(&centers, groups).expect("apply");
        assert_eq!(values.len(), centers.len());
        assert_eq!(values[2], None);
    }
}
