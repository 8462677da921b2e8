//! Natlog Query Engine
//!
//! Resampled queries over a closed time window. The window `[first, last]`
//! is divided into `npoints` equal-width bins whose first and last centers
//! fall exactly on `first` and `last`; each bin extends half a bin width
//! either side of its center. Every selector is binned against the same
//! bounds, reduced per bin, and gap filled.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::registry::SeriesRegistry;
use crate::selector::{parse_selector_string, Selector};
use crate::store::PointStore;
use crate::value::Value;
use chrono::{DateTime, Duration, Utc};
use natlog_common::{NatlogError, Result};
use std::sync::Arc;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

// =============================================================================
// Bins
// =============================================================================

/// Half-open bin bounds and centers of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bins {
    pub lowers: Vec<DateTime<Utc>>,
    pub uppers: Vec<DateTime<Utc>>,
    pub centers: Vec<DateTime<Utc>>,
}

impl Bins {
    /// Divide `[first, last]` into `npoints` bins.
    pub fn compute(first: DateTime<Utc>, last: DateTime<Utc>, npoints: usize) -> Result<Self> {
        if npoints < 2 {
            return Err(NatlogError::InvalidQuery(format!(
                "npoints must be at least 2, got {}",
                npoints
            )));
        }
        if last < first {
            return Err(NatlogError::InvalidQuery(format!(
                "window ends at {} before it starts at {}",
                last, first
            )));
        }

        let span = total_nanos(last - first);
        let steps = 2 * (npoints as i128 - 1);
        // Boundary/center k half-widths from `first`.
        let at = |k: i128| {
            span.checked_mul(k)
                .map(|n| n.div_euclid(steps))
                .and_then(from_nanos)
                .and_then(|offset| first.checked_add_signed(offset))
                .ok_or_else(|| {
                    NatlogError::InvalidQuery(format!(
                        "bins of {} .. {} fall outside the representable time range",
                        first, last
                    ))
                })
        };

        let boundaries = (0..=npoints as i128)
            .map(|i| at(2 * i - 1))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            lowers: boundaries[..npoints].to_vec(),
            uppers: boundaries[1..].to_vec(),
            centers: (0..npoints as i128)
                .map(|i| at(2 * i))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// The single bin of `width` that starts where these bins end, centered
    /// one `width` after their last center.
    pub fn following(&self, width: Duration) -> Result<Self> {
        let (Some(&lower), Some(&center)) = (self.uppers.last(), self.centers.last()) else {
            return Err(NatlogError::InvalidQuery("no bin to follow".to_string()));
        };
        let (Some(upper), Some(center)) = (
            lower.checked_add_signed(width),
            center.checked_add_signed(width),
        ) else {
            return Err(NatlogError::InvalidQuery(format!(
                "bin after {} falls outside the representable time range",
                center
            )));
        };
        Ok(Self {
            lowers: vec![lower],
            uppers: vec![upper],
            centers: vec![center],
        })
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

fn total_nanos(duration: Duration) -> i128 {
    duration.num_seconds() as i128 * NANOS_PER_SECOND + duration.subsec_nanos() as i128
}

fn from_nanos(nanos: i128) -> Option<Duration> {
    let seconds = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND)).ok()?;
    let rest = nanos.rem_euclid(NANOS_PER_SECOND) as i64;
    Duration::try_seconds(seconds)?.checked_add(&Duration::nanoseconds(rest))
}

// =============================================================================
// Query Result
// =============================================================================

/// Bin centers and one resampled column per selector, in selector order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub centers: Vec<DateTime<Utc>>,
    pub columns: Vec<Vec<Option<Value>>>,
}

// =============================================================================
// Query Engine
// =============================================================================

/// Stateless resampling over the point store.
#[derive(Clone)]
pub struct QueryEngine {
    pub(crate) store: Arc<PointStore>,
    pub(crate) registry: Arc<SeriesRegistry>,
    pub(crate) max_points: usize,
}

impl QueryEngine {
    pub fn new(store: Arc<PointStore>, registry: Arc<SeriesRegistry>, max_points: usize) -> Self {
        Self {
            store,
            registry,
            max_points,
        }
    }

    /// Parse selector strings and resolve them against the registry.
    pub fn resolve<S: AsRef<str>>(&self, selectors: &[S]) -> Result<Vec<Selector>> {
        selectors
            .iter()
            .map(|s| {
                let (name, reduction, interpolation) = parse_selector_string(s.as_ref())?;
                let config = self.registry.get(&name).ok_or_else(|| {
                    NatlogError::Selector(format!("series {} does not exist", name))
                })?;
                Selector::build(&config, reduction.as_deref(), interpolation.as_deref())
            })
            .collect()
    }

    /// Resample every selector over `npoints` bins spanning `[first, last]`.
    pub fn query<S: AsRef<str>>(
        &self,
        selectors: &[S],
        first: DateTime<Utc>,
        last: DateTime<Utc>,
        npoints: usize,
    ) -> Result<QueryResult> {
        let selectors = self.resolve(selectors)?;
        let bins = self.bins(first, last, npoints)?;

        tracing::debug!(
            "Query of {} selectors over {} .. {} in {} bins",
            selectors.len(),
            first,
            last,
            npoints
        );
        self.query_bins(&selectors, &bins)
    }

    /// Bins for `[first, last]`, bounded by the configured point limit.
    pub fn bins(&self, first: DateTime<Utc>, last: DateTime<Utc>, npoints: usize) -> Result<Bins> {
        if npoints > self.max_points {
            return Err(NatlogError::InvalidQuery(format!(
                "npoints {} exceeds the limit of {}",
                npoints, self.max_points
            )));
        }
        Bins::compute(first, last, npoints)
    }

    /// Resample resolved selectors over precomputed bins.
    pub fn query_bins(&self, selectors: &[Selector], bins: &Bins) -> Result<QueryResult> {
        let columns = selectors
            .iter()
            .map(|selector| {
                let groups = self.store.read_range(
                    selector.series(),
                    selector.datatype(),
                    &bins.lowers,
                    &bins.uppers,
                )?;
                selector.apply_strategies(&bins.centers, groups)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryResult {
            centers: bins.centers.clone(),
            columns,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
