//! Natlog Continuous Query
//!
//! Live resampling. A continuous query answers the bounded query from
//! `first` to now, then keeps producing one further bin per bin width on a
//! dedicated task. The task sleeps until a bin has closed, queries exactly
//! that bin, and hands the result to the consumer through a bounded
//! channel.
//!
//! Dropping the [`ContinuousQuery`] stops its task and timer.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::query::{Bins, QueryEngine, QueryResult};
use crate::selector::Selector;
use crate::value::Value;
use chrono::{DateTime, Duration, Utc};
use natlog_common::{NatlogError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// =============================================================================
// Continuous Bin
// =============================================================================

/// One live bin: its center and one value per selector.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousBin {
    pub center: DateTime<Utc>,
    pub values: Vec<Option<Value>>,
}

// =============================================================================
// Continuous Query
// =============================================================================

/// Handle to a running continuous query.
pub struct ContinuousQuery {
    receiver: mpsc::Receiver<Result<ContinuousBin>>,
    task: JoinHandle<()>,
    delta: Duration,
}

impl ContinuousQuery {
    /// Wait for the next bin. Returns `None` once the query has stopped.
    pub async fn next(&mut self) -> Option<Result<ContinuousBin>> {
        self.receiver.recv().await
    }

    /// Width of each bin.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Stop producing bins.
    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ContinuousQuery {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// Driver
// =============================================================================

impl QueryEngine {
    /// Run the bounded query over `[first, now]` and continue it live.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn query_continuous<S: AsRef<str>>(
        &self,
        selectors: &[S],
        first: DateTime<Utc>,
        npoints: usize,
        buffer: usize,
    ) -> Result<(QueryResult, ContinuousQuery)> {
        let now = Utc::now();
        if first >= now {
            return Err(NatlogError::InvalidQuery(format!(
                "continuous query must start before now, got {}",
                first
            )));
        }

        let selectors = self.resolve(selectors)?;
        let bins = self.bins(first, now, npoints)?;
        let initial = self.query_bins(&selectors, &bins)?;

        let delta = match initial.centers.as_slice() {
            [a, b, ..] if b > a => *b - *a,
            _ => {
                return Err(NatlogError::InvalidQuery(format!(
                    "window from {} is too short for {} bins",
                    first, npoints
                )))
            }
        };
        tracing::debug!("Continuous query started at {} with bin width {}", now, delta);

        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let task = tokio::spawn(drive(self.clone(), selectors, bins, delta, sender));

        Ok((
            initial,
            ContinuousQuery {
                receiver,
                task,
                delta,
            },
        ))
    }
}

async fn drive(
    engine: QueryEngine,
    selectors: Vec<Selector>,
    mut bins: Bins,
    delta: Duration,
    sender: mpsc::Sender<Result<ContinuousBin>>,
) {
    loop {
        bins = match bins.following(delta) {
            Ok(next) => next,
            Err(e) => {
                let _ = sender.send(Err(e)).await;
                break;
            }
        };
        let center = bins.centers[0];
        let closes = bins.uppers[0];

        let wait = (closes - Utc::now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = sender.closed() => break,
        }

        let bin = engine.query_bins(&selectors, &bins).map(|result| ContinuousBin {
            center,
            values: result
                .columns
                .into_iter()
                .map(|mut column| column.pop().flatten())
                .collect(),
        });

        let failed = bin.is_err();
        if sender.send(bin).await.is_err() || failed {
            break;
        }
    }

    tracing::debug!("Continuous query stopped after bin {:?}", bins.centers.last());
}

// =============================================================================
// Tests
// =============================================================================
