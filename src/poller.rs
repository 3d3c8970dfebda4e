use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

use crate::accumulator::Accumulator;
use crate::ceilometer::{CeilometerClient, QueryError, Statistics};
use crate::mappings::MetricGroup;
use crate::report::MetricSink;

/// Source of per-meter statistics. The production implementation is
/// [`CeilometerClient`]; tests script failures through this seam.
#[allow(async_fn_in_trait)]
pub trait StatsSource {
    async fn statistics(&self, meter: &str) -> Result<Option<Statistics>, QueryError>;
}

impl StatsSource for CeilometerClient {
    async fn statistics(&self, meter: &str) -> Result<Option<Statistics>, QueryError> {
        CeilometerClient::statistics(self, meter).await
    }
}

/// How often a failed poll cycle may be retried before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry forever until a cycle succeeds.
    Unbounded,
    /// Give up after this many failed cycles.
    Bounded(u32),
}

impl RetryPolicy {
    /// Maps the configured retry count onto a policy; 0 means unlimited.
    pub fn from_count(retry_count: u32) -> Self {
        if retry_count == 0 {
            RetryPolicy::Unbounded
        } else {
            RetryPolicy::Bounded(retry_count)
        }
    }
}

#[derive(Debug)]
pub enum PollError {
    MaxRetriesExceeded(u32),
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::MaxRetriesExceeded(max) => {
                write!(f, "Max retries ({}) exceeded retrieving statistics", max)
            }
        }
    }
}

impl std::error::Error for PollError {}

/// One pass over all groups: query each meter, keep the records that exist.
///
/// Any query failure aborts the cycle; a meter with no data in the window is
/// skipped, not an error.
async fn poll_cycle<S: StatsSource>(
    source: &S,
    groups: &[MetricGroup],
) -> Result<HashMap<&'static str, Statistics>, QueryError> {
    let mut results = HashMap::new();
    for group in groups {
        match source.statistics(group.meter).await? {
            Some(record) => {
                results.insert(group.meter, record);
            }
            None => debug!("No statistics for meter {} this window", group.meter),
        }
    }
    Ok(results)
}

/// Poll all groups, retrying the entire cycle on failure with a fixed delay.
pub async fn poll_with_retries<S: StatsSource>(
    source: &S,
    groups: &[MetricGroup],
    policy: RetryPolicy,
    retry_delay: Duration,
) -> Result<HashMap<&'static str, Statistics>, PollError> {
    let mut attempts = 0u32;
    loop {
        match poll_cycle(source, groups).await {
            Ok(results) => return Ok(results),
            Err(e) => {
                error!("Error retrieving statistics: {}", e);
                tokio::time::sleep(retry_delay).await;
                attempts += 1;
                if let RetryPolicy::Bounded(max) = policy {
                    if attempts >= max {
                        error!("Max retries ({}) exceeded retrieving statistics", max);
                        return Err(PollError::MaxRetriesExceeded(max));
                    }
                }
            }
        }
    }
}

/// Map one cycle's records into reported metrics.
///
/// Entries whose field is absent are skipped without affecting their
/// siblings; accumulating entries are converted to deltas keyed by reported
/// name.
pub fn handle_metrics(
    groups: &[MetricGroup],
    results: &HashMap<&'static str, Statistics>,
    accumulator: &mut Accumulator,
    sink: &mut impl MetricSink,
) {
    for group in groups {
        let record = match results.get(group.meter) {
            Some(record) => record,
            None => continue,
        };

        for entry in &group.entries {
            let raw = match record.field(entry.source_field) {
                Some(raw) => raw,
                None => {
                    debug!(
                        "Field {} absent for meter {}, skipping",
                        entry.source_field, group.meter
                    );
                    continue;
                }
            };

            let value = if entry.accumulate {
                accumulator.accumulate(entry.reported_name, raw as i64) as f64
            } else {
                raw
            };

            sink.report(entry.reported_name, value);
        }
    }
}

/// Drive the agent forever: poll with retries, map, report, sleep.
///
/// Only retry exhaustion returns; the success path loops until the process is
/// terminated externally.
pub async fn run<S: StatsSource>(
    source: &S,
    groups: &[MetricGroup],
    sink: &mut impl MetricSink,
    policy: RetryPolicy,
    retry_delay: Duration,
    poll_interval: Duration,
) -> Result<(), PollError> {
    let mut accumulator = Accumulator::new();

    loop {
        let results = poll_with_retries(source, groups, policy, retry_delay).await?;
        handle_metrics(groups, &results, &mut accumulator, sink);
        debug!("Cycle complete, sleeping {}s", poll_interval.as_secs());
        tokio::time::sleep(poll_interval).await;
    }
}
