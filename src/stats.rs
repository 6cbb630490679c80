//! Aggregate statistics and magnitude histograms.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::SeismicEvent;

/// Count and mean magnitude of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateStats {
    pub count: usize,
    /// `None` when the collection is empty; the mean of nothing is undefined.
    pub average_magnitude: Option<f64>,
}

impl AggregateStats {
    /// Average formatted to two decimals, `"NaN"` when undefined.
    #[must_use]
    pub fn display_average(&self) -> String {
        match self.average_magnitude {
            Some(avg) if !avg.is_nan() => format!("{avg:.2}"),
            _ => "NaN".to_string(),
        }
    }
}

/// Compute the count and arithmetic mean magnitude.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_stats(events: &[SeismicEvent]) -> AggregateStats {
    let count = events.len();
    let average_magnitude = if count == 0 {
        None
    } else {
        let sum: f64 = events.iter().map(|e| e.magnitude).sum();
        Some(sum / count as f64)
    };

    AggregateStats {
        count,
        average_magnitude,
    }
}

/// Sparse histogram keyed by floored magnitude.
///
/// Non-negative buckets come first in ascending order, then negative
/// buckets in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MagnitudeHistogram {
    buckets: BTreeMap<i64, usize>,
    negative: Vec<(i64, usize)>,
}

impl MagnitudeHistogram {
    fn add(&mut self, bucket: i64) {
        if bucket >= 0 {
            *self.buckets.entry(bucket).or_insert(0) += 1;
        } else if let Some(slot) = self.negative.iter_mut().find(|(k, _)| *k == bucket) {
            slot.1 += 1;
        } else {
            self.negative.push((bucket, 1));
        }
    }

    /// Populated buckets in display order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, usize)> + '_ {
        self.buckets
            .iter()
            .map(|(&k, &v)| (k, v))
            .chain(self.negative.iter().copied())
    }

    /// Chart bars in key order, labelled `"{k}-{k+1}"`.
    #[must_use]
    pub fn bars(&self) -> Vec<HistogramBar> {
        self.iter()
            .map(|(bucket, count)| HistogramBar {
                label: format!("{bucket}-{}", bucket + 1),
                bucket,
                count,
            })
            .collect()
    }
}

/// One bar of a histogram panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramBar {
    pub label: String,
    pub bucket: i64,
    pub count: usize,
}

/// Floor each magnitude into an integer bucket and count.
///
/// Non-finite magnitudes have no bucket and are skipped.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn bucketize(events: &[SeismicEvent]) -> MagnitudeHistogram {
    let mut histogram = MagnitudeHistogram::default();
    for event in events.iter().filter(|e| e.magnitude.is_finite()) {
        histogram.add(event.magnitude.floor() as i64);
    }
    histogram
}
