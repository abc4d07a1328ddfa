//! Win and value cumulators.

use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::AddAssign;

use crate::models::{MonthKey, OpportunityRecord};

/// One month of a running total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CumulativePoint<V> {
    pub month: MonthKey,
    /// Amount for this month alone.
    pub value: V,
    /// Running total up to and including this month.
    pub cumulative: V,
}

/// Sort per-month amounts ascending and attach the running total.
pub fn running_total<V>(per_month: impl IntoIterator<Item = (MonthKey, V)>) -> Vec<CumulativePoint<V>>
where
    V: Copy + Default + AddAssign,
{
    let mut buckets: BTreeMap<MonthKey, V> = BTreeMap::new();
    for (month, value) in per_month {
        *buckets.entry(month).or_default() += value;
    }

    let mut total = V::default();
    buckets
        .into_iter()
        .map(|(month, value)| {
            total += value;
            CumulativePoint {
                month,
                value,
                cumulative: total,
            }
        })
        .collect()
}

/// Cumulative count of won records per month.
///
/// Empty when nothing matches `won_label`.
pub fn cumulative_wins(records: &[OpportunityRecord], won_label: &str) -> Vec<CumulativePoint<u64>> {
    running_total(
        records
            .iter()
            .filter(|r| r.is_won(won_label))
            .map(|r| (MonthKey::from_date(r.close_date), 1u64)),
    )
}

/// Running total over monthly target-currency sums.
pub fn cumulative_values(monthly: Vec<(MonthKey, f64)>) -> Vec<CumulativePoint<f64>> {
    running_total(monthly)
}
