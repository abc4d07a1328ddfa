//! Transformation module.
//!
//! Stages run in this order:
//! - Normalize: raw cells to typed records
//! - Pivot: count and value pivots by month
//! - Cumulative: running totals of wins and values
//! - Currency: conversion to the target currency
//! - Pipeline: all of the above behind one call

pub mod cumulative;
pub mod currency;
pub mod normalize;
pub mod pipeline;
pub mod pivot;

pub use cumulative::{cumulative_values, cumulative_wins, running_total, CumulativePoint};
pub use currency::{normalize_currency, Conversion, CurrencyConverter};
pub use normalize::{normalize, Normalized};
pub use pipeline::*;
pub use pivot::{count_pivot, monthly_totals, value_pivot, Pivot, PivotRow, PivotValue};
