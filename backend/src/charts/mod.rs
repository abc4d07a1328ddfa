//! Chart descriptions for the report.
//!
//! Charts are returned as data (the host draws them). A chart with no points
//! carries a placeholder message instead of an empty series.

use serde::Serialize;

use crate::transform::cumulative::CumulativePoint;

/// Placeholder shown instead of a chart with no points.
pub const NO_DATA: &str = "No data to display";

/// Width of the longest bar in text rendering.
const TEXT_BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Either a drawable series or the empty-result placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChartData {
    Ready { points: Vec<ChartPoint> },
    Empty { placeholder: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub id: String,
    pub title: String,
    pub kind: ChartKind,
    pub x_label: String,
    pub y_label: String,
    #[serde(flatten)]
    pub data: ChartData,
}

impl Chart {
    /// Build a chart, switching to the placeholder when `points` is empty.
    pub fn new(
        id: &str,
        title: impl Into<String>,
        kind: ChartKind,
        x_label: &str,
        y_label: impl Into<String>,
        points: Vec<ChartPoint>,
    ) -> Self {
        let data = if points.is_empty() {
            ChartData::Empty {
                placeholder: NO_DATA.to_string(),
            }
        } else {
            ChartData::Ready { points }
        };

        Self {
            id: id.to_string(),
            title: title.into(),
            kind,
            x_label: x_label.to_string(),
            y_label: y_label.into(),
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.data, ChartData::Empty { .. })
    }

    pub fn points(&self) -> &[ChartPoint] {
        match &self.data {
            ChartData::Ready { points } => points,
            ChartData::Empty { .. } => &[],
        }
    }

    /// Horizontal bar rendering for terminals.
    pub fn render_text(&self) -> String {
        let mut out = format!("{} ({})\n", self.title, self.y_label);

        let points = match &self.data {
            ChartData::Empty { placeholder } => {
                out.push_str(&format!("  ({})\n", placeholder));
                return out;
            }
            ChartData::Ready { points } => points,
        };

        let max = points.iter().map(|p| p.value.abs()).fold(0.0_f64, f64::max);
        let label_width = points.iter().map(|p| p.label.chars().count()).max().unwrap_or(0);

        for p in points {
            let len = if max > 0.0 {
                ((p.value.abs() / max) * TEXT_BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            out.push_str(&format!(
                "  {:<lw$} | {} {}\n",
                p.label,
                "█".repeat(len),
                format_value(p.value),
                lw = label_width
            ));
        }
        out
    }
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn points_from<V>(series: &[CumulativePoint<V>], pick: impl Fn(&CumulativePoint<V>) -> f64) -> Vec<ChartPoint> {
    series
        .iter()
        .map(|p| ChartPoint {
            label: p.month.to_string(),
            value: pick(p),
        })
        .collect()
}

/// The three report charts: cumulative wins, monthly value, cumulative value.
pub fn build_charts(
    cumulative_wins: &[CumulativePoint<u64>],
    monthly_values: &[CumulativePoint<f64>],
    target_currency: &str,
) -> Vec<Chart> {
    vec![
        Chart::new(
            "cumulative_wins",
            "Cumulative Wins by Month",
            ChartKind::Line,
            "Month",
            "Cumulative Wins",
            points_from(cumulative_wins, |p| p.cumulative as f64),
        ),
        Chart::new(
            "monthly_values",
            format!("Monthly Opportunity Values in {}", target_currency),
            ChartKind::Bar,
            "Month",
            format!("Total Value in {}", target_currency),
            points_from(monthly_values, |p| p.value),
        ),
        Chart::new(
            "cumulative_values",
            format!("Cumulative Opportunity Value in {}", target_currency),
            ChartKind::Line,
            "Month",
            format!("Cumulative Value in {}", target_currency),
            points_from(monthly_values, |p| p.cumulative),
        ),
    ]
}
