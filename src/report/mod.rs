//! Report rendering: summary text plus two charts into a paged PDF.

pub mod charts;
pub mod measure;
pub mod pdf;
pub mod text;

use crate::error::Result;
use crate::metrics::OwnerAggregates;

/// Render the full report: clean and paginate the summary, then append
/// the ownership doughnut and the win/loss stacked bar chart.
pub fn render(summary: &str, aggregates: &OwnerAggregates) -> Result<Vec<u8>> {
    let doughnut = charts::doughnut_png(aggregates.wins())?;
    let stacked_bar = charts::stacked_bar_png(aggregates.stage_counts())?;
    let lines = text::layout_lines(summary);
    let layout = pdf::plan_layout(&lines, 2);
    log::debug!(
        "report layout: {} text runs, 2 charts, {} pages",
        layout.texts.len(),
        layout.page_count
    );
    pdf::draw(&layout, &[doughnut, stacked_bar])
}
