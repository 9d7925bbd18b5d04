//! Chart rendering to PNG bytes.
//!
//! Both charts draw into a 400x400 RGB buffer and encode as PNG for
//! embedding. Geometry is computed from the aggregates alone, so
//! identical input produces byte-identical images.

use std::f64::consts::PI;

use plotters::prelude::*;

use crate::error::{Error, Result};
use crate::metrics::StageCounts;

/// Chart raster size in pixels.
pub const CHART_SIZE: u32 = 400;

/// Slice palette, cycled when there are more than five owners.
const PALETTE: [RGBColor; 5] = [
    RGBColor(0xFF, 0x63, 0x84),
    RGBColor(0x36, 0xA2, 0xEB),
    RGBColor(0xFF, 0xCE, 0x56),
    RGBColor(0xFF, 0x57, 0x33),
    RGBColor(0xC7, 0x00, 0x39),
];

const WON_COLOR: RGBColor = RGBColor(0x4C, 0xAF, 0x50);
const LOST_COLOR: RGBColor = RGBColor(0xF4, 0x43, 0x36);
const AXIS_COLOR: RGBColor = RGBColor(0x60, 0x60, 0x60);

const CENTER: (i32, i32) = (200, 200);
const OUTER_RADIUS: f64 = 150.0;
const INNER_RADIUS: f64 = 75.0;

fn draw_error(e: impl std::fmt::Display) -> Error {
    Error::Render(format!("chart drawing failed: {e}"))
}

/// Doughnut chart of closed-won counts per owner: one slice per owner,
/// palette colors in first-seen order.
pub fn doughnut_png(win_counts: &[(String, u64)]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; (CHART_SIZE * CHART_SIZE * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (CHART_SIZE, CHART_SIZE))
            .into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;

        let total: u64 = win_counts.iter().map(|(_, n)| n).sum();
        if total > 0 {
            // Start at 12 o'clock and sweep clockwise.
            let mut angle = -PI / 2.0;
            for (index, (_, count)) in win_counts.iter().enumerate() {
                if *count == 0 {
                    continue;
                }
                let sweep = 2.0 * PI * (*count as f64) / (total as f64);
                let color = PALETTE[index % PALETTE.len()];
                root.draw(&Polygon::new(
                    annulus_sector(angle, angle + sweep),
                    color.filled(),
                ))
                .map_err(draw_error)?;
                angle += sweep;
            }
        }
        root.present().map_err(draw_error)?;
    }
    encode_png(buf)
}

/// Points outlining one donut sector: outer arc forward, inner arc back.
fn annulus_sector(start: f64, end: f64) -> Vec<(i32, i32)> {
    // One-degree steps keep the outline smooth at this raster size.
    let steps = (((end - start) / PI * 180.0).ceil() as usize).max(2);
    let mut points = Vec::with_capacity(2 * (steps + 1));
    for i in 0..=steps {
        let theta = start + (end - start) * (i as f64) / (steps as f64);
        points.push(polar(theta, OUTER_RADIUS));
    }
    for i in (0..=steps).rev() {
        let theta = start + (end - start) * (i as f64) / (steps as f64);
        points.push(polar(theta, INNER_RADIUS));
    }
    points
}

fn polar(theta: f64, radius: f64) -> (i32, i32) {
    (
        (CENTER.0 as f64 + radius * theta.cos()).round() as i32,
        (CENTER.1 as f64 + radius * theta.sin()).round() as i32,
    )
}

/// Stacked bar chart of won/lost counts per owner: one bar per owner in
/// first-seen order, won segment below, lost segment stacked above.
pub fn stacked_bar_png(stage_counts: &[(String, StageCounts)]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; (CHART_SIZE * CHART_SIZE * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (CHART_SIZE, CHART_SIZE))
            .into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;

        // Plot rectangle inside fixed margins; y grows downward in
        // raster coordinates, so bar tops subtract from the baseline.
        let left = 40i32;
        let right = CHART_SIZE as i32 - 20;
        let top = 20i32;
        let bottom = CHART_SIZE as i32 - 40;

        root.draw(&PathElement::new(
            vec![(left, top), (left, bottom), (right, bottom)],
            AXIS_COLOR.stroke_width(1),
        ))
        .map_err(draw_error)?;

        let max_total = stage_counts
            .iter()
            .map(|(_, c)| c.closed_won_count + c.closed_lost_count)
            .max()
            .unwrap_or(0);
        if max_total > 0 {
            let plot_height = (bottom - top) as f64;
            let slot_width = (right - left) as f64 / stage_counts.len() as f64;
            let scale = plot_height / max_total as f64;

            for (index, (_, counts)) in stage_counts.iter().enumerate() {
                let x0 = left + (slot_width * (index as f64 + 0.15)) as i32;
                let x1 = left + (slot_width * (index as f64 + 0.85)) as i32;

                let won_top = bottom - (counts.closed_won_count as f64 * scale) as i32;
                if counts.closed_won_count > 0 {
                    root.draw(&Rectangle::new(
                        [(x0, won_top), (x1, bottom)],
                        WON_COLOR.filled(),
                    ))
                    .map_err(draw_error)?;
                }

                let lost_top = won_top - (counts.closed_lost_count as f64 * scale) as i32;
                if counts.closed_lost_count > 0 {
                    root.draw(&Rectangle::new(
                        [(x0, lost_top), (x1, won_top)],
                        LOST_COLOR.filled(),
                    ))
                    .map_err(draw_error)?;
                }
            }
        }
        root.present().map_err(draw_error)?;
    }
    encode_png(buf)
}

fn encode_png(buf: Vec<u8>) -> Result<Vec<u8>> {
    let image = image::RgbImage::from_raw(CHART_SIZE, CHART_SIZE, buf)
        .ok_or_else(|| Error::Render("chart buffer size mismatch".into()))?;
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| Error::Render(format!("PNG encoding failed: {e}")))?;
    Ok(out)
}
