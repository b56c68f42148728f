//! Color ramps and grid-to-image rendering.

use serde::Serialize;
use tracing::debug;

use climatology::{max_abs, percentile};
use sst_common::Grid;

use crate::png::encode_rgba;
use crate::RenderError;

/// Color value in RGBA format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Missing cells render fully transparent.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }
}

/// Sequential heat ramp for observed SST (pale yellow through dark red),
/// `t` normalized to 0..1.
pub fn sst_color(t: f32) -> Color {
    const STOPS: [Color; 5] = [
        Color {
            r: 255,
            g: 255,
            b: 204,
            a: 255,
        },
        Color {
            r: 254,
            g: 217,
            b: 118,
            a: 255,
        },
        Color {
            r: 254,
            g: 178,
            b: 76,
            a: 255,
        },
        Color {
            r: 240,
            g: 59,
            b: 32,
            a: 255,
        },
        Color {
            r: 189,
            g: 0,
            b: 38,
            a: 255,
        },
    ];
    ramp(&STOPS, t)
}

/// Diverging ramp for anomalies: cool blue through white to warm red,
/// `t` normalized to 0..1 with 0.5 at zero anomaly.
pub fn anomaly_color(t: f32) -> Color {
    const STOPS: [Color; 3] = [
        Color {
            r: 59,
            g: 76,
            b: 192,
            a: 255,
        },
        Color {
            r: 255,
            g: 255,
            b: 255,
            a: 255,
        },
        Color {
            r: 180,
            g: 4,
            b: 38,
            a: 255,
        },
    ];
    ramp(&STOPS, t)
}

/// Piecewise-linear interpolation across evenly spaced stops.
fn ramp(stops: &[Color], t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let segments = (stops.len() - 1) as f32;
    let pos = t * segments;
    let i = (pos.floor() as usize).min(stops.len() - 2);
    interpolate_color(stops[i], stops[i + 1], pos - i as f32)
}

/// Linear color interpolation.
fn interpolate_color(a: Color, b: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((a.r as f32 * t_inv) + (b.r as f32 * t)) as u8,
        ((a.g as f32 * t_inv) + (b.g as f32 * t)) as u8,
        ((a.b as f32 * t_inv) + (b.b as f32 * t)) as u8,
        ((a.a as f32 * t_inv) + (b.a as f32 * t)) as u8,
    )
}

/// Rendering options.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Square pixels per grid cell (nearest-neighbor upscale so the small
    /// analysis window produces a viewable image).
    pub cell_px: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { cell_px: 8 }
    }
}

/// A rendered RGBA image plus the value range its colors span.
#[derive(Debug, Clone)]
pub struct RenderedMap {
    pub pixels: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub value_range: ValueRange,
}

/// The data values mapped to the ends of the color ramp.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl RenderedMap {
    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        encode_rgba(&self.pixels, self.width, self.height)
            .map_err(|e| RenderError::PngEncoding(e.to_string()))
    }
}

/// Render an observed-SST grid with the sequential heat ramp.
///
/// The color range spans the 5th–95th percentile of finite values, so a
/// few extreme cells cannot wash out the rest of the map.
pub fn render_sst(grid: &Grid, opts: RenderOptions) -> Result<RenderedMap, RenderError> {
    let vmin = percentile(&grid.values, 5.0).ok_or(RenderError::NoFiniteValues)?;
    let vmax = percentile(&grid.values, 95.0).ok_or(RenderError::NoFiniteValues)?;
    render_with_ramp(grid, vmin, vmax, opts, sst_color)
}

/// Render an anomaly grid with the diverging ramp, centered at zero.
///
/// The range is symmetric at ±max-abs so zero anomaly is always the white
/// midpoint.
pub fn render_anomaly(grid: &Grid, opts: RenderOptions) -> Result<RenderedMap, RenderError> {
    let extent = max_abs(&grid.values).ok_or(RenderError::NoFiniteValues)?;
    // A perfectly flat zero anomaly still needs a nonzero span.
    let extent = if extent > 0.0 { extent } else { 1.0 };
    render_with_ramp(grid, -extent, extent, opts, anomaly_color)
}

fn render_with_ramp<F>(
    grid: &Grid,
    vmin: f32,
    vmax: f32,
    opts: RenderOptions,
    color_fn: F,
) -> Result<RenderedMap, RenderError>
where
    F: Fn(f32) -> Color,
{
    let (n_lat, n_lon) = grid.shape();
    if grid.is_empty() {
        return Err(RenderError::EmptyGrid);
    }

    let cell = opts.cell_px.max(1);
    let width = n_lon * cell;
    let height = n_lat * cell;

    let range = vmax - vmin;
    let range = if range.abs() < 1e-6 { 1.0 } else { range };

    let mut pixels = vec![0u8; width * height * 4];

    for row in 0..height {
        // Image rows run north to south; the latitude axis is ascending.
        let i = n_lat - 1 - row / cell;
        for col in 0..width {
            let j = col / cell;
            let value = grid.values[i * n_lon + j];

            let color = if value.is_nan() {
                Color::transparent()
            } else {
                color_fn(((value - vmin) / range).clamp(0.0, 1.0))
            };

            let p = (row * width + col) * 4;
            pixels[p] = color.r;
            pixels[p + 1] = color.g;
            pixels[p + 2] = color.b;
            pixels[p + 3] = color.a;
        }
    }

    debug!(width, height, vmin, vmax, "Rendered grid");

    Ok(RenderedMap {
        pixels,
        width,
        height,
        value_range: ValueRange {
            min: vmin,
            max: vmax,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_endpoints() {
        assert_eq!(sst_color(0.0), Color::new(255, 255, 204, 255));
        assert_eq!(sst_color(1.0), Color::new(189, 0, 38, 255));
        // Out-of-range input clamps instead of panicking.
        assert_eq!(sst_color(-3.0), sst_color(0.0));
        assert_eq!(sst_color(7.0), sst_color(1.0));
    }

    #[test]
    fn test_diverging_midpoint_is_white() {
        assert_eq!(anomaly_color(0.5), Color::new(255, 255, 255, 255));
    }

    #[test]
    fn test_interpolate_color() {
        let mid = interpolate_color(Color::new(0, 0, 0, 255), Color::new(200, 100, 50, 255), 0.5);
        assert_eq!(mid, Color::new(100, 50, 25, 255));
    }
}
