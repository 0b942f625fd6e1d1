//! Sampling a grid at arbitrary geographic points.

use crate::error::{Result, SynopticError};
use crate::fields::GridField;

/// Trait for sampling methods
pub trait Sampler: Send + Sync {
    /// Value at a coordinate, NaN outside the grid or next to missing data
    fn sample(&self, field: &GridField, lon: f64, lat: f64) -> f32;

    /// Get the name of this sampling method
    fn name(&self) -> &str;
}

/// Nearest grid point
pub struct Nearest;

impl Sampler for Nearest {
    fn sample(&self, field: &GridField, lon: f64, lat: f64) -> f32 {
        let Some((row, col)) = field.fractional_index(lon, lat) else {
            return f32::NAN;
        };
        let (rows, cols) = field.shape();
        let r = clamp_index(row.round(), rows) as usize;
        let c = clamp_index(col.round(), cols) as usize;
        field.values()[[r, c]]
    }

    fn name(&self) -> &str {
        "nearest"
    }
}

/// Bilinear interpolation between the four surrounding grid points
pub struct Bilinear;

impl Sampler for Bilinear {
    fn sample(&self, field: &GridField, lon: f64, lat: f64) -> f32 {
        let Some((row, col)) = field.fractional_index(lon, lat) else {
            return f32::NAN;
        };
        let (rows, cols) = field.shape();
        let values = field.values();

        let r0 = clamp_index(row.floor(), rows) as usize;
        let c0 = clamp_index(col.floor(), cols) as usize;
        let r1 = (r0 + 1).min(rows - 1);
        let c1 = (c0 + 1).min(cols - 1);
        let (wr0, wr1) = linear_weight(row - r0 as f64);
        let (wc0, wc1) = linear_weight(col - c0 as f64);

        let v = values[[r0, c0]] as f64 * wr0 * wc0
            + values[[r0, c1]] as f64 * wr0 * wc1
            + values[[r1, c0]] as f64 * wr1 * wc0
            + values[[r1, c1]] as f64 * wr1 * wc1;
        v as f32
    }

    fn name(&self) -> &str {
        "bilinear"
    }
}

/// Get a sampler by name
pub fn get_sampler(name: &str) -> Result<Box<dyn Sampler>> {
    match name.to_lowercase().as_str() {
        "nearest" => Ok(Box::new(Nearest)),
        "bilinear" => Ok(Box::new(Bilinear)),
        _ => Err(SynopticError::InvalidParameter {
            param: "sampler".to_string(),
            message: format!("Unknown sampling method: {}", name),
        }),
    }
}

/// Clamp an index to valid bounds
fn clamp_index(index: f64, size: usize) -> f64 {
    index.max(0.0).min(size.saturating_sub(1) as f64)
}

/// Get the weight for linear interpolation
fn linear_weight(fraction: f64) -> (f64, f64) {
    let fraction = fraction.clamp(0.0, 1.0);
    (1.0 - fraction, fraction)
}
