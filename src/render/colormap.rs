//! Colormaps and level tables.
//!
//! A [`Colormap`] maps a normalized value to a colour. A [`LevelTable`] turns
//! a colormap (or an explicit colour list) into discrete filled intervals
//! between fixed boundaries, with optional under/over colours for values
//! outside the boundaries.

use crate::error::{Result, SynopticError};

/// Trait for color mapping implementations
pub trait Colormap: Send + Sync {
    /// Map a normalized value (0.0 to 1.0) to an RGBA color
    fn map_normalized(&self, value: f32) -> [u8; 4];

    /// Map a value to an RGBA color given the data range
    fn map(&self, value: f32, min: f32, max: f32) -> [u8; 4] {
        let normalized = if max > min {
            ((value - min) / (max - min)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        self.map_normalized(normalized)
    }

    /// Get the name of this colormap
    fn name(&self) -> &str;
}

/// A `colorgrad` preset, optionally reversed
pub struct GradientColormap {
    name: String,
    gradient: colorgrad::Gradient,
    reversed: bool,
}

impl GradientColormap {
    pub fn new(name: impl Into<String>, gradient: colorgrad::Gradient) -> Self {
        Self {
            name: name.into(),
            gradient,
            reversed: false,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reversed = !self.reversed;
        self
    }
}

impl Colormap for GradientColormap {
    fn map_normalized(&self, value: f32) -> [u8; 4] {
        let t = value.clamp(0.0, 1.0) as f64;
        let t = if self.reversed { 1.0 - t } else { t };
        let (lo, hi) = self.gradient.domain();
        self.gradient.at(lo + t * (hi - lo)).to_rgba8()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Linear segments between colour stops. Two stops may share a position,
/// which gives a sharp step at that value.
pub struct PiecewiseColormap {
    name: String,
    stops: Vec<(f32, [u8; 3])>,
}

impl PiecewiseColormap {
    /// Stops must be sorted by position; at least one is required
    pub fn new(name: impl Into<String>, stops: Vec<(f32, [u8; 3])>) -> Result<Self> {
        let name = name.into();
        if stops.is_empty() || stops.windows(2).any(|w| w[1].0 < w[0].0) {
            return Err(SynopticError::InvalidParameter {
                param: "colormap".to_string(),
                message: format!("{}: stops must be non-empty and sorted", name),
            });
        }
        Ok(Self { name, stops })
    }

    /// Colour at a value in the stops' own units
    pub fn at(&self, value: f32) -> [u8; 3] {
        let first = self.stops[0];
        let last = self.stops[self.stops.len() - 1];
        if value <= first.0 {
            return first.1;
        }
        if value >= last.0 {
            return last.1;
        }
        // last stop at or below value, so equal positions resolve to the upper colour
        let upper = self.stops.partition_point(|(p, _)| *p <= value);
        let (p0, c0) = self.stops[upper - 1];
        let (p1, c1) = self.stops[upper];
        let t = if p1 > p0 { (value - p0) / (p1 - p0) } else { 1.0 };
        lerp_color(c0, c1, t)
    }

    fn span(&self) -> (f32, f32) {
        (self.stops[0].0, self.stops[self.stops.len() - 1].0)
    }
}

impl Colormap for PiecewiseColormap {
    fn map_normalized(&self, value: f32) -> [u8; 4] {
        let (lo, hi) = self.span();
        let rgb = self.at(lo + value.clamp(0.0, 1.0) * (hi - lo));
        [rgb[0], rgb[1], rgb[2], 255]
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Get a colormap by name
pub fn get_colormap(name: &str) -> Result<Box<dyn Colormap>> {
    let lower = name.to_lowercase();
    let (base, reversed) = match lower.strip_suffix("_r") {
        Some(base) => (base, true),
        None => (lower.as_str(), false),
    };

    let gradient = match base {
        "jet" => return flip(jet()?, reversed),
        "autumn" => return flip(autumn()?, reversed),
        "turbo" => colorgrad::turbo(),
        "viridis" => colorgrad::viridis(),
        "blues" => colorgrad::blues(),
        "greens" => colorgrad::greens(),
        "reds" => colorgrad::reds(),
        "rdbu" | "rd_bu" => colorgrad::rd_bu(),
        "brbg" | "br_bg" => colorgrad::br_bg(),
        "spectral" => colorgrad::spectral(),
        "ylgnbu" | "yl_gn_bu" => colorgrad::yl_gn_bu(),
        "ylorrd" | "yl_or_rd" => colorgrad::yl_or_rd(),
        "purples" => colorgrad::purples(),
        _ => {
            return Err(SynopticError::InvalidParameter {
                param: "colormap".to_string(),
                message: format!("Unknown colormap: {}", name),
            })
        }
    };

    let cmap = GradientColormap::new(lower.clone(), gradient);
    Ok(Box::new(if reversed { cmap.reversed() } else { cmap }))
}

/// Reverse a piecewise map by mirroring its stops on [0, 1]
fn flip(cmap: PiecewiseColormap, reversed: bool) -> Result<Box<dyn Colormap>> {
    if !reversed {
        return Ok(Box::new(cmap));
    }
    let stops = cmap
        .stops
        .iter()
        .rev()
        .map(|(p, c)| (1.0 - p, *c))
        .collect();
    Ok(Box::new(PiecewiseColormap::new(format!("{}_r", cmap.name), stops)?))
}

fn jet() -> Result<PiecewiseColormap> {
    PiecewiseColormap::new(
        "jet",
        vec![
            (0.0, [0, 0, 127]),
            (0.11, [0, 0, 255]),
            (0.125, [0, 0, 255]),
            (0.34, [0, 219, 255]),
            (0.35, [0, 229, 246]),
            (0.64, [255, 255, 0]),
            (0.65, [255, 247, 0]),
            (0.89, [255, 0, 0]),
            (0.91, [232, 0, 0]),
            (1.0, [127, 0, 0]),
        ],
    )
}

fn autumn() -> Result<PiecewiseColormap> {
    PiecewiseColormap::new("autumn", vec![(0.0, [255, 0, 0]), (1.0, [255, 255, 0])])
}

/// Linear interpolation between two colors
pub fn lerp_color(c1: [u8; 3], c2: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    [
        (c1[0] as f32 * (1.0 - t) + c2[0] as f32 * t).round() as u8,
        (c1[1] as f32 * (1.0 - t) + c2[1] as f32 * t).round() as u8,
        (c1[2] as f32 * (1.0 - t) + c2[2] as f32 * t).round() as u8,
    ]
}

/// Parse `#RRGGBB` into an opaque colour
pub fn hex_color(hex: &str) -> Option<[u8; 4]> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b, 255])
}

/// Which out-of-range values still get a colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Extend {
    Neither,
    Min,
    Max,
    Both,
}

impl Extend {
    pub fn min(&self) -> bool {
        matches!(self, Extend::Min | Extend::Both)
    }

    pub fn max(&self) -> bool {
        matches!(self, Extend::Max | Extend::Both)
    }
}

/// Discrete fill colours between fixed boundaries
#[derive(Debug, Clone, PartialEq)]
pub struct LevelTable {
    bounds: Vec<f32>,
    /// One colour per interval, `bounds.len() - 1` entries
    colors: Vec<[u8; 4]>,
    under: Option<[u8; 4]>,
    over: Option<[u8; 4]>,
    extend: Extend,
}

impl LevelTable {
    /// Explicit colours per interval; the under/over colours follow `extend`
    pub fn new(
        bounds: Vec<f32>,
        colors: Vec<[u8; 4]>,
        under: Option<[u8; 4]>,
        over: Option<[u8; 4]>,
    ) -> Result<Self> {
        if bounds.len() < 2 || bounds.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SynopticError::InvalidParameter {
                param: "levels".to_string(),
                message: "need at least two strictly increasing boundaries".to_string(),
            });
        }
        if colors.len() != bounds.len() - 1 {
            return Err(SynopticError::InvalidParameter {
                param: "levels".to_string(),
                message: format!(
                    "{} boundaries need {} colours, got {}",
                    bounds.len(),
                    bounds.len() - 1,
                    colors.len()
                ),
            });
        }
        let extend = match (under.is_some(), over.is_some()) {
            (false, false) => Extend::Neither,
            (true, false) => Extend::Min,
            (false, true) => Extend::Max,
            (true, true) => Extend::Both,
        };
        Ok(Self {
            bounds,
            colors,
            under,
            over,
            extend,
        })
    }

    /// Spread a colormap over the intervals, including the extension regions
    pub fn from_colormap(bounds: Vec<f32>, cmap: &dyn Colormap, extend: Extend) -> Result<Self> {
        let intervals = bounds.len().saturating_sub(1);
        let regions = intervals + extend.min() as usize + extend.max() as usize;
        let color_at = |i: usize| {
            let t = if regions > 1 {
                i as f32 / (regions - 1) as f32
            } else {
                0.5
            };
            cmap.map_normalized(t)
        };

        let offset = extend.min() as usize;
        let colors = (0..intervals).map(|i| color_at(i + offset)).collect();
        let under = extend.min().then(|| color_at(0));
        let over = extend.max().then(|| color_at(regions.saturating_sub(1)));
        Self::new(bounds, colors, under, over)
    }

    /// A fixed colour list: one per interval, the next one (if any) for "over"
    pub fn listed(bounds: Vec<f32>, palette: &[[u8; 4]], extend: Extend) -> Result<Self> {
        let intervals = bounds.len().saturating_sub(1);
        if palette.is_empty() {
            return Err(SynopticError::InvalidParameter {
                param: "levels".to_string(),
                message: "empty palette".to_string(),
            });
        }
        let pick = |i: usize| palette[i.min(palette.len() - 1)];
        let offset = extend.min() as usize;
        let colors = (0..intervals).map(|i| pick(i + offset)).collect();
        let under = extend.min().then(|| pick(0));
        let over = extend.max().then(|| pick(intervals + offset));
        Self::new(bounds, colors, under, over)
    }

    /// Evenly spaced boundaries `start, start + step, ...` strictly below `stop`
    pub fn arange(start: f32, stop: f32, step: f32) -> Vec<f32> {
        let count = ((stop - start) / step).ceil().max(0.0) as usize;
        (0..count).map(|i| start + i as f32 * step).collect()
    }

    /// Scale every colour's alpha
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        let scale = |c: &mut [u8; 4]| c[3] = (c[3] as f32 * alpha.clamp(0.0, 1.0)).round() as u8;
        self.colors.iter_mut().for_each(scale);
        self.under.iter_mut().for_each(scale);
        self.over.iter_mut().for_each(scale);
        self
    }

    /// Colour for a value, `None` for NaN or an uncoloured out-of-range value
    pub fn color_for(&self, value: f32) -> Option<[u8; 4]> {
        if value.is_nan() {
            return None;
        }
        let first = self.bounds[0];
        let last = self.bounds[self.bounds.len() - 1];
        if value < first {
            return self.under;
        }
        if value > last {
            return self.over;
        }
        let upper = self.bounds.partition_point(|&b| b <= value);
        let index = upper.saturating_sub(1).min(self.colors.len() - 1);
        Some(self.colors[index])
    }

    pub fn bounds(&self) -> &[f32] {
        &self.bounds
    }

    pub fn colors(&self) -> &[[u8; 4]] {
        &self.colors
    }

    pub fn under(&self) -> Option<[u8; 4]> {
        self.under
    }

    pub fn over(&self) -> Option<[u8; 4]> {
        self.over
    }

    pub fn extend(&self) -> Extend {
        self.extend
    }
}
