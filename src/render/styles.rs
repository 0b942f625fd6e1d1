//! Fixed styling of every chart layer.
//!
//! Fill tables are built on demand since `LevelTable` validates its inputs.

use super::canvas::{LineStyle, QuiverStyle};
use super::colormap::{get_colormap, hex_color, Extend, LevelTable, PiecewiseColormap};
use crate::error::Result;

const BLACK: [u8; 4] = [0, 0, 0, 255];
const RED: [u8; 4] = [255, 0, 0, 255];

/// Inclusive range of evenly spaced levels
fn stepped(start: f32, stop: f32, step: f32) -> Vec<f32> {
    LevelTable::arange(start, stop + step * 0.5, step)
}

// composite layers

/// 850 hPa temperature, degC
pub fn t850_fill() -> Result<LevelTable> {
    let cmap = get_colormap("jet")?;
    Ok(LevelTable::from_colormap(LevelTable::arange(-40.0, 40.0, 1.0), cmap.as_ref(), Extend::Both)?.with_alpha(0.1))
}

/// Precipitable water, mm
pub fn pwat_fill() -> Result<LevelTable> {
    let ramp = PiecewiseColormap::new(
        "pwat",
        vec![
            (0.0, [255, 255, 255]),
            (20.0, [255, 255, 255]),
            (20.0, [205, 255, 205]),
            (34.0, [0, 255, 0]),
            (67.0, [0, 115, 0]),
        ],
    )?;
    let bounds = LevelTable::arange(20.0, 71.0, 0.5);
    let colors = bounds[..bounds.len() - 1]
        .iter()
        .map(|&b| {
            let c = ramp.at(b);
            [c[0], c[1], c[2], 255]
        })
        .collect();
    let top = ramp.at(bounds[bounds.len() - 1]);
    Ok(LevelTable::new(bounds, colors, None, Some([top[0], top[1], top[2], 255]))?.with_alpha(0.9))
}

/// Upper-level wind speed, m/s
pub fn wind200_fill() -> Result<LevelTable> {
    let palette: Vec<[u8; 4]> = ["#99E3FB", "#47B6FB", "#0F77F7", "#AC97F5", "#A267F4", "#9126F5", "#E118F3", "#E118F3"]
        .iter()
        .filter_map(|h| hex_color(h))
        .collect();
    let bounds = vec![40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 110.0];
    LevelTable::listed(bounds, &palette, Extend::Max)
}

/// Smoothed 500 hPa relative vorticity, 1e-5 s-1
pub fn vorticity_fill() -> Result<LevelTable> {
    let cmap = get_colormap("autumn_r")?;
    Ok(LevelTable::from_colormap(LevelTable::arange(2.0, 20.0, 1.0), cmap.as_ref(), Extend::Max)?.with_alpha(0.3))
}

pub fn mslp_levels() -> Vec<f32> {
    stepped(960.0, 1040.0, 4.0)
}

pub const MSLP_LINE: LineStyle = LineStyle {
    color: [255, 0, 0, 230],
    width: 0.8,
};

/// 500 hPa geopotential height, dam
pub fn gh500_levels() -> Vec<f32> {
    LevelTable::arange(480.0, 612.0, 4.0)
}

pub const GH500_LINE: LineStyle = LineStyle {
    color: BLACK,
    width: 2.0,
};

pub const WIND850_QUIVER: QuiverStyle = QuiverStyle {
    columns: 38,
    rows: 30,
    scale: 820.0,
    color: [0, 0, 0, 128],
};

/// Window half-width, in grid cells, of the high/low search
pub const EXTREMA_RADIUS: usize = 10;

// extreme forecast index

/// EFI in [-1, 1]; values between -0.5 and 0.5 stay transparent
pub fn efi_fill() -> Result<LevelTable> {
    let bounds = vec![-1.0, -0.9, -0.8, -0.7, -0.6, -0.5, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
    let colors = vec![
        [8, 48, 107, 255],
        [8, 81, 156, 255],
        [33, 113, 181, 255],
        [66, 146, 198, 255],
        [107, 174, 214, 255],
        [0, 0, 0, 0],
        [255, 255, 0, 255],
        [255, 170, 0, 255],
        [255, 0, 0, 255],
        [180, 0, 0, 255],
        [128, 0, 128, 255],
    ];
    LevelTable::new(bounds, colors, None, None)
}

pub const SOT_LEVELS: [f32; 5] = [0.0, 1.0, 2.0, 4.0, 8.0];

pub const SOT_LINE: LineStyle = LineStyle {
    color: BLACK,
    width: 1.5,
};

// single panels

pub fn temperature_fill() -> Result<LevelTable> {
    let cmap = get_colormap("rd_bu_r")?;
    LevelTable::from_colormap(stepped(-40.0, 40.0, 2.0), cmap.as_ref(), Extend::Both)
}

pub fn relative_humidity_fill() -> Result<LevelTable> {
    let cmap = get_colormap("br_bg")?;
    LevelTable::from_colormap(stepped(0.0, 100.0, 10.0), cmap.as_ref(), Extend::Neither)
}

/// Specific humidity, g/kg
pub fn specific_humidity_fill() -> Result<LevelTable> {
    let cmap = get_colormap("greens")?;
    LevelTable::from_colormap(stepped(2.0, 20.0, 2.0), cmap.as_ref(), Extend::Max)
}

/// Vertical velocity, Pa/s; ascent is negative
pub fn vertical_velocity_fill() -> Result<LevelTable> {
    let cmap = get_colormap("rd_bu")?;
    LevelTable::from_colormap(stepped(-2.0, 2.0, 0.25), cmap.as_ref(), Extend::Both)
}

/// Pressure on the 2 PVU surface, hPa
pub fn pv_pressure_fill() -> Result<LevelTable> {
    let cmap = get_colormap("spectral")?;
    LevelTable::from_colormap(stepped(100.0, 600.0, 25.0), cmap.as_ref(), Extend::Both)
}

/// Lower and mid level wind speed, m/s
pub fn wind_fill() -> Result<LevelTable> {
    let cmap = get_colormap("yl_gn_bu")?;
    let bounds = vec![4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0, 20.0, 24.0, 28.0, 32.0];
    LevelTable::from_colormap(bounds, cmap.as_ref(), Extend::Max)
}

pub fn mslp_fill() -> Result<LevelTable> {
    let cmap = get_colormap("spectral_r")?;
    LevelTable::from_colormap(stepped(960.0, 1044.0, 4.0), cmap.as_ref(), Extend::Both)
}

/// Height contours in dam for the level's panel
pub fn height_levels(level: u32) -> Vec<f32> {
    match level {
        200 => stepped(1080.0, 1280.0, 8.0),
        700 => stepped(260.0, 332.0, 4.0),
        _ => gh500_levels(),
    }
}

pub const HEIGHT_LINE: LineStyle = LineStyle {
    color: BLACK,
    width: 1.5,
};

/// Temperature contours over a height fill
pub fn isotherm_levels() -> Vec<f32> {
    stepped(-48.0, 40.0, 4.0)
}

pub const ISOTHERM_LINE: LineStyle = LineStyle { color: RED, width: 1.0 };

/// Arrow grid for the single wind panels
pub const PANEL_QUIVER: QuiverStyle = QuiverStyle {
    columns: 30,
    rows: 24,
    scale: 500.0,
    color: BLACK,
};
