//! NetCDF decoding into [`GridField`]s.
//!
//! Works on both the subsets returned by the remote service and the full
//! yearly archive files: dimensions are recognised by conventional names, a
//! single time step and level are selected, the horizontal window is cut to
//! the requested box, and the result is always south-to-north, west-to-east.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ndarray::Array2;
use netcdf::{AttributeValue, Extent, Variable};
use serde::Serialize;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, SynopticError};
use crate::fields::{GridField, Level};
use crate::region::BoundingBox;

/// Relative tolerance when matching level coordinates
const LEVEL_TOLERANCE: f64 = 1.0e-3;

/// Coordinate tolerance when testing box membership (degrees)
const EDGE_TOLERANCE: f64 = 1.0e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisRole {
    Time,
    Level,
    Lat,
    Lon,
    Other,
}

fn classify(name: &str) -> AxisRole {
    let n = name.to_ascii_lowercase();
    if n.starts_with("lat") || n == "y" {
        AxisRole::Lat
    } else if n.starts_with("lon") || n == "x" {
        AxisRole::Lon
    } else if n.starts_with("time") || n == "t" || n == "valid_time" {
        AxisRole::Time
    } else if n.starts_with("lev")
        || n.starts_with("isobaric")
        || n.starts_with("pressure")
        || n.starts_with("plev")
        || n.starts_with("potential_vorticity")
        || n == "pv"
    {
        AxisRole::Level
    } else {
        AxisRole::Other
    }
}

/// Read every requested level of `variable` at `time`, cut to `bbox`.
///
/// Returns one field per level in request order. A missing variable, time,
/// or level, or a box that selects no grid points, is `DataUnavailable`.
pub fn read_fields(
    path: &Path,
    variable: &str,
    time: NaiveDateTime,
    levels: &[Level],
    bbox: &BoundingBox,
) -> Result<Vec<GridField>> {
    let file = open(path)?;
    let var = file
        .variable(variable)
        .ok_or_else(|| SynopticError::unavailable(variable, "any", format!("not found in {}", path.display())))?;

    let layout = Layout::of(&var, variable)?;
    let time_index = match &layout.time {
        Some(dim) => Some(select_time(&file, dim, time, variable)?),
        None => None,
    };
    let window = Window::new(&file, bbox, variable)?;

    let mut fields = Vec::with_capacity(levels.len());
    for level in levels {
        let level_index = select_level(&file, layout.level.as_ref(), level, variable)?;
        let field = read_slice(&var, &layout, &window, time_index, level_index, None, variable)
            .map_err(|e| relabel(e, variable, level))?;
        fields.push(field);
    }

    debug!(
        path = %path.display(),
        variable = variable,
        levels = levels.len(),
        rows = window.rows.len(),
        cols = window.cols.len(),
        "Decoded fields"
    );

    Ok(fields)
}

/// Read every index of the leading non-spatial dimension (e.g. forecast step).
///
/// Used for files whose variables are laid out as `(step, lat, lon)`.
pub fn read_steps(path: &Path, variable: &str, bbox: &BoundingBox) -> Result<Vec<GridField>> {
    let file = open(path)?;
    let var = file
        .variable(variable)
        .ok_or_else(|| SynopticError::unavailable(variable, "all steps", format!("not found in {}", path.display())))?;
    let layout = Layout::of(&var, variable)?;
    let window = Window::new(&file, bbox, variable)?;

    let steps = layout.other.as_ref().map(|d| d.len).unwrap_or(1);
    let time_index = layout.time.as_ref().map(|_| 0);
    let level_index = layout.level.as_ref().map(|_| 0);

    (0..steps)
        .map(|step| {
            let other = layout.other.as_ref().map(|_| step);
            read_slice(&var, &layout, &window, time_index, level_index, other, variable)
        })
        .collect()
}

/// Values of a 1-D variable as f64
pub fn read_axis(path: &Path, name: &str) -> Result<Vec<f64>> {
    let file = open(path)?;
    let var = file
        .variable(name)
        .ok_or_else(|| SynopticError::unavailable(name, "axis", format!("not found in {}", path.display())))?;
    Ok(var.get_values::<f64, _>(..)?)
}

/// Summary of a NetCDF file for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub dimensions: Vec<(String, usize)>,
    pub variables: Vec<VariableSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableSummary {
    pub name: String,
    pub dimensions: Vec<String>,
    pub units: Option<String>,
}

/// List the dimensions and variables of a file
pub fn describe(path: &Path) -> Result<FileSummary> {
    let file = open(path)?;
    let dimensions = file
        .dimensions()
        .map(|d| (d.name().to_string(), d.len()))
        .collect();
    let variables = file
        .variables()
        .map(|v| VariableSummary {
            name: v.name().to_string(),
            dimensions: v.dimensions().iter().map(|d| d.name().to_string()).collect(),
            units: string_attribute(&v, "units"),
        })
        .collect();

    Ok(FileSummary {
        dimensions,
        variables,
    })
}

fn open(path: &Path) -> Result<netcdf::File> {
    if !path.exists() {
        return Err(SynopticError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: {}", path.display()),
        )));
    }
    Ok(netcdf::open(path)?)
}

/// Attach the requested level to errors that were raised without one
fn relabel(err: SynopticError, variable: &str, level: &Level) -> SynopticError {
    match err {
        SynopticError::DataUnavailable { reason, .. } => {
            SynopticError::unavailable(variable, level.to_string(), reason)
        }
        other => other,
    }
}

#[derive(Debug, Clone)]
struct DimInfo {
    name: String,
    len: usize,
}

/// Where each role sits in a variable's dimension list
#[derive(Debug)]
struct Layout {
    roles: Vec<(AxisRole, usize)>,
    time: Option<DimInfo>,
    level: Option<DimInfo>,
    other: Option<DimInfo>,
}

impl Layout {
    fn of(var: &Variable, variable: &str) -> Result<Self> {
        let mut roles = Vec::new();
        let mut time = None;
        let mut level = None;
        let mut other = None;
        let mut lat_pos = None;
        let mut lon_pos = None;

        for (pos, dim) in var.dimensions().iter().enumerate() {
            let info = DimInfo {
                name: dim.name().to_string(),
                len: dim.len(),
            };
            let role = classify(&info.name);
            match role {
                AxisRole::Time => time = Some(info.clone()),
                AxisRole::Level => level = Some(info.clone()),
                AxisRole::Lat => lat_pos = Some(pos),
                AxisRole::Lon => lon_pos = Some(pos),
                AxisRole::Other => {
                    if other.is_some() {
                        return Err(SynopticError::unavailable(
                            variable,
                            "any",
                            format!("unexpected extra dimension {}", info.name),
                        ));
                    }
                    other = Some(info.clone());
                }
            }
            roles.push((role, info.len));
        }

        match (lat_pos, lon_pos) {
            (Some(lat), Some(lon)) if lat < lon => {}
            _ => {
                return Err(SynopticError::unavailable(
                    variable,
                    "any",
                    "expected latitude and longitude dimensions in (lat, lon) order",
                ))
            }
        }

        Ok(Self {
            roles,
            time,
            level,
            other,
        })
    }
}

/// The horizontal selection: source index ranges plus the output ordering
#[derive(Debug)]
struct Window {
    rows: Range<usize>,
    cols: Range<usize>,
    /// Source row for each output row, south to north
    row_order: Vec<usize>,
    /// Source column for each output column, west to east
    col_order: Vec<usize>,
    lat: Vec<f64>,
    lon: Vec<f64>,
}

impl Window {
    fn new(file: &netcdf::File, bbox: &BoundingBox, variable: &str) -> Result<Self> {
        let lat_axis = coordinate_values(file, AxisRole::Lat)
            .ok_or_else(|| SynopticError::unavailable(variable, "any", "no latitude coordinate"))?;
        let lon_axis = coordinate_values(file, AxisRole::Lon)
            .ok_or_else(|| SynopticError::unavailable(variable, "any", "no longitude coordinate"))?;

        let mut lat_sel: Vec<(f64, usize)> = lat_axis
            .iter()
            .enumerate()
            .filter(|(_, &lat)| {
                lat >= bbox.south() - EDGE_TOLERANCE && lat <= bbox.north() + EDGE_TOLERANCE
            })
            .map(|(i, &lat)| (lat, i))
            .collect();
        lat_sel.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut lon_sel: Vec<(f64, usize)> = lon_axis
            .iter()
            .enumerate()
            .filter_map(|(i, &lon)| shift_into(lon, bbox.west(), bbox.east()).map(|l| (l, i)))
            .collect();
        lon_sel.sort_by(|a, b| a.0.total_cmp(&b.0));
        lon_sel.dedup_by(|a, b| (a.0 - b.0).abs() < EDGE_TOLERANCE);

        if lat_sel.is_empty() || lon_sel.is_empty() {
            return Err(SynopticError::unavailable(
                variable,
                "any",
                format!("no grid points inside box {}", bbox),
            ));
        }

        let rows = index_span(lat_sel.iter().map(|(_, i)| *i));
        let cols = index_span(lon_sel.iter().map(|(_, i)| *i));

        Ok(Self {
            rows,
            cols,
            row_order: lat_sel.iter().map(|(_, i)| *i).collect(),
            col_order: lon_sel.iter().map(|(_, i)| *i).collect(),
            lat: lat_sel.iter().map(|(l, _)| *l).collect(),
            lon: lon_sel.iter().map(|(l, _)| *l).collect(),
        })
    }
}

/// Express `lon` in the box's longitude convention, or `None` if it falls outside
fn shift_into(lon: f64, west: f64, east: f64) -> Option<f64> {
    [lon, lon - 360.0, lon + 360.0]
        .into_iter()
        .find(|&l| l >= west - EDGE_TOLERANCE && l <= east + EDGE_TOLERANCE)
}

fn index_span(indices: impl Iterator<Item = usize>) -> Range<usize> {
    let (min, max) = indices.fold((usize::MAX, 0), |(lo, hi), i| (lo.min(i), hi.max(i)));
    min..max + 1
}

/// Values of the coordinate variable for the first dimension with the given role
fn coordinate_values(file: &netcdf::File, role: AxisRole) -> Option<Vec<f64>> {
    let dim = file.dimensions().find(|d| classify(&d.name()) == role)?;
    let name = dim.name().to_string();
    let var = file.variable(&name)?;
    match var.get_values::<f64, _>(..) {
        Ok(values) => Some(values),
        Err(e) => {
            warn!(dimension = %name, error = %e, "Failed to read coordinate values");
            None
        }
    }
}

fn select_time(file: &netcdf::File, dim: &DimInfo, time: NaiveDateTime, variable: &str) -> Result<usize> {
    let times = file.variable(&dim.name).and_then(|var| {
        let units = string_attribute(&var, "units")?;
        let values = var.get_values::<f64, _>(..).ok()?;
        Some(
            values
                .into_iter()
                .map(|v| decode_cf_time(&units, v))
                .collect::<Vec<_>>(),
        )
    });

    if let Some(times) = &times {
        if let Some(index) = times
            .iter()
            .position(|t| t.map(|t| (t - time).num_seconds().abs() < 60).unwrap_or(false))
        {
            return Ok(index);
        }
    }

    if dim.len == 1 {
        debug!(variable = variable, "Single time step, accepting it as the requested time");
        return Ok(0);
    }

    Err(SynopticError::unavailable(
        variable,
        "any",
        format!("time {} not present", time.format("%Y-%m-%d %H:%M")),
    ))
}

fn select_level(
    file: &netcdf::File,
    dim: Option<&DimInfo>,
    level: &Level,
    variable: &str,
) -> Result<Option<usize>> {
    let Some(dim) = dim else {
        return match level {
            Level::Surface => Ok(None),
            _ => Err(SynopticError::unavailable(variable, level.to_string(), "variable has no vertical dimension")),
        };
    };

    let candidates: Vec<f64> = match level {
        Level::Surface => {
            return if dim.len == 1 {
                Ok(Some(0))
            } else {
                Err(SynopticError::unavailable(
                    variable,
                    level.to_string(),
                    format!("variable has {} levels on {}", dim.len, dim.name),
                ))
            };
        }
        Level::Isobaric(hpa) => vec![*hpa as f64, *hpa as f64 * 100.0],
        Level::PotentialVorticity(pvu) => vec![pvu * 1.0e-6, *pvu],
    };

    let values = file
        .variable(&dim.name)
        .and_then(|v| v.get_values::<f64, _>(..).ok())
        .ok_or_else(|| {
            SynopticError::unavailable(variable, level.to_string(), format!("no coordinate values for {}", dim.name))
        })?;

    values
        .iter()
        .position(|&v| {
            candidates
                .iter()
                .any(|&c| (v - c).abs() <= LEVEL_TOLERANCE * c.abs().max(f64::MIN_POSITIVE))
        })
        .map(Some)
        .ok_or_else(|| SynopticError::unavailable(variable, level.to_string(), "level not present"))
}

fn read_slice(
    var: &Variable,
    layout: &Layout,
    window: &Window,
    time: Option<usize>,
    level: Option<usize>,
    other: Option<usize>,
    variable: &str,
) -> Result<GridField> {
    let mut extents: Vec<Extent> = Vec::with_capacity(layout.roles.len());
    for (role, len) in &layout.roles {
        let range = match role {
            AxisRole::Lat => window.rows.clone(),
            AxisRole::Lon => window.cols.clone(),
            AxisRole::Time => single(time, *len, "time", variable)?,
            AxisRole::Level => single(level, *len, "level", variable)?,
            AxisRole::Other => single(other, *len, "step", variable)?,
        };
        extents.push(range.into());
    }

    let raw: Vec<f32> = var.get_values::<f32, _>(extents.as_slice())?;
    let slab = Array2::from_shape_vec((window.rows.len(), window.cols.len()), raw).map_err(|e| {
        SynopticError::unavailable(variable, "any", format!("unexpected slab shape: {}", e))
    })?;

    let mask = Mask::of(var);
    let values = Array2::from_shape_fn((window.row_order.len(), window.col_order.len()), |(r, c)| {
        let raw = slab[[
            window.row_order[r] - window.rows.start,
            window.col_order[c] - window.cols.start,
        ]];
        mask.apply(raw)
    });

    let units = string_attribute(var, "units").unwrap_or_default();
    GridField::new(values, window.lon.clone(), window.lat.clone(), units)
}

fn single(index: Option<usize>, len: usize, what: &str, variable: &str) -> Result<Range<usize>> {
    match index {
        Some(i) if i < len => Ok(i..i + 1),
        None if len == 1 => Ok(0..1),
        _ => Err(SynopticError::unavailable(
            variable,
            "any",
            format!("cannot select a single {} from a dimension of length {}", what, len),
        )),
    }
}

/// Packing and missing-value attributes of a variable
struct Mask {
    scale: f32,
    offset: f32,
    fill: Vec<f32>,
}

impl Mask {
    fn of(var: &Variable) -> Self {
        let fill = ["_FillValue", "missing_value"]
            .iter()
            .filter_map(|name| numeric_attribute(var, name))
            .map(|v| v as f32)
            .collect();
        Self {
            scale: numeric_attribute(var, "scale_factor").unwrap_or(1.0) as f32,
            offset: numeric_attribute(var, "add_offset").unwrap_or(0.0) as f32,
            fill,
        }
    }

    fn apply(&self, raw: f32) -> f32 {
        if !raw.is_finite() || self.fill.iter().any(|&f| f == raw) {
            f32::NAN
        } else {
            raw * self.scale + self.offset
        }
    }
}

fn string_attribute(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn numeric_attribute(var: &Variable, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Uchar(v) => Some(v as f64),
        AttributeValue::Schar(v) => Some(v as f64),
        AttributeValue::Short(v) => Some(v as f64),
        AttributeValue::Ushort(v) => Some(v as f64),
        AttributeValue::Int(v) => Some(v as f64),
        AttributeValue::Uint(v) => Some(v as f64),
        AttributeValue::Float(v) => Some(v as f64),
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Floats(v) => v.first().map(|&x| x as f64),
        AttributeValue::Doubles(v) => v.first().copied(),
        _ => None,
    }
}

/// Decode a CF time value such as `36` with units `hours since 2016-07-19 00:00:00`
pub fn decode_cf_time(units: &str, value: f64) -> Option<NaiveDateTime> {
    let (unit, origin) = units.split_once(" since ")?;
    let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
        "minutes" | "minute" | "mins" | "min" => 60.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => 3_600.0,
        "days" | "day" | "d" => 86_400.0,
        _ => return None,
    };
    let origin = parse_origin(origin.trim())?;
    let offset = (value * seconds_per_unit).round();
    if !offset.is_finite() {
        return None;
    }
    origin.checked_add_signed(Duration::seconds(offset as i64))
}

fn parse_origin(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim_end_matches('Z').trim_end_matches(" UTC").trim();
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
