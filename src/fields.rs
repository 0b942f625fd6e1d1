//! Gridded fields and the per-request field set.
//!
//! A [`GridField`] is a 2-D array indexed `[lat, lon]` with its own coordinate
//! axes. Both axes are ascending: row 0 is the southernmost latitude, column 0
//! the westernmost longitude. A [`FieldSet`] keeps fields in insertion order
//! under short aliases such as `u500` or `mslp`.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use ndarray::Array2;
use serde::Serialize;

use crate::error::{Result, SynopticError};

/// Vertical coordinate of a field
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Level {
    /// Pressure level in hPa
    Isobaric(u32),
    /// Potential vorticity surface in PVU (1 PVU = 1e-6 K m2 kg-1 s-1)
    PotentialVorticity(f64),
    /// Single-level field (surface, column integral, sea level)
    Surface,
}

impl Level {
    /// Value of this level on the dataset's vertical axis, if it has one
    pub fn coordinate(&self) -> Option<f64> {
        match self {
            Level::Isobaric(hpa) => Some(*hpa as f64),
            Level::PotentialVorticity(pvu) => Some(pvu * 1.0e-6),
            Level::Surface => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Isobaric(hpa) => write!(f, "{}hPa", hpa),
            Level::PotentialVorticity(pvu) => write!(f, "{}PVU", pvu),
            Level::Surface => write!(f, "surface"),
        }
    }
}

/// Identifies one loaded quantity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldKey {
    /// Dataset variable code (e.g. `t`, `pmsl`)
    pub variable: String,
    pub level: Level,
    /// Valid time
    pub time: NaiveDateTime,
}

/// A 2-D field on a regular latitude/longitude grid
#[derive(Debug, Clone)]
pub struct GridField {
    values: Array2<f32>,
    lon: Vec<f64>,
    lat: Vec<f64>,
    units: String,
}

impl GridField {
    /// Create a field, checking that the axes match the array shape and are ascending
    pub fn new(values: Array2<f32>, lon: Vec<f64>, lat: Vec<f64>, units: impl Into<String>) -> Result<Self> {
        let (rows, cols) = values.dim();
        if rows != lat.len() || cols != lon.len() {
            return Err(SynopticError::InvalidParameter {
                param: "grid".to_string(),
                message: format!(
                    "array shape ({}, {}) does not match axes (lat={}, lon={})",
                    rows,
                    cols,
                    lat.len(),
                    lon.len()
                ),
            });
        }
        if !is_ascending(&lon) || !is_ascending(&lat) {
            return Err(SynopticError::InvalidParameter {
                param: "grid".to_string(),
                message: "coordinate axes must be strictly ascending".to_string(),
            });
        }

        Ok(Self {
            values,
            lon,
            lat,
            units: units.into(),
        })
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    /// (rows, cols) = (lat, lon)
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Whether two fields share the same coordinate axes
    pub fn same_grid(&self, other: &GridField) -> bool {
        self.lon == other.lon && self.lat == other.lat
    }

    /// A new field on the same grid with different values and units
    pub fn with_values(&self, values: Array2<f32>, units: impl Into<String>) -> Result<Self> {
        Self::new(values, self.lon.clone(), self.lat.clone(), units)
    }

    /// Apply a function to every value
    pub fn map(&self, f: impl Fn(f32) -> f32, units: impl Into<String>) -> GridField {
        GridField {
            values: self.values.mapv(f),
            lon: self.lon.clone(),
            lat: self.lat.clone(),
            units: units.into(),
        }
    }

    /// Minimum and maximum of the finite values
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in self.values.iter() {
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
            }
        }
        (min <= max).then_some((min, max))
    }

    /// Fractional (row, col) position of a coordinate, `None` outside the grid
    pub fn fractional_index(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let col = axis_position(&self.lon, lon)?;
        let row = axis_position(&self.lat, lat)?;
        Some((row, col))
    }

    /// Coordinate at a fractional (row, col) position
    pub fn coordinate_at(&self, row: f64, col: f64) -> (f64, f64) {
        (axis_value(&self.lon, col), axis_value(&self.lat, row))
    }
}

fn is_ascending(axis: &[f64]) -> bool {
    axis.windows(2).all(|w| w[0] < w[1])
}

/// Fractional index of `value` on an ascending axis
fn axis_position(axis: &[f64], value: f64) -> Option<f64> {
    match axis.len() {
        0 => None,
        1 => ((axis[0] - value).abs() < 1e-9).then_some(0.0),
        n => {
            if value < axis[0] || value > axis[n - 1] {
                return None;
            }
            let upper = axis.partition_point(|&a| a < value).clamp(1, n - 1);
            let lower = upper - 1;
            let span = axis[upper] - axis[lower];
            Some(lower as f64 + (value - axis[lower]) / span)
        }
    }
}

/// Coordinate value at a fractional index, extrapolating linearly past the ends
fn axis_value(axis: &[f64], index: f64) -> f64 {
    match axis.len() {
        0 => f64::NAN,
        1 => axis[0],
        n => {
            let lower = (index.floor().max(0.0) as usize).min(n - 2);
            let t = index - lower as f64;
            axis[lower] + (axis[lower + 1] - axis[lower]) * t
        }
    }
}

/// The fields loaded for one render, keyed by alias in load order
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    fields: IndexMap<String, (FieldKey, GridField)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, key: FieldKey, field: GridField) {
        self.fields.insert(alias.into(), (key, field));
    }

    pub fn get(&self, alias: &str) -> Option<&GridField> {
        self.fields.get(alias).map(|(_, field)| field)
    }

    /// Get a field or fail with `DataUnavailable`
    pub fn require(&self, alias: &str) -> Result<&GridField> {
        self.get(alias)
            .ok_or_else(|| SynopticError::unavailable(alias, "any", "not present in the field set"))
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.fields.contains_key(alias)
    }

    /// Aliases in load order
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn sample() -> GridField {
        GridField::new(
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            vec![100.0, 110.0, 120.0],
            vec![20.0, 30.0],
            "K",
        )
        .unwrap()
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = GridField::new(array![[1.0, 2.0]], vec![0.0, 1.0, 2.0], vec![0.0], "K");
        assert!(err.is_err());
    }

    #[test]
    fn test_descending_axis_rejected() {
        let err = GridField::new(array![[1.0], [2.0]], vec![0.0], vec![30.0, 20.0], "K");
        assert!(err.is_err());
    }

    #[test]
    fn test_fractional_index() {
        let field = sample();
        assert_eq!(field.fractional_index(100.0, 20.0), Some((0.0, 0.0)));
        assert_eq!(field.fractional_index(115.0, 25.0), Some((0.5, 1.5)));
        assert_eq!(field.fractional_index(99.0, 25.0), None);
        assert_eq!(field.coordinate_at(0.5, 1.5), (115.0, 25.0));
    }

    #[test]
    fn test_finite_range_ignores_nan() {
        let field = sample().map(|v| if v > 5.0 { f32::NAN } else { v }, "K");
        assert_eq!(field.finite_range(), Some((1.0, 5.0)));
    }

    #[test]
    fn test_field_set_preserves_insertion_order() {
        let time = NaiveDate::from_ymd_opt(2016, 7, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut set = FieldSet::new();
        for alias in ["u200", "mslp", "gh500"] {
            let key = FieldKey {
                variable: alias.to_string(),
                level: Level::Surface,
                time,
            };
            set.insert(alias, key, sample());
        }

        assert_eq!(set.aliases().collect::<Vec<_>>(), vec!["u200", "mslp", "gh500"]);
        assert!(set.require("pwat").is_err());
        assert!(set.require("mslp").is_ok());
    }

    #[test]
    fn test_level_display_and_coordinate() {
        assert_eq!(Level::Isobaric(500).to_string(), "500hPa");
        assert_eq!(Level::Isobaric(500).coordinate(), Some(500.0));
        assert_eq!(Level::PotentialVorticity(2.0).coordinate(), Some(2.0e-6));
        assert_eq!(Level::Surface.coordinate(), None);
    }
}
