//! Region and initialization-time selection.
//!
//! Turns what the form submits (a preset name or a literal `W, E, S, N` box,
//! and a `YYYYMMDDHH` string) into validated values for the loader.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::error::{Result, SynopticError};

/// A geographic box in degrees: west, east, south, north.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    west: f64,
    east: f64,
    south: f64,
    north: f64,
}

impl BoundingBox {
    /// Build a validated box
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Result<Self> {
        if ![west, east, south, north].iter().all(|v| v.is_finite()) {
            return Err(SynopticError::InvalidRegion {
                message: "bounds must be finite numbers".to_string(),
            });
        }
        if west >= east {
            return Err(SynopticError::InvalidRegion {
                message: format!("west ({}) must be less than east ({})", west, east),
            });
        }
        if south >= north {
            return Err(SynopticError::InvalidRegion {
                message: format!("south ({}) must be less than north ({})", south, north),
            });
        }
        if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
            return Err(SynopticError::InvalidRegion {
                message: "latitude must be in the range -90 to 90".to_string(),
            });
        }

        Ok(Self {
            west,
            east,
            south,
            north,
        })
    }

    /// Parse "W, E, S, N". Commas and whitespace are both accepted as separators.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens: Vec<&str> = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.len() != 4 {
            return Err(SynopticError::InvalidRegion {
                message: format!(
                    "expected 4 numbers [West, East, South, North], got {}",
                    tokens.len()
                ),
            });
        }

        let mut bounds = [0.0f64; 4];
        for (slot, token) in bounds.iter_mut().zip(&tokens) {
            *slot = token.parse::<f64>().map_err(|_| SynopticError::InvalidRegion {
                message: format!("not a number: {}", token),
            })?;
        }

        Self::new(bounds[0], bounds[1], bounds[2], bounds[3])
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    /// Bounds in `[west, east, south, north]` order
    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.east, self.south, self.north]
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.west, self.east, self.south, self.north
        )
    }
}

/// An ordered list of named regions offered by a dashboard
#[derive(Debug, Clone, Serialize)]
pub struct RegionPresets {
    entries: Vec<(String, BoundingBox)>,
}

impl RegionPresets {
    pub fn new(entries: Vec<(String, BoundingBox)>) -> Self {
        Self { entries }
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&BoundingBox> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name.trim()))
            .map(|(_, bbox)| bbox)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundingBox)> {
        self.entries.iter().map(|(name, bbox)| (name.as_str(), bbox))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn preset(name: &str, w: f64, e: f64, s: f64, n: f64) -> (String, BoundingBox) {
    let bbox = BoundingBox { west: w, east: e, south: s, north: n };
    (name.to_string(), bbox)
}

/// Regions for the reanalysis dashboard, China and its sub-regions
pub fn china_regions() -> RegionPresets {
    RegionPresets::new(vec![
        preset("china", 70.0, 140.0, 8.0, 60.0),
        preset("china_land", 73.0, 136.0, 17.0, 54.0),
        preset("north_china", 103.0, 129.0, 30.0, 50.0),
        preset("northeast_china", 103.0, 140.0, 32.0, 58.0),
        preset("east_china", 107.0, 130.0, 20.0, 41.0),
        preset("central_china", 100.0, 123.0, 22.0, 42.0),
        preset("south_china", 100.0, 126.0, 12.0, 30.0),
        preset("southwest_china", 82.0, 111.0, 18.0, 40.0),
        preset("northwest_china", 72.0, 108.0, 28.0, 51.0),
        preset("xinjiang", 70.0, 98.0, 31.0, 51.0),
        preset("tibet", 72.0, 106.0, 24.0, 42.0),
    ])
}

/// Regions for the EFI dashboard
pub fn global_regions() -> RegionPresets {
    RegionPresets::new(vec![
        preset("china", 70.0, 140.0, 8.0, 60.0),
        preset("east_asia", 60.0, 160.0, 0.0, 70.0),
        preset("asia", 40.0, 180.0, -10.0, 80.0),
        preset("europe", -20.0, 60.0, 30.0, 75.0),
        preset("north_america", -170.0, -50.0, 10.0, 75.0),
        preset("south_america", -90.0, -30.0, -60.0, 15.0),
        preset("africa", -20.0, 55.0, -38.0, 38.0),
        preset("australia", 105.0, 180.0, -50.0, 0.0),
        preset("northern_hemisphere", 0.0, 360.0, 0.0, 90.0),
        preset("global", 0.0, 360.0, -90.0, 90.0),
    ])
}

/// Resolve a preset name, falling back to a literal "W, E, S, N" box
pub fn resolve_region(presets: &RegionPresets, choice: &str) -> Result<BoundingBox> {
    if let Some(bbox) = presets.get(choice) {
        return Ok(*bbox);
    }

    BoundingBox::parse(choice).map_err(|e| match e {
        SynopticError::InvalidRegion { message } => SynopticError::InvalidRegion {
            message: format!(
                "'{}' is neither a preset ({}) nor a valid box: {}",
                choice,
                presets.names().collect::<Vec<_>>().join(", "),
                message
            ),
        },
        other => other,
    })
}

/// The time range a data provider can serve
#[derive(Debug, Clone)]
pub struct TimeRange {
    /// Provider name used in error messages
    pub name: &'static str,
    /// Earliest initialization time available
    pub earliest: NaiveDateTime,
    /// How far behind "now" the newest data lags
    pub latency: Duration,
    /// Allowed hours of day (UTC)
    pub hours: &'static [u32],
}

impl TimeRange {
    /// NCEP CFSR reanalysis: 4x daily since 1979, available two days behind
    pub fn cfsr() -> Self {
        Self {
            name: "CFSR",
            earliest: midnight(1979, 1, 1),
            latency: Duration::days(2),
            hours: &[0, 6, 12, 18],
        }
    }

    /// ECMWF ensemble extreme forecast index, 00 and 12 UTC runs
    pub fn efi() -> Self {
        Self {
            name: "ECMWF EFI",
            earliest: midnight(2000, 1, 1),
            latency: Duration::zero(),
            hours: &[0, 12],
        }
    }

    /// Latest time the provider can serve given the current time
    pub fn latest(&self, now: NaiveDateTime) -> NaiveDateTime {
        now - self.latency
    }
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Parse a `YYYYMMDDHH` initialization time and check it against the provider range
pub fn parse_init_time(text: &str, range: &TimeRange, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let text = text.trim();
    if text.len() != 10 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SynopticError::InvalidTime {
            message: format!("'{}' does not match YYYYMMDDHH", text),
        });
    }

    let date = NaiveDate::parse_from_str(&text[..8], "%Y%m%d").map_err(|e| {
        SynopticError::InvalidTime {
            message: format!("'{}' is not a calendar date: {}", &text[..8], e),
        }
    })?;
    let hour: u32 = text[8..].parse().map_err(|_| SynopticError::InvalidTime {
        message: format!("invalid hour in '{}'", text),
    })?;
    let time = date
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| SynopticError::InvalidTime {
            message: format!("hour {} is out of range", hour),
        })?;

    if !range.hours.contains(&time.hour()) {
        return Err(SynopticError::InvalidTime {
            message: format!(
                "{} provides {:?} UTC only, got {:02}",
                range.name,
                range.hours,
                time.hour()
            ),
        });
    }

    if time < range.earliest {
        return Err(SynopticError::InvalidTime {
            message: format!(
                "{} starts at {}, requested {}",
                range.name,
                range.earliest.format("%Y-%m-%d %H:%M"),
                time.format("%Y-%m-%d %H:%M")
            ),
        });
    }

    let latest = range.latest(now);
    if time > latest {
        return Err(SynopticError::InvalidTime {
            message: format!(
                "{} is available up to {}, requested {}",
                range.name,
                latest.format("%Y-%m-%d %H:%M"),
                time.format("%Y-%m-%d %H:%M")
            ),
        });
    }

    Ok(time)
}
