//! NetCDF fixtures laid out like the real archives.
//!
//! The CFSR writer produces one yearly file per variable code under
//! `{root}/{year}/{code}.{year}.0p5.anl.nc`, each holding two analysis
//! times. The EFI writer produces `{root}/{init}/{init}.EFI.240.nc`.

use chrono::{Datelike, NaiveDateTime};
use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Pressure levels written to the isobaric files, hPa
pub const PRESSURE_LEVELS: [f64; 5] = [200.0, 500.0, 700.0, 850.0, 925.0];

/// Grid spacing of the fixtures in degrees
pub const GRID_STEP: f64 = 2.5;

/// Variable codes of the CFSR archive
pub const CFSR_CODES: [&str; 9] = ["u", "v", "w", "pres_pv", "g", "t", "q", "pmsl", "pwat"];

fn longitudes() -> Vec<f64> {
    // 60E to 150E
    (0..=36).map(|i| 60.0 + i as f64 * GRID_STEP).collect()
}

fn latitudes() -> Vec<f64> {
    // north to south, as in the archive
    (0..=28).map(|i| 70.0 - i as f64 * GRID_STEP).collect()
}

/// A smooth wave pattern in [-1, 1]
fn wave(lon: f64, lat: f64, phase: f32) -> f32 {
    let x = (lon as f32 - 60.0) / 90.0;
    let y = (lat as f32) / 70.0;
    0.5 * ((x * 2.0 * PI + phase).sin() + (y * PI * 1.5 - phase).cos())
}

/// Native-unit value of a code at a pressure level (hPa; 0 for single-level)
fn sample(code: &str, level: f64, lon: f64, lat: f64, time_index: usize) -> f32 {
    let w = wave(lon, lat, time_index as f32 * 0.3);
    let cool = (lat as f32) / 70.0;
    match code {
        "u" => 8.0 + 30.0 * (1.0 - level as f32 / 1000.0) + 12.0 * w,
        "v" => 10.0 * wave(lon, lat, 1.3),
        "w" => 0.6 * w,
        "pres_pv" => 30_000.0 + 8_000.0 * w,
        "g" => {
            // standard-atmosphere heights, 200 hPa ~ 11800 gpm, 925 hPa ~ 800 gpm
            let base = 44_330.8 * (1.0 - (level as f32 / 1013.25).powf(0.190_263));
            base - 120.0 * cool + 60.0 * w
        }
        "t" => 288.15 - 6.5e-3 * 44_330.8 * (1.0 - (level as f32 / 1013.25).powf(0.190_263)) - 15.0 * cool + 3.0 * w,
        "q" => (0.012 * (level as f32 / 1000.0).powi(3) * (1.1 - cool)).max(1.0e-5) * (1.0 + 0.2 * w),
        "pmsl" => 101_000.0 + 1_500.0 * w,
        "pwat" => 20.0 + 30.0 * (1.0 - cool) + 8.0 * w,
        _ => 0.0,
    }
}

/// The second analysis time in each file is `time`; the first is six hours earlier
fn write_code_file(path: &Path, code: &str, time: NaiveDateTime) -> Result<()> {
    let lon = longitudes();
    let lat = latitudes();
    let hours_since_year = (time - year_start(time)).num_hours() as f64;
    let times = [hours_since_year - 6.0, hours_since_year];

    let mut file = netcdf::create(path)?;
    file.add_dimension("time", times.len())?;
    file.add_dimension("lat", lat.len())?;
    file.add_dimension("lon", lon.len())?;

    let mut time_var = file.add_variable::<f64>("time", &["time"])?;
    time_var.put_attribute("units", format!("hours since {}-01-01 00:00:00", time.year()))?;
    time_var.put_values(&times, ..)?;

    let mut lat_var = file.add_variable::<f64>("lat", &["lat"])?;
    lat_var.put_attribute("units", "degrees_north")?;
    lat_var.put_values(&lat, ..)?;

    let mut lon_var = file.add_variable::<f64>("lon", &["lon"])?;
    lon_var.put_attribute("units", "degrees_east")?;
    lon_var.put_values(&lon, ..)?;

    let levels: Vec<f64> = match code {
        "pmsl" | "pwat" => vec![],
        "pres_pv" => vec![-2.0e-6, 2.0e-6],
        _ => PRESSURE_LEVELS.to_vec(),
    };

    let units = match code {
        "u" | "v" => "m/s",
        "w" => "Pa/s",
        "pres_pv" | "pmsl" => "Pa",
        "g" => "gpm",
        "t" => "K",
        "q" => "kg/kg",
        "pwat" => "kg m-2",
        _ => "1",
    };

    let mut values = Vec::new();
    if levels.is_empty() {
        for ti in 0..times.len() {
            for &y in &lat {
                for &x in &lon {
                    values.push(sample(code, 0.0, x, y, ti));
                }
            }
        }
        let mut var = file.add_variable::<f32>(code, &["time", "lat", "lon"])?;
        var.put_attribute("units", units)?;
        var.put_values(&values, ..)?;
    } else {
        let level_dim = if code == "pres_pv" { "pv" } else { "lev" };
        file.add_dimension(level_dim, levels.len())?;
        let mut level_var = file.add_variable::<f64>(level_dim, &[level_dim])?;
        level_var.put_values(&levels, ..)?;

        for ti in 0..times.len() {
            for &level in &levels {
                for &y in &lat {
                    for &x in &lon {
                        values.push(sample(code, level, x, y, ti));
                    }
                }
            }
        }
        let mut var = file.add_variable::<f32>(code, &["time", level_dim, "lat", "lon"])?;
        var.put_attribute("units", units)?;
        var.put_values(&values, ..)?;
    }
    Ok(())
}

fn year_start(time: NaiveDateTime) -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(time.year(), 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
}

/// Path of one archive file
pub fn cfsr_path(root: &Path, code: &str, time: NaiveDateTime) -> PathBuf {
    root.join(time.year().to_string())
        .join(format!("{}.{}.0p5.anl.nc", code, time.year()))
}

/// Write every CFSR code for the year of `time`, skipping codes in `skip`
pub fn write_cfsr_archive(root: &Path, time: NaiveDateTime, skip: &[&str]) -> Result<()> {
    fs::create_dir_all(root.join(time.year().to_string()))?;
    for code in CFSR_CODES.iter().filter(|c| !skip.contains(c)) {
        write_code_file(&cfsr_path(root, code, time), code, time)?;
    }
    Ok(())
}

/// Write an EFI file with three 24 h steps over 60-160E, 0-60N
pub fn write_efi_archive(root: &Path, init: &str, short_name: &str, with_sot: bool) -> Result<PathBuf> {
    let dir = root.join(init);
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.EFI.240.nc", init));

    let lon: Vec<f64> = (0..=20).map(|i| 60.0 + i as f64 * 5.0).collect();
    let lat: Vec<f64> = (0..=12).map(|i| 60.0 - i as f64 * 5.0).collect();

    let mut file = netcdf::create(&path)?;
    file.add_dimension("step", 3)?;
    file.add_dimension("lat", lat.len())?;
    file.add_dimension("lon", lon.len())?;

    file.add_variable::<f64>("lat", &["lat"])?.put_values(&lat, ..)?;
    file.add_variable::<f64>("lon", &["lon"])?.put_values(&lon, ..)?;
    file.add_variable::<f64>("step_start", &["step"])?
        .put_values(&[0.0, 24.0, 48.0], ..)?;
    file.add_variable::<f64>("step_end", &["step"])?
        .put_values(&[24.0, 48.0, 72.0], ..)?;

    let mut efi = Vec::new();
    let mut sot = Vec::new();
    for step in 0..3 {
        for &y in &lat {
            for &x in &lon {
                let w = wave(x, y, step as f32);
                efi.push(0.95 * w);
                sot.push(4.0 * w + 2.0);
            }
        }
    }
    file.add_variable::<f32>(&format!("efi_{}", short_name), &["step", "lat", "lon"])?
        .put_values(&efi, ..)?;
    if with_sot {
        file.add_variable::<f32>(&format!("sot_{}", short_name), &["step", "lat", "lon"])?
            .put_values(&sot, ..)?;
    }
    Ok(path)
}
