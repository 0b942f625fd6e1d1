//! Derived quantities computed from loaded fields.
//!
//! Everything here is pure: no I/O, no shared state. Arrays are indexed
//! `[lat, lon]` with latitude ascending, matching [`GridField`].

use ndarray::{Array1, Array2, Axis, Zip};

use crate::error::{Result, SynopticError};
use crate::fields::GridField;

/// Mean earth radius used for grid spacing (m)
pub const EARTH_RADIUS: f64 = 6_371_229.0;

/// Ratio of the molecular weights of water vapour and dry air
pub const EPSILON: f64 = 0.621_956_9;

/// Default Gaussian smoothing width for vorticity, in grid cells
pub const DEFAULT_VORTICITY_SIGMA: f64 = 5.0;

/// Display scaling for vorticity (1e-5 s-1 units)
pub const VORTICITY_SCALE: f64 = 1.0e5;

fn ensure_same_grid(a: &GridField, b: &GridField, what: &str) -> Result<()> {
    if a.same_grid(b) {
        Ok(())
    } else {
        Err(SynopticError::InvalidParameter {
            param: what.to_string(),
            message: "fields do not share a grid".to_string(),
        })
    }
}

/// Horizontal wind speed from u and v components
pub fn wind_speed(u: &GridField, v: &GridField) -> Result<GridField> {
    ensure_same_grid(u, v, "wind")?;
    let speed = Zip::from(u.values())
        .and(v.values())
        .map_collect(|&u, &v| u.hypot(v));
    u.with_values(speed, "m/s")
}

/// Saturation vapour pressure over water (hPa), Bolton (1980)
pub fn saturation_vapor_pressure(temperature_c: f64) -> f64 {
    6.112 * (17.67 * temperature_c / (temperature_c + 243.5)).exp()
}

/// Specific humidity (kg/kg) of saturated air at the given pressure and temperature
pub fn saturation_specific_humidity(pressure_hpa: f64, temperature_c: f64) -> f64 {
    let es = saturation_vapor_pressure(temperature_c);
    let ws = EPSILON * es / (pressure_hpa - es);
    ws / (1.0 + ws)
}

/// Relative humidity (%) from specific humidity at one pressure
pub fn relative_humidity_value(pressure_hpa: f64, temperature_c: f64, specific_humidity: f64) -> f64 {
    let w = specific_humidity / (1.0 - specific_humidity);
    let e = pressure_hpa * w / (EPSILON + w);
    let es = saturation_vapor_pressure(temperature_c);
    (100.0 * e / es).clamp(0.0, 100.0)
}

/// Relative humidity (%) on a pressure level from temperature (°C) and specific humidity (kg/kg)
pub fn relative_humidity(
    pressure_hpa: f64,
    temperature_c: &GridField,
    specific_humidity: &GridField,
) -> Result<GridField> {
    ensure_same_grid(temperature_c, specific_humidity, "relative_humidity")?;
    let rh = Zip::from(temperature_c.values())
        .and(specific_humidity.values())
        .map_collect(|&t, &q| {
            if t.is_finite() && q.is_finite() {
                relative_humidity_value(pressure_hpa, t as f64, q as f64) as f32
            } else {
                f32::NAN
            }
        });
    temperature_c.with_values(rh, "%")
}

/// Grid spacings (m) on a sphere.
///
/// Returns `(dx, dy)`: `dx` has shape `[lat, lon - 1]`, `dy` has `[lat - 1, lon]`.
pub fn lat_lon_grid_deltas(lon: &[f64], lat: &[f64]) -> (Array2<f64>, Array2<f64>) {
    let ny = lat.len();
    let nx = lon.len();

    let mut dx = Array2::zeros((ny, nx.saturating_sub(1)));
    for (j, &phi) in lat.iter().enumerate() {
        let coslat = phi.to_radians().cos();
        for i in 0..nx.saturating_sub(1) {
            dx[[j, i]] = EARTH_RADIUS * coslat * (lon[i + 1] - lon[i]).to_radians();
        }
    }

    let mut dy = Array2::zeros((ny.saturating_sub(1), nx));
    for j in 0..ny.saturating_sub(1) {
        let d = EARTH_RADIUS * (lat[j + 1] - lat[j]).to_radians();
        for i in 0..nx {
            dy[[j, i]] = d;
        }
    }

    (dx, dy)
}

/// Derivative of `f` along `axis` with non-uniform spacing `delta`.
///
/// Interior points use the second-order three-point formula, edges a
/// one-sided first difference.
fn gradient(f: &Array2<f64>, delta: &Array2<f64>, axis: usize) -> Array2<f64> {
    let (ny, nx) = f.dim();
    let n = if axis == 0 { ny } else { nx };
    let mut out = Array2::zeros((ny, nx));
    if n < 2 {
        return out;
    }

    let at = |a: &Array2<f64>, k: usize, m: usize| {
        if axis == 0 {
            a[[k, m]]
        } else {
            a[[m, k]]
        }
    };
    let other = if axis == 0 { nx } else { ny };

    for m in 0..other {
        for k in 0..n {
            let value = if k == 0 {
                (at(f, 1, m) - at(f, 0, m)) / at(delta, 0, m)
            } else if k == n - 1 {
                (at(f, n - 1, m) - at(f, n - 2, m)) / at(delta, n - 2, m)
            } else {
                let h0 = at(delta, k - 1, m);
                let h1 = at(delta, k, m);
                let f0 = at(f, k - 1, m);
                let f1 = at(f, k, m);
                let f2 = at(f, k + 1, m);
                (-h1 / (h0 * (h0 + h1))) * f0
                    + ((h1 - h0) / (h0 * h1)) * f1
                    + (h0 / (h1 * (h0 + h1))) * f2
            };
            if axis == 0 {
                out[[k, m]] = value;
            } else {
                out[[m, k]] = value;
            }
        }
    }

    out
}

/// Relative vorticity `dv/dx - du/dy` (s-1)
pub fn vorticity(u: &Array2<f64>, v: &Array2<f64>, dx: &Array2<f64>, dy: &Array2<f64>) -> Array2<f64> {
    let dvdx = gradient(v, dx, 1);
    let dudy = gradient(u, dy, 0);
    dvdx - dudy
}

/// scipy-style 'reflect' index: (d c b a | a b c d | d c b a)
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    if len == 1 {
        return 0;
    }
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}

fn gaussian_kernel(sigma: f64) -> Array1<f64> {
    let radius = (4.0 * sigma + 0.5).floor() as isize;
    let mut kernel: Array1<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let total = kernel.sum();
    kernel /= total;
    kernel
}

/// Gaussian smoothing with reflected boundaries, applied separably along both axes
pub fn smooth_gaussian(field: &Array2<f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0.0 {
        return field.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    let mut out = field.clone();
    for axis in [0usize, 1] {
        let source = out.clone();
        for (mut dst, src) in out
            .lanes_mut(Axis(axis))
            .into_iter()
            .zip(source.lanes(Axis(axis)))
        {
            let len = src.len();
            for i in 0..len {
                let mut acc = 0.0;
                for (k, w) in kernel.iter().enumerate() {
                    let idx = reflect(i as isize + k as isize - radius, len);
                    acc += w * src[idx];
                }
                dst[i] = acc;
            }
        }
    }
    out
}

/// Relative vorticity from u/v, Gaussian smoothed and scaled to 1e-5 s-1
pub fn smoothed_vorticity(u: &GridField, v: &GridField, sigma: f64) -> Result<GridField> {
    ensure_same_grid(u, v, "vorticity")?;
    let (ny, nx) = u.shape();
    if ny < 2 || nx < 2 {
        return Err(SynopticError::InvalidParameter {
            param: "vorticity".to_string(),
            message: format!("grid {}x{} is too small for finite differences", ny, nx),
        });
    }

    let (dx, dy) = lat_lon_grid_deltas(u.lon(), u.lat());
    let u64 = u.values().mapv(f64::from);
    let v64 = v.values().mapv(f64::from);
    let vort = smooth_gaussian(&vorticity(&u64, &v64, &dx, &dy), sigma);
    u.with_values(vort.mapv(|x| (x * VORTICITY_SCALE) as f32), "1e-5 s-1")
}

/// Geopotential height from gpm to decameters
pub fn to_decameters(gh: &GridField) -> GridField {
    gh.map(|v| v / 10.0, "dam")
}

/// Multiply a field by a constant
pub fn scale(field: &GridField, factor: f32, units: &str) -> GridField {
    field.map(|v| v * factor, units)
}
