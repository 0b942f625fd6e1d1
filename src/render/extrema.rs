//! High and low centres of a pressure field.

use serde::Serialize;

use crate::fields::GridField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtremumKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    pub kind: ExtremumKind,
    pub lon: f64,
    pub lat: f64,
    pub value: f32,
}

/// Points that are the strict maximum (or minimum) of the square window of
/// half-width `radius` around them. Points on the grid edge are ignored.
pub fn find_extrema(field: &GridField, radius: usize) -> Vec<Extremum> {
    let (rows, cols) = field.shape();
    let values = field.values();
    let mut found = Vec::new();
    if rows < 3 || cols < 3 || radius == 0 {
        return found;
    }

    for r in 1..rows - 1 {
        for c in 1..cols - 1 {
            let v = values[[r, c]];
            if !v.is_finite() {
                continue;
            }
            let r0 = r.saturating_sub(radius);
            let r1 = (r + radius).min(rows - 1);
            let c0 = c.saturating_sub(radius);
            let c1 = (c + radius).min(cols - 1);

            let mut is_max = true;
            let mut is_min = true;
            'window: for rr in r0..=r1 {
                for cc in c0..=c1 {
                    if rr == r && cc == c {
                        continue;
                    }
                    let other = values[[rr, cc]];
                    if !other.is_finite() {
                        continue;
                    }
                    if other >= v {
                        is_max = false;
                    }
                    if other <= v {
                        is_min = false;
                    }
                    if !is_max && !is_min {
                        break 'window;
                    }
                }
            }

            let kind = match (is_max, is_min) {
                (true, false) => ExtremumKind::High,
                (false, true) => ExtremumKind::Low,
                _ => continue,
            };
            found.push(Extremum {
                kind,
                lon: field.lon()[c],
                lat: field.lat()[r],
                value: v,
            });
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_finds_high_and_low() {
        let mut values = Array2::from_elem((9, 9), 1010.0f32);
        values[[2, 2]] = 1030.0;
        values[[6, 6]] = 990.0;
        let axis: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let field = GridField::new(values, axis.clone(), axis, "hPa").unwrap();

        let extrema = find_extrema(&field, 3);
        assert_eq!(extrema.len(), 2);
        assert_eq!(extrema[0].kind, ExtremumKind::High);
        assert_eq!((extrema[0].lon, extrema[0].lat), (2.0, 2.0));
        assert_eq!(extrema[1].kind, ExtremumKind::Low);
        assert_eq!(extrema[1].value, 990.0);
    }

    #[test]
    fn test_flat_field_has_no_extrema() {
        let axis: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let field = GridField::new(Array2::from_elem((5, 5), 1.0), axis.clone(), axis, "hPa").unwrap();
        assert!(find_extrema(&field, 2).is_empty());
    }
}
