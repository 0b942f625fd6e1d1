//! Map projections and the pixel frame of one chart.

use serde::Serialize;

use crate::region::BoundingBox;

/// Default map area size in pixels
pub const DEFAULT_WIDTH: u32 = 900;
pub const DEFAULT_HEIGHT: u32 = 700;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Equirectangular: x = lon, y = lat
    PlateCarree,
    /// Miller cylindrical
    Miller,
}

impl Projection {
    /// Projected (x, y) of a geographic point, in radians-scaled units
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = lon.to_radians();
        match self {
            Projection::PlateCarree => (x, lat.to_radians()),
            Projection::Miller => {
                let phi = lat.clamp(-89.999, 89.999).to_radians();
                let y = 1.25 * (std::f64::consts::FRAC_PI_4 + 0.4 * phi).tan().ln();
                (x, y)
            }
        }
    }

    /// Geographic (lon, lat) of a projected point
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = x.to_degrees();
        let lat = match self {
            Projection::PlateCarree => y.to_degrees(),
            Projection::Miller => (2.5 * (0.8 * y).exp().atan() - 0.625 * std::f64::consts::PI).to_degrees(),
        };
        (lon, lat)
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "miller" => Some(Projection::Miller),
            "platecarree" | "plate_carree" | "equirectangular" => Some(Projection::PlateCarree),
            _ => None,
        }
    }
}

/// The map area: a box drawn into `width` x `height` pixels
#[derive(Debug, Clone, Copy)]
pub struct MapFrame {
    width: u32,
    height: u32,
    bbox: BoundingBox,
    projection: Projection,
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
}

impl MapFrame {
    pub fn new(width: u32, height: u32, bbox: BoundingBox, projection: Projection) -> Self {
        let (x0, y0) = projection.forward(bbox.west(), bbox.south());
        let (x1, y1) = projection.forward(bbox.east(), bbox.north());
        Self {
            width: width.max(1),
            height: height.max(1),
            bbox,
            projection,
            x0,
            x1,
            y0,
            y1,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Pixel position (x right, y down) of a geographic point
    pub fn to_pixel(&self, lon: f64, lat: f64) -> (f32, f32) {
        let (x, y) = self.projection.forward(lon, lat);
        let px = (x - self.x0) / (self.x1 - self.x0) * self.width as f64;
        let py = (self.y1 - y) / (self.y1 - self.y0) * self.height as f64;
        (px as f32, py as f32)
    }

    /// Geographic point under a pixel position
    pub fn to_geo(&self, px: f64, py: f64) -> (f64, f64) {
        let x = self.x0 + px / self.width as f64 * (self.x1 - self.x0);
        let y = self.y1 - py / self.height as f64 * (self.y1 - self.y0);
        self.projection.inverse(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn china() -> BoundingBox {
        BoundingBox::new(70.0, 140.0, 10.0, 65.0).unwrap()
    }

    #[test]
    fn test_corners_map_to_image_corners() {
        for projection in [Projection::PlateCarree, Projection::Miller] {
            let frame = MapFrame::new(900, 700, china(), projection);
            let (x, y) = frame.to_pixel(70.0, 65.0);
            assert!(x.abs() < 1e-3 && y.abs() < 1e-3);
            let (x, y) = frame.to_pixel(140.0, 10.0);
            assert!((x - 900.0).abs() < 1e-3 && (y - 700.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_round_trip_through_pixels() {
        let frame = MapFrame::new(900, 700, china(), Projection::Miller);
        let (px, py) = frame.to_pixel(116.4, 39.9);
        let (lon, lat) = frame.to_geo(px as f64, py as f64);
        assert!((lon - 116.4).abs() < 1e-3);
        assert!((lat - 39.9).abs() < 1e-3);
    }

    #[test]
    fn test_miller_stretches_high_latitudes() {
        let frame = MapFrame::new(900, 700, china(), Projection::Miller);
        let (_, y_mid) = frame.to_pixel(100.0, 37.5);
        // midpoint latitude sits below the middle row on a Miller map
        assert!(y_mid > 350.0);
    }
}
