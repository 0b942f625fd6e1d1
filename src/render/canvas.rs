//! Raster canvas with map layers.
//!
//! The canvas is the map area plus a strip on the right for colour bars.
//! Layers are drawn in call order with alpha blending over a white
//! background.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_polygon_mut, BresenhamLineIter};
use imageproc::point::Point as PixelPoint;
use imageproc::rect::Rect;
use std::io::Cursor;

use super::colormap::LevelTable;
use super::contour::contour_field;
use super::extrema::{Extremum, ExtremumKind};
use super::frame::MapFrame;
use super::sample::Sampler;
use crate::error::Result;
use crate::fields::GridField;

/// Width of the colour bar strip in pixels
pub const COLORBAR_STRIP: u32 = 70;

/// Colour bars stacked in the strip
const COLORBAR_SLOTS: u32 = 3;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub color: [u8; 4],
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuiverStyle {
    /// Arrow columns across the map
    pub columns: usize,
    /// Arrow rows down the map
    pub rows: usize,
    /// Data units per map width of arrow length
    pub scale: f32,
    pub color: [u8; 4],
}

pub struct Canvas {
    image: RgbaImage,
    frame: MapFrame,
    colorbars: u32,
}

impl Canvas {
    pub fn new(frame: MapFrame) -> Self {
        let image = RgbaImage::from_pixel(frame.width() + COLORBAR_STRIP, frame.height(), Rgba(WHITE));
        Self {
            image,
            frame,
            colorbars: 0,
        }
    }

    pub fn frame(&self) -> &MapFrame {
        &self.frame
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Filled levels: every map pixel takes the colour of its sampled value
    pub fn fill(&mut self, field: &GridField, table: &LevelTable, sampler: &dyn Sampler) {
        let (w, h) = (self.frame.width(), self.frame.height());
        // cylindrical projections: longitude depends on x only, latitude on y only
        let lons: Vec<f64> = (0..w).map(|x| self.frame.to_geo(x as f64 + 0.5, 0.0).0).collect();
        let lats: Vec<f64> = (0..h).map(|y| self.frame.to_geo(0.0, y as f64 + 0.5).1).collect();

        for (y, &lat) in lats.iter().enumerate() {
            for (x, &lon) in lons.iter().enumerate() {
                let value = sampler.sample(field, lon, lat);
                if let Some(color) = table.color_for(value) {
                    self.blend(x as i32, y as i32, color);
                }
            }
        }
    }

    /// Isolines at the given levels. Returns the number of polylines drawn.
    pub fn contour(&mut self, field: &GridField, levels: &[f32], style: &LineStyle) -> usize {
        let contours = contour_field(field, levels);
        for contour in &contours {
            let pixels: Vec<(f32, f32)> = contour
                .points
                .iter()
                .map(|p| {
                    let (lon, lat) = field.coordinate_at(p.y as f64, p.x as f64);
                    self.frame.to_pixel(lon, lat)
                })
                .collect();
            for pair in pixels.windows(2) {
                self.line(pair[0], pair[1], style);
            }
        }
        contours.len()
    }

    /// Wind arrows on a regular grid over the map. Returns the number drawn.
    pub fn quiver(&mut self, u: &GridField, v: &GridField, sampler: &dyn Sampler, style: &QuiverStyle) -> usize {
        let (w, h) = (self.frame.width() as f64, self.frame.height() as f64);
        let columns = style.columns.max(1);
        let rows = style.rows.max(1);
        let shaft = LineStyle {
            color: style.color,
            width: 1.0,
        };
        let mut drawn = 0;

        for j in 0..rows {
            for i in 0..columns {
                let px = (i as f64 + 0.5) * w / columns as f64;
                let py = (j as f64 + 0.5) * h / rows as f64;
                let (lon, lat) = self.frame.to_geo(px, py);
                let (uu, vv) = (sampler.sample(u, lon, lat), sampler.sample(v, lon, lat));
                if !uu.is_finite() || !vv.is_finite() {
                    continue;
                }

                let speed = uu.hypot(vv);
                if speed < 1e-3 {
                    continue;
                }
                let length = speed / style.scale * w as f32;
                let (dx, dy) = (uu / speed, -vv / speed);
                let start = (px as f32, py as f32);
                let tip = (start.0 + dx * length, start.1 + dy * length);
                self.line(start, tip, &shaft);

                let head = (length * 0.3).clamp(2.0, 8.0);
                for angle in [0.45f32, -0.45] {
                    let (s, c) = angle.sin_cos();
                    let bx = -(dx * c - dy * s);
                    let by = -(dx * s + dy * c);
                    self.line(tip, (tip.0 + bx * head, tip.1 + by * head), &shaft);
                }
                drawn += 1;
            }
        }
        drawn
    }

    /// Stroke an `H` or `L` glyph at each extremum
    pub fn mark_extrema(&mut self, extrema: &[Extremum]) {
        let stroke = |color| LineStyle { color, width: 2.0 };
        for e in extrema {
            let (x, y) = self.frame.to_pixel(e.lon, e.lat);
            match e.kind {
                ExtremumKind::High => {
                    let s = stroke([0, 0, 255, 255]);
                    self.line((x - 5.0, y - 7.0), (x - 5.0, y + 7.0), &s);
                    self.line((x + 5.0, y - 7.0), (x + 5.0, y + 7.0), &s);
                    self.line((x - 5.0, y), (x + 5.0, y), &s);
                }
                ExtremumKind::Low => {
                    let s = stroke([255, 0, 0, 255]);
                    self.line((x - 4.0, y - 7.0), (x - 4.0, y + 7.0), &s);
                    self.line((x - 4.0, y + 7.0), (x + 5.0, y + 7.0), &s);
                }
            }
        }
    }

    /// Draw the next colour bar in the strip: one box per interval, a
    /// triangle for each extended end
    pub fn colorbar(&mut self, table: &LevelTable) {
        if self.colorbars >= COLORBAR_SLOTS {
            return;
        }
        let slot_height = self.frame.height() / COLORBAR_SLOTS;
        let pad = 14i32;
        let x = self.frame.width() as i32 + 20;
        let bar_width = 20u32;
        let top = (self.colorbars * slot_height) as i32 + pad;
        let bottom = ((self.colorbars + 1) * slot_height) as i32 - pad;
        self.colorbars += 1;

        let colors = table.colors();
        let span = (bottom - top).max(colors.len() as i32);
        let step = span as f32 / colors.len() as f32;

        // highest interval at the top
        for (k, color) in colors.iter().rev().enumerate() {
            let y0 = top + (k as f32 * step).round() as i32;
            let y1 = top + ((k + 1) as f32 * step).round() as i32;
            let opaque = [color[0], color[1], color[2], 255];
            let height = (y1 - y0).max(1) as u32;
            if color[3] > 0 {
                draw_filled_rect_mut(&mut self.image, Rect::at(x, y0).of_size(bar_width, height), Rgba(opaque));
            }
        }
        draw_hollow_rect_mut(
            &mut self.image,
            Rect::at(x, top).of_size(bar_width, (bottom - top).max(1) as u32),
            Rgba(BLACK),
        );

        let mid = x + bar_width as i32 / 2;
        let tri = 8;
        if let Some(over) = table.over() {
            let points = [
                PixelPoint::new(x, top - 1),
                PixelPoint::new(x + bar_width as i32 - 1, top - 1),
                PixelPoint::new(mid, top - tri),
            ];
            draw_polygon_mut(&mut self.image, &points, Rgba([over[0], over[1], over[2], 255]));
        }
        if let Some(under) = table.under() {
            let points = [
                PixelPoint::new(x, bottom + 1),
                PixelPoint::new(x + bar_width as i32 - 1, bottom + 1),
                PixelPoint::new(mid, bottom + tri),
            ];
            draw_polygon_mut(&mut self.image, &points, Rgba([under[0], under[1], under[2], 255]));
        }
    }

    /// Black border around the map area
    pub fn draw_border(&mut self) {
        let rect = Rect::at(0, 0).of_size(self.frame.width(), self.frame.height());
        draw_hollow_rect_mut(&mut self.image, rect, Rgba(BLACK));
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    /// Blended line of the given width
    fn line(&mut self, from: (f32, f32), to: (f32, f32), style: &LineStyle) {
        let strands = style.width.round().max(1.0) as i32;
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = dx.hypot(dy).max(1e-6);
        let (nx, ny) = (-dy / len, dx / len);
        // thin lines fade instead of vanishing
        let mut color = style.color;
        if style.width < 1.0 {
            color[3] = (color[3] as f32 * style.width.max(0.1)).round() as u8;
        }

        for k in 0..strands {
            let offset = k as f32 - (strands - 1) as f32 / 2.0;
            let a = (from.0 + nx * offset, from.1 + ny * offset);
            let b = (to.0 + nx * offset, to.1 + ny * offset);
            for (x, y) in BresenhamLineIter::new(a, b) {
                if x < self.frame.width() as i32 {
                    self.blend(x, y, color);
                }
            }
        }
    }

    fn blend(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x as u32 >= self.image.width() || y as u32 >= self.image.height() {
            return;
        }
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        let alpha = color[3] as f32 / 255.0;
        for channel in 0..3 {
            let src = color[channel] as f32;
            let dst = pixel.0[channel] as f32;
            pixel.0[channel] = (src * alpha + dst * (1.0 - alpha)).round() as u8;
        }
        pixel.0[3] = 255;
    }
}

/// Encode an image as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
